// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{DataState, InterfaceData, MessageKind, ParameterArray};

/// Per-proxy validity of attributes and response parameters.
#[derive(Debug, Clone)]
pub struct ProxyData {
    interface: &'static InterfaceData,
    attributes: Vec<DataState>,
    params: ParameterArray,
}

impl ProxyData {
    pub fn new(interface: &'static InterfaceData) -> Self {
        Self {
            interface,
            attributes: vec![DataState::Unavailable; interface.attributes.len()],
            params: ParameterArray::new(&interface.response_params),
        }
    }

    pub fn interface(&self) -> &'static InterfaceData {
        self.interface
    }

    pub fn attribute_state(&self, attribute_id: u32) -> DataState {
        self.attribute_index(attribute_id)
            .map_or(DataState::Unavailable, |i| self.attributes[i])
    }

    pub fn set_attribute_state(&mut self, attribute_id: u32, state: DataState) -> bool {
        match self.attribute_index(attribute_id) {
            Some(i) => {
                self.attributes[i] = state;
                true
            }
            None => false,
        }
    }

    pub fn response_state(&self, response_id: u32, param: usize) -> DataState {
        self.response_index(response_id)
            .and_then(|r| self.params.state(r, param))
            .unwrap_or(DataState::Unavailable)
    }

    /// Set every parameter of a response.
    pub fn set_response_state(&mut self, response_id: u32, state: DataState) -> bool {
        match self.response_index(response_id) {
            Some(r) => self.params.set_all(r, state),
            None => false,
        }
    }

    /// Everything back to `Unavailable` (the provider disconnected).
    pub fn reset_states(&mut self) {
        self.attributes.fill(DataState::Unavailable);
        self.params.reset();
    }

    fn attribute_index(&self, id: u32) -> Option<usize> {
        (MessageKind::of(id) == MessageKind::Attribute)
            .then(|| self.interface.index_of(id))
            .flatten()
    }

    fn response_index(&self, id: u32) -> Option<usize> {
        (MessageKind::of(id) == MessageKind::Response)
            .then(|| self.interface.index_of(id))
            .flatten()
    }
}
