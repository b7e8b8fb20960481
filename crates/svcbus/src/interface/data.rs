// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{MessageKind, ATTRIBUTE_ID_FIRST, REQUEST_ID_FIRST, RESPONSE_ID_FIRST};
use crate::address::{ServiceItem, ServiceType, Version};
use crate::ident::{conv_to_string, Identifier};
use std::sync::OnceLock;

/// Static description of one service interface.
///
/// Built once per interface (typically in a `OnceLock`) and never mutated
/// afterwards. Message id `n` of a kind is `<KIND>_ID_FIRST + n`.
#[derive(Debug, Clone)]
pub struct InterfaceData {
    pub item: ServiceItem,
    pub requests: Vec<Identifier>,
    pub responses: Vec<Identifier>,
    pub attributes: Vec<Identifier>,
    /// Response id answering each request, by request index.
    pub request_to_response: Vec<Option<u32>>,
    /// Parameter count of each response, by response index.
    pub response_params: Vec<usize>,
}

impl InterfaceData {
    /// Interface with named messages; ids are assigned in table order.
    pub fn new(
        item: ServiceItem,
        requests: &[&str],
        responses: &[(&str, usize)],
        attributes: &[&str],
    ) -> Self {
        Self {
            item,
            requests: identifiers(REQUEST_ID_FIRST, requests.iter().copied()),
            responses: identifiers(RESPONSE_ID_FIRST, responses.iter().map(|(name, _)| *name)),
            attributes: identifiers(ATTRIBUTE_ID_FIRST, attributes.iter().copied()),
            request_to_response: vec![None; requests.len()],
            response_params: responses.iter().map(|(_, count)| *count).collect(),
        }
    }

    /// Declare that `request` is answered by `response` (both by index).
    pub fn with_reply(mut self, request: usize, response: usize) -> Self {
        if request < self.request_to_response.len() && response < self.responses.len() {
            self.request_to_response[request] = Some(RESPONSE_ID_FIRST + response as u32);
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.item.is_valid()
    }

    pub fn service_name(&self) -> &str {
        &self.item.name
    }

    pub fn version(&self) -> Version {
        self.item.version
    }

    /// Index of `message_id` within its table, if it belongs to it.
    pub fn index_of(&self, message_id: u32) -> Option<usize> {
        let (first, len) = match MessageKind::of(message_id) {
            MessageKind::Request => (REQUEST_ID_FIRST, self.requests.len()),
            MessageKind::Response => (RESPONSE_ID_FIRST, self.responses.len()),
            MessageKind::Attribute => (ATTRIBUTE_ID_FIRST, self.attributes.len()),
            MessageKind::System | MessageKind::Unknown => return None,
        };
        let index = (message_id - first) as usize;
        (index < len).then_some(index)
    }

    pub fn response_for_request(&self, request_id: u32) -> Option<u32> {
        if MessageKind::of(request_id) != MessageKind::Request {
            return None;
        }
        self.index_of(request_id)
            .and_then(|i| self.request_to_response[i])
    }

    /// Name of a message of this interface, empty if unknown.
    pub fn message_name(&self, message_id: u32) -> &str {
        let table = match MessageKind::of(message_id) {
            MessageKind::Request => &self.requests,
            MessageKind::Response => &self.responses,
            MessageKind::Attribute => &self.attributes,
            MessageKind::System | MessageKind::Unknown => return "",
        };
        conv_to_string(message_id, table, usize::MAX)
    }
}

fn identifiers<'a>(first: u32, names: impl Iterator<Item = &'a str>) -> Vec<Identifier> {
    names
        .enumerate()
        .map(|(i, name)| Identifier::new(first + i as u32, name))
        .collect()
}

/// The interface with no messages, shared by every invalid proxy.
pub fn empty_interface() -> &'static InterfaceData {
    static EMPTY: OnceLock<InterfaceData> = OnceLock::new();
    EMPTY.get_or_init(|| {
        InterfaceData::new(
            ServiceItem::new("", Version::default(), ServiceType::Unknown),
            &[],
            &[],
            &[],
        )
    })
}
