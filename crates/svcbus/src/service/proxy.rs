// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-side state of one proxy.
//!
//! A [`ProxyBinding`] lives with the proxy's event consumer on the proxy
//! thread. It follows the `ServiceConnection` notifications of its proxy,
//! keeps the validity of received responses and attributes in a
//! [`ProxyData`], and builds requests for the bound stub.

use crate::address::{ProxyAddress, StubAddress, COOKIE_LOCAL};
use crate::error::{Error, Result};
use crate::event::{EventDataStream, RequestEvent, ResponseEvent};
use crate::interface::{DataState, InterfaceData, MessageKind, ProxyData, ResultType};
use crate::registry::{ConnectionChange, ServiceConnection};

/// Binding of one proxy to its stub, plus the data states it received.
#[derive(Debug, Clone)]
pub struct ProxyBinding {
    address: ProxyAddress,
    stub: Option<StubAddress>,
    status: ServiceConnection,
    data: ProxyData,
    next_seq: u64,
}

impl ProxyBinding {
    /// Binding for `address`, which must name the service `interface`
    /// describes.
    pub fn new(address: ProxyAddress, interface: &'static InterfaceData) -> Result<Self> {
        let item = address.service_address().item();
        if !address.is_valid() || item.name != interface.item.name || item.version != interface.item.version {
            return Err(Error::InvalidAddress(format!(
                "{} does not implement {} {}",
                address,
                interface.service_name(),
                interface.version()
            )));
        }
        Ok(Self {
            address,
            stub: None,
            status: ServiceConnection::Pending,
            data: ProxyData::new(interface),
            next_seq: 1,
        })
    }

    pub fn address(&self) -> &ProxyAddress {
        &self.address
    }

    /// Stub currently serving this proxy.
    pub fn stub(&self) -> Option<&StubAddress> {
        self.stub.as_ref()
    }

    pub fn status(&self) -> ServiceConnection {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ServiceConnection::Connected && self.stub.is_some()
    }

    pub fn data(&self) -> &ProxyData {
        &self.data
    }

    // Remote notifications carry the process cookie instead of the local
    // one, so the channel is not part of the match.
    fn is_mine(&self, proxy: &ProxyAddress) -> bool {
        proxy.service_address() == self.address.service_address() && proxy.thread() == self.address.thread()
    }

    /// Apply a connection notification; false if it is for another proxy.
    ///
    /// Leaving `Connected` resets every data state to `Unavailable`.
    pub fn apply_connection(&mut self, change: &ConnectionChange) -> bool {
        if !self.is_mine(&change.proxy) {
            return false;
        }
        self.status = change.status;
        if change.status == ServiceConnection::Connected {
            self.stub = Some(change.stub.clone());
        } else {
            if self.stub.take().is_some() {
                log::debug!(
                    "[ProxyBinding] {} lost {}, data reset",
                    self.address.service_address(),
                    change.stub.thread()
                );
            }
            self.data.reset_states();
        }
        true
    }

    /// Record the validity of a response or attribute update.
    pub fn apply_response(&mut self, response: &ResponseEvent) -> bool {
        if !self.is_mine(response.target()) {
            return false;
        }
        let state = data_state(response.result());
        match MessageKind::of(response.message_id()) {
            MessageKind::Response => self.data.set_response_state(response.message_id(), state),
            MessageKind::Attribute => self.data.set_attribute_state(response.message_id(), state),
            _ => false,
        }
    }

    /// Request `request_id` of the bound stub with the next sequence number.
    ///
    /// The stream is external when the stub lives in another process.
    pub fn request(&mut self, request_id: u32) -> Result<RequestEvent> {
        let interface = self.data.interface();
        if MessageKind::of(request_id) != MessageKind::Request || interface.index_of(request_id).is_none() {
            return Err(Error::UnknownMessage(request_id));
        }
        let stub = self
            .stub
            .clone()
            .filter(|_| self.status == ServiceConnection::Connected)
            .ok_or_else(|| Error::InvalidState(format!("{} is not connected", self.address.service_address())))?;

        let seq_nr = self.next_seq;
        self.next_seq += 1;
        if stub.cookie() == COOKIE_LOCAL {
            Ok(RequestEvent::new_local(self.address.clone(), stub, request_id, seq_nr))
        } else {
            RequestEvent::new_remote(self.address.clone(), stub, request_id, seq_nr, EventDataStream::external())
        }
    }
}

fn data_state(result: ResultType) -> DataState {
    match result {
        ResultType::Ok | ResultType::DataOk => DataState::Valid,
        ResultType::Invalid | ResultType::DataInvalid => DataState::Invalid,
        ResultType::Unavailable | ResultType::Undelivered | ResultType::Canceled => DataState::Unavailable,
        ResultType::Error | ResultType::Busy => DataState::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Channel, ServiceAddress, ServiceItem, ServiceType, Version, COOKIE_FIRST_REMOTE};
    use crate::interface::{ATTRIBUTE_ID_FIRST, REQUEST_ID_FIRST, RESPONSE_ID_FIRST};
    use std::sync::OnceLock;

    const ADD: u32 = REQUEST_ID_FIRST + 1;
    const SUM: u32 = RESPONSE_ID_FIRST + 1;
    const LAST_RESULT: u32 = ATTRIBUTE_ID_FIRST;

    fn calc_interface() -> &'static InterfaceData {
        static CALC: OnceLock<InterfaceData> = OnceLock::new();
        CALC.get_or_init(|| {
            InterfaceData::new(
                ServiceItem::new("Calc", Version::new(1, 0, 0), ServiceType::Public),
                &["Reset", "Add"],
                &[("Status", 0), ("Sum", 1)],
                &["LastResult"],
            )
            .with_reply(1, 1)
        })
    }

    fn calc() -> ServiceAddress {
        ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calc")
    }

    fn bound() -> (ProxyBinding, StubAddress) {
        let mut binding = ProxyBinding::new(ProxyAddress::local(calc(), "client"), calc_interface()).expect("binding");
        let stub = StubAddress::local(calc(), "server");
        let change = ConnectionChange::new(stub.clone(), binding.address().clone(), ServiceConnection::Connected);
        assert!(binding.apply_connection(&change));
        (binding, stub)
    }

    fn sum(binding: &ProxyBinding, stub: &StubAddress, result: ResultType) -> ResponseEvent {
        ResponseEvent::new_local(binding.address().clone(), stub.clone(), SUM, result, 1)
    }

    #[test]
    fn test_interface_must_match_address() {
        let other = ServiceAddress::with("Calc", Version::new(2, 0, 0), ServiceType::Public, "calc");
        assert!(matches!(
            ProxyBinding::new(ProxyAddress::local(other, "client"), calc_interface()),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_disconnect_resets_data_states() {
        let (mut binding, stub) = bound();
        assert!(binding.apply_response(&sum(&binding, &stub, ResultType::Ok)));
        let attribute = ResponseEvent::new_local(binding.address().clone(), stub.clone(), LAST_RESULT, ResultType::DataOk, 0);
        assert!(binding.apply_response(&attribute));
        assert_eq!(binding.data().response_state(SUM, 0), DataState::Valid);
        assert_eq!(binding.data().attribute_state(LAST_RESULT), DataState::Valid);

        let lost = ConnectionChange::new(stub, binding.address().clone(), ServiceConnection::Pending);
        assert!(binding.apply_connection(&lost));
        assert!(!binding.is_connected());
        assert_eq!(binding.data().response_state(SUM, 0), DataState::Unavailable);
        assert_eq!(binding.data().attribute_state(LAST_RESULT), DataState::Unavailable);
    }

    #[test]
    fn test_failed_response_marks_error() {
        let (mut binding, stub) = bound();
        assert!(binding.apply_response(&sum(&binding, &stub, ResultType::Busy)));
        assert_eq!(binding.data().response_state(SUM, 0), DataState::Error);
        assert!(binding.apply_response(&sum(&binding, &stub, ResultType::Undelivered)));
        assert_eq!(binding.data().response_state(SUM, 0), DataState::Unavailable);
    }

    #[test]
    fn test_other_proxy_is_ignored() {
        let (mut binding, stub) = bound();
        let stranger = ProxyAddress::local(calc(), "someone-else");
        let change = ConnectionChange::new(stub, stranger, ServiceConnection::Disconnected);
        assert!(!binding.apply_connection(&change));
        assert!(binding.is_connected());
    }

    #[test]
    fn test_remote_notification_matches_local_proxy() {
        let mut binding = ProxyBinding::new(ProxyAddress::local(calc(), "client"), calc_interface()).expect("binding");
        let mut exported = binding.address().clone();
        exported.set_channel(Channel::new(0, 0, COOKIE_FIRST_REMOTE));
        let mut stub = StubAddress::local(calc(), "server");
        stub.set_channel(Channel::new(0, 0, COOKIE_FIRST_REMOTE + 1));

        let change = ConnectionChange::new(stub, exported, ServiceConnection::Connected);
        assert!(binding.apply_connection(&change));
        let request = binding.request(ADD).expect("request");
        assert!(request.is_remote());
        assert_eq!(request.target().cookie(), COOKIE_FIRST_REMOTE + 1);
    }

    #[test]
    fn test_requests_need_connection_and_known_id() {
        let mut binding = ProxyBinding::new(ProxyAddress::local(calc(), "client"), calc_interface()).expect("binding");
        assert!(matches!(binding.request(ADD), Err(Error::InvalidState(_))));

        let (mut binding, _) = bound();
        assert!(matches!(binding.request(REQUEST_ID_FIRST + 7), Err(Error::UnknownMessage(_))));
        assert!(matches!(binding.request(SUM), Err(Error::UnknownMessage(_))));
        let first = binding.request(ADD).expect("first");
        let second = binding.request(ADD).expect("second");
        assert!(!first.is_remote());
        assert_eq!(second.seq_nr(), first.seq_nr() + 1);
    }
}
