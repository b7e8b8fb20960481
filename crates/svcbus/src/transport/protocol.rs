// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Router protocol carried in [`RemoteMessage`]s.
//!
//! System message ids start at [`SYSTEM_ID_FIRST`]. Every other id is an
//! application message the router forwards to the `target` cookie as-is.

use super::message::RemoteMessage;
use crate::address::{ProxyAddress, StubAddress};
use crate::error::{Error, Result};
use crate::interface::SYSTEM_ID_FIRST;
use crate::registry::{ConnectionChange, ServiceConnection};
use crate::ser::{InStream, OutStream, StreamError};

pub const ROUTER_CONNECT: u32 = SYSTEM_ID_FIRST;
pub const ROUTER_CONNECT_ACK: u32 = SYSTEM_ID_FIRST + 1;
pub const ROUTER_DISCONNECT: u32 = SYSTEM_ID_FIRST + 2;
pub const ROUTER_REGISTER_STUB: u32 = SYSTEM_ID_FIRST + 3;
pub const ROUTER_UNREGISTER_STUB: u32 = SYSTEM_ID_FIRST + 4;
pub const ROUTER_REGISTER_PROXY: u32 = SYSTEM_ID_FIRST + 5;
pub const ROUTER_UNREGISTER_PROXY: u32 = SYSTEM_ID_FIRST + 6;
pub const ROUTER_SERVICE_CONNECTION: u32 = SYSTEM_ID_FIRST + 7;

/// Id of remote subscribe/unsubscribe notifications (forwarded like
/// application messages).
pub const NOTIFICATION_MESSAGE_ID: u32 = SYSTEM_ID_FIRST + 0x100;

/// True for messages the router consumes itself.
pub fn is_router_message(message_id: u32) -> bool {
    (ROUTER_CONNECT..=ROUTER_SERVICE_CONNECTION).contains(&message_id)
}

/// Messages exchanged between a process and the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterMessage {
    Connect,
    ConnectAck { cookie: u64 },
    Disconnect,
    RegisterStub(StubAddress),
    UnregisterStub(StubAddress),
    RegisterProxy(ProxyAddress),
    UnregisterProxy(ProxyAddress),
    ServiceConnection(ConnectionChange),
}

impl RouterMessage {
    pub fn message_id(&self) -> u32 {
        match self {
            RouterMessage::Connect => ROUTER_CONNECT,
            RouterMessage::ConnectAck { .. } => ROUTER_CONNECT_ACK,
            RouterMessage::Disconnect => ROUTER_DISCONNECT,
            RouterMessage::RegisterStub(_) => ROUTER_REGISTER_STUB,
            RouterMessage::UnregisterStub(_) => ROUTER_UNREGISTER_STUB,
            RouterMessage::RegisterProxy(_) => ROUTER_REGISTER_PROXY,
            RouterMessage::UnregisterProxy(_) => ROUTER_UNREGISTER_PROXY,
            RouterMessage::ServiceConnection(_) => ROUTER_SERVICE_CONNECTION,
        }
    }

    /// Encode as a message from cookie `source` to cookie `target`.
    pub fn to_message(&self, source: u64, target: u64) -> Result<RemoteMessage> {
        let mut message = RemoteMessage::new(self.message_id(), source, target);
        let out = message.writer();
        match self {
            RouterMessage::Connect | RouterMessage::Disconnect => {}
            RouterMessage::ConnectAck { cookie } => out.write_u64(*cookie)?,
            RouterMessage::RegisterStub(stub) | RouterMessage::UnregisterStub(stub) => {
                out.write_object(stub)?
            }
            RouterMessage::RegisterProxy(proxy) | RouterMessage::UnregisterProxy(proxy) => {
                out.write_object(proxy)?
            }
            RouterMessage::ServiceConnection(change) => {
                out.write_object(&change.stub)?;
                out.write_object(&change.proxy)?;
                out.write_u8(change.status.to_wire())?;
            }
        }
        Ok(message)
    }

    pub fn from_message(message: &RemoteMessage) -> Result<Self> {
        let mut input = message.reader();
        let decoded = match message.message_id() {
            ROUTER_CONNECT => RouterMessage::Connect,
            ROUTER_CONNECT_ACK => RouterMessage::ConnectAck {
                cookie: input.read_u64()?,
            },
            ROUTER_DISCONNECT => RouterMessage::Disconnect,
            ROUTER_REGISTER_STUB => RouterMessage::RegisterStub(input.read_object()?),
            ROUTER_UNREGISTER_STUB => RouterMessage::UnregisterStub(input.read_object()?),
            ROUTER_REGISTER_PROXY => RouterMessage::RegisterProxy(input.read_object()?),
            ROUTER_UNREGISTER_PROXY => RouterMessage::UnregisterProxy(input.read_object()?),
            ROUTER_SERVICE_CONNECTION => {
                let stub = input.read_object()?;
                let proxy = input.read_object()?;
                let raw = input.read_u8()?;
                let status = ServiceConnection::from_wire(raw).ok_or(StreamError::InvalidData {
                    reason: format!("connection status {}", raw),
                })?;
                RouterMessage::ServiceConnection(ConnectionChange::new(stub, proxy, status))
            }
            other => return Err(Error::UnknownMessage(other)),
        };
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Channel, ServiceAddress, ServiceType, Version};
    use crate::config::DEFAULT_MAX_MESSAGE_SIZE;

    fn calc_stub() -> StubAddress {
        StubAddress::new(
            ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calc"),
            "worker",
            Channel::new(0, 0, 256),
        )
    }

    fn over_the_wire(message: &RouterMessage) -> RouterMessage {
        let bytes = message.to_message(256, 2).and_then(|m| m.encode()).expect("encode");
        let received = RemoteMessage::decode(&bytes, DEFAULT_MAX_MESSAGE_SIZE).expect("decode");
        RouterMessage::from_message(&received).expect("router message")
    }

    #[test]
    fn test_registration_survives_the_wire() {
        let message = RouterMessage::RegisterStub(calc_stub());
        assert_eq!(over_the_wire(&message), message);
    }

    #[test]
    fn test_connection_change_survives_the_wire() {
        let stub = calc_stub();
        let mut proxy = ProxyAddress::from(&stub);
        proxy.set_thread("client");
        proxy.set_channel(Channel::new(0, 0, 257));
        let message = RouterMessage::ServiceConnection(ConnectionChange::new(
            stub,
            proxy,
            ServiceConnection::Connected,
        ));
        assert_eq!(over_the_wire(&message), message);
    }

    #[test]
    fn test_system_range() {
        assert!(is_router_message(ROUTER_CONNECT));
        assert!(is_router_message(ROUTER_SERVICE_CONNECTION));
        assert!(!is_router_message(NOTIFICATION_MESSAGE_ID));
        assert!(!is_router_message(0x0001_0000));
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let message = RemoteMessage::new(0x0001_0000, 256, 257);
        assert!(matches!(
            RouterMessage::from_message(&message),
            Err(Error::UnknownMessage(0x0001_0000))
        ));
    }

    #[test]
    fn test_ack_carries_cookie() {
        assert_eq!(
            over_the_wire(&RouterMessage::ConnectAck { cookie: 300 }),
            RouterMessage::ConnectAck { cookie: 300 }
        );
    }
}
