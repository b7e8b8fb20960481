// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request, response and notification events exchanged by proxies and stubs.
//!
//! Local events carry an internal stream and are posted straight to the
//! target thread. Remote events carry an external stream and convert to and
//! from [`RemoteMessage`]: the addresses are written first and the event
//! data fills the rest of the payload.

use super::data::EventDataStream;
use crate::address::{Channel, ProxyAddress, StubAddress, COOKIE_LOCAL};
use crate::error::{Error, Result};
use crate::interface::ResultType;
use crate::ser::{InStream, OutStream};
use crate::transport::{RemoteMessage, NOTIFICATION_MESSAGE_ID};

/// Remaining bytes of a payload reader after the addresses.
fn remaining_data<S: InStream>(input: &mut S) -> Result<EventDataStream> {
    let mut rest = vec![0u8; input.bytes_available()];
    input.take(&mut rest)?;
    Ok(EventDataStream::external_from(&rest))
}

/// Channel seen from another process: local endpoints are published under
/// the process cookie.
fn published(channel: Channel, own_cookie: u64) -> Channel {
    let mut channel = channel;
    if channel.cookie() == COOKIE_LOCAL {
        channel.set_cookie(own_cookie);
    }
    channel
}

/// Call from a proxy to a stub.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    source: ProxyAddress,
    target: StubAddress,
    message_id: u32,
    seq_nr: u64,
    data: EventDataStream,
}

impl RequestEvent {
    /// In-process request with an empty internal stream.
    pub fn new_local(source: ProxyAddress, target: StubAddress, message_id: u32, seq_nr: u64) -> Self {
        Self {
            source,
            target,
            message_id,
            seq_nr,
            data: EventDataStream::internal(),
        }
    }

    /// Request for another process; `data` must be external.
    pub fn new_remote(
        source: ProxyAddress,
        target: StubAddress,
        message_id: u32,
        seq_nr: u64,
        data: EventDataStream,
    ) -> Result<Self> {
        if !data.is_external() {
            return Err(Error::NotExternalStream);
        }
        Ok(Self {
            source,
            target,
            message_id,
            seq_nr,
            data,
        })
    }

    pub fn source(&self) -> &ProxyAddress {
        &self.source
    }

    pub fn target(&self) -> &StubAddress {
        &self.target
    }

    pub fn message_id(&self) -> u32 {
        self.message_id
    }

    pub fn seq_nr(&self) -> u64 {
        self.seq_nr
    }

    pub fn data(&self) -> &EventDataStream {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut EventDataStream {
        &mut self.data
    }

    pub fn is_remote(&self) -> bool {
        self.data.is_external()
    }

    pub fn to_remote_message(&self, own_cookie: u64) -> Result<RemoteMessage> {
        let mut source = self.source.clone();
        source.set_channel(published(source.channel(), own_cookie));

        let mut message = RemoteMessage::new(self.message_id, own_cookie, self.target.cookie());
        message.set_sequence(self.seq_nr);
        let out = message.writer();
        out.write_object(&source)?;
        out.write_object(&self.target)?;
        out.put(self.data.as_bytes())?;
        Ok(message)
    }

    pub fn from_remote_message(message: &RemoteMessage) -> Result<Self> {
        let mut input = message.reader();
        let source = input.read_object()?;
        let target = input.read_object()?;
        let data = remaining_data(&mut input)?;
        Self::new_remote(source, target, message.message_id(), message.sequence(), data)
    }
}

/// Answer (or broadcast) from a stub to one proxy.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    target: ProxyAddress,
    source: StubAddress,
    message_id: u32,
    result: ResultType,
    seq_nr: u64,
    data: EventDataStream,
}

impl ResponseEvent {
    pub fn new_local(
        target: ProxyAddress,
        source: StubAddress,
        message_id: u32,
        result: ResultType,
        seq_nr: u64,
    ) -> Self {
        Self {
            target,
            source,
            message_id,
            result,
            seq_nr,
            data: EventDataStream::internal(),
        }
    }

    pub fn new_remote(
        target: ProxyAddress,
        source: StubAddress,
        message_id: u32,
        result: ResultType,
        seq_nr: u64,
        data: EventDataStream,
    ) -> Result<Self> {
        if !data.is_external() {
            return Err(Error::NotExternalStream);
        }
        Ok(Self {
            target,
            source,
            message_id,
            result,
            seq_nr,
            data,
        })
    }

    pub fn target(&self) -> &ProxyAddress {
        &self.target
    }

    pub fn source(&self) -> &StubAddress {
        &self.source
    }

    pub fn message_id(&self) -> u32 {
        self.message_id
    }

    pub fn result(&self) -> ResultType {
        self.result
    }

    pub fn seq_nr(&self) -> u64 {
        self.seq_nr
    }

    pub fn data(&self) -> &EventDataStream {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut EventDataStream {
        &mut self.data
    }

    pub fn is_remote(&self) -> bool {
        self.data.is_external()
    }

    /// Copy addressed to another proxy; the data buffer is shared until one
    /// side writes.
    pub fn clone_for_target(&self, target: &ProxyAddress, seq_nr: u64) -> Self {
        Self {
            target: target.clone(),
            seq_nr,
            ..self.clone()
        }
    }

    pub fn to_remote_message(&self, own_cookie: u64) -> Result<RemoteMessage> {
        let mut source = self.source.clone();
        source.set_channel(published(source.channel(), own_cookie));

        let mut message = RemoteMessage::new(self.message_id, own_cookie, self.target.cookie());
        message.set_sequence(self.seq_nr);
        message.set_result(self.result);
        let out = message.writer();
        out.write_object(&self.target)?;
        out.write_object(&source)?;
        out.put(self.data.as_bytes())?;
        Ok(message)
    }

    pub fn from_remote_message(message: &RemoteMessage) -> Result<Self> {
        let mut input = message.reader();
        let target = input.read_object()?;
        let source = input.read_object()?;
        let data = remaining_data(&mut input)?;
        Self::new_remote(
            target,
            source,
            message.message_id(),
            message.result(),
            message.sequence(),
            data,
        )
    }
}

/// Proxy asking a stub to start or stop sending a broadcast or attribute
/// update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    source: ProxyAddress,
    target: StubAddress,
    message_id: u32,
    subscribe: bool,
}

impl NotificationEvent {
    pub fn subscribe(source: ProxyAddress, target: StubAddress, message_id: u32) -> Self {
        Self {
            source,
            target,
            message_id,
            subscribe: true,
        }
    }

    pub fn unsubscribe(source: ProxyAddress, target: StubAddress, message_id: u32) -> Self {
        Self {
            source,
            target,
            message_id,
            subscribe: false,
        }
    }

    pub fn source(&self) -> &ProxyAddress {
        &self.source
    }

    pub fn target(&self) -> &StubAddress {
        &self.target
    }

    pub fn message_id(&self) -> u32 {
        self.message_id
    }

    pub fn is_subscribe(&self) -> bool {
        self.subscribe
    }

    pub fn to_remote_message(&self, own_cookie: u64) -> Result<RemoteMessage> {
        let mut source = self.source.clone();
        source.set_channel(published(source.channel(), own_cookie));

        let mut message = RemoteMessage::new(NOTIFICATION_MESSAGE_ID, own_cookie, self.target.cookie());
        let out = message.writer();
        out.write_object(&source)?;
        out.write_object(&self.target)?;
        out.write_u32(self.message_id)?;
        out.write_bool(self.subscribe)?;
        Ok(message)
    }

    pub fn from_remote_message(message: &RemoteMessage) -> Result<Self> {
        if message.message_id() != NOTIFICATION_MESSAGE_ID {
            return Err(Error::UnknownMessage(message.message_id()));
        }
        let mut input = message.reader();
        Ok(Self {
            source: input.read_object()?,
            target: input.read_object()?,
            message_id: input.read_u32()?,
            subscribe: input.read_bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{ServiceAddress, ServiceType, Version, COOKIE_FIRST_REMOTE};
    use crate::config::DEFAULT_MAX_MESSAGE_SIZE;
    use crate::interface::{REQUEST_ID_FIRST, RESPONSE_ID_FIRST};

    fn endpoints() -> (ProxyAddress, StubAddress) {
        let address = ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calc");
        let stub = StubAddress::new(address.clone(), "server", Channel::new(0, 0, COOKIE_FIRST_REMOTE + 1));
        let proxy = ProxyAddress::local(address, "client");
        (proxy, stub)
    }

    #[test]
    fn test_remote_request_needs_external_data() {
        let (proxy, stub) = endpoints();
        let result = RequestEvent::new_remote(proxy, stub, REQUEST_ID_FIRST, 1, EventDataStream::internal());
        assert!(matches!(result, Err(Error::NotExternalStream)));
    }

    #[test]
    fn test_request_through_remote_message() {
        let (proxy, stub) = endpoints();
        let mut request = RequestEvent::new_local(proxy, stub, REQUEST_ID_FIRST, 4);
        request.data_mut().writer().write_i32(2).expect("write");
        request.data_mut().writer().write_i32(3).expect("write");

        let message = request.to_remote_message(COOKIE_FIRST_REMOTE).expect("encode");
        assert_eq!(message.source(), COOKIE_FIRST_REMOTE);
        assert_eq!(message.target(), COOKIE_FIRST_REMOTE + 1);

        let bytes = message.encode().expect("frame");
        let received = RemoteMessage::decode(&bytes, DEFAULT_MAX_MESSAGE_SIZE).expect("decode");
        let decoded = RequestEvent::from_remote_message(&received).expect("request");

        assert!(decoded.is_remote());
        assert_eq!(decoded.seq_nr(), 4);
        assert_eq!(decoded.source().cookie(), COOKIE_FIRST_REMOTE);
        assert_eq!(decoded.source().thread(), "client");
        assert_eq!(decoded.target().thread(), "server");
        let mut data = decoded.data().reader();
        assert_eq!(data.read_i32().expect("a"), 2);
        assert_eq!(data.read_i32().expect("b"), 3);
    }

    #[test]
    fn test_clone_for_target_shares_data() {
        let (proxy, stub) = endpoints();
        let mut response = ResponseEvent::new_local(proxy, stub, RESPONSE_ID_FIRST, ResultType::Ok, 1);
        response.data_mut().writer().write_i32(5).expect("write");

        let mut other = response.target().clone();
        other.set_thread("second-client");
        let copy = response.clone_for_target(&other, 9);

        assert_eq!(copy.target().thread(), "second-client");
        assert_eq!(copy.seq_nr(), 9);
        assert_eq!(copy.data().as_bytes(), response.data().as_bytes());
        assert_eq!(response.target().thread(), "client");
    }

    #[test]
    fn test_notification_through_remote_message() {
        let (proxy, stub) = endpoints();
        let notification = NotificationEvent::subscribe(proxy, stub, RESPONSE_ID_FIRST);
        let message = notification.to_remote_message(COOKIE_FIRST_REMOTE).expect("encode");
        let decoded = NotificationEvent::from_remote_message(&message).expect("decode");
        assert!(decoded.is_subscribe());
        assert_eq!(decoded.message_id(), RESPONSE_ID_FIRST);
        assert_eq!(decoded.source().cookie(), COOKIE_FIRST_REMOTE);
    }
}
