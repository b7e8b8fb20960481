// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stub (provider) and proxy (consumer) endpoint addresses.

use super::channel::{Channel, INVALID_CHANNEL};
use super::ServiceAddress;
use crate::ser::{InStream, OutStream, StreamResult, Streamable};
use std::fmt;
use std::hash::{Hash, Hasher};

macro_rules! endpoint_address {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        ///
        /// Two endpoints are equal when they name the same service from the
        /// same thread over the same connection (`cookie`).
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            address: ServiceAddress,
            thread: String,
            channel: Channel,
        }

        impl $name {
            pub fn new(address: ServiceAddress, thread: impl Into<String>, channel: Channel) -> Self {
                Self {
                    address,
                    thread: thread.into(),
                    channel,
                }
            }

            /// Endpoint living in this process.
            pub fn local(address: ServiceAddress, thread: impl Into<String>) -> Self {
                Self::new(address, thread, Channel::local())
            }

            pub const fn invalid() -> Self {
                Self {
                    address: ServiceAddress::invalid(),
                    thread: String::new(),
                    channel: INVALID_CHANNEL,
                }
            }

            #[inline]
            pub fn service_address(&self) -> &ServiceAddress {
                &self.address
            }

            #[inline]
            pub fn thread(&self) -> &str {
                &self.thread
            }

            #[inline]
            pub fn channel(&self) -> Channel {
                self.channel
            }

            #[inline]
            pub fn cookie(&self) -> u64 {
                self.channel.cookie()
            }

            pub fn set_thread(&mut self, thread: impl Into<String>) {
                self.thread = thread.into();
            }

            pub fn set_channel(&mut self, channel: Channel) {
                self.channel = channel;
            }

            pub fn set_role_name(&mut self, role_name: impl Into<String>) {
                self.address.set_role_name(role_name);
            }

            pub fn is_valid(&self) -> bool {
                self.address.is_valid() && self.channel.is_valid()
            }

            pub fn is_local(&self) -> bool {
                self.channel.is_local()
            }

            /// Path of the embedded service address.
            pub fn convert_address_to_path(&self) -> String {
                self.address.convert_address_to_path()
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.address == other.address
                    && self.thread == other.thread
                    && self.channel.cookie() == other.channel.cookie()
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.address.hash(state);
                self.thread.hash(state);
                self.channel.cookie().hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!($label, " {}@{} [{}]"),
                    self.address, self.thread, self.channel
                )
            }
        }

        impl Streamable for $name {
            fn write_to<S: OutStream>(&self, out: &mut S) -> StreamResult<()> {
                self.address.write_to(out)?;
                out.write_string(&self.thread)?;
                self.channel.write_to(out)
            }

            fn read_from<S: InStream>(input: &mut S) -> StreamResult<Self> {
                let address = ServiceAddress::read_from(input)?;
                let thread = input.read_string()?;
                let channel = Channel::read_from(input)?;
                Ok(Self::new(address, thread, channel))
            }
        }
    };
}

endpoint_address!(
    /// Address of a service provider.
    StubAddress,
    "stub"
);

endpoint_address!(
    /// Address of a service consumer.
    ProxyAddress,
    "proxy"
);

impl StubAddress {
    /// True if `proxy` asks for the service this stub offers.
    pub fn is_proxy_compatible(&self, proxy: &ProxyAddress) -> bool {
        self.address == proxy.address
    }
}

// The thread is direction specific: it never carries over.
impl From<&StubAddress> for ProxyAddress {
    fn from(stub: &StubAddress) -> Self {
        Self::new(stub.address.clone(), String::new(), stub.channel)
    }
}

impl From<&ProxyAddress> for StubAddress {
    fn from(proxy: &ProxyAddress) -> Self {
        Self::new(proxy.address.clone(), String::new(), proxy.channel)
    }
}

impl From<StubAddress> for ProxyAddress {
    fn from(stub: StubAddress) -> Self {
        Self::new(stub.address, String::new(), stub.channel)
    }
}

impl From<ProxyAddress> for StubAddress {
    fn from(proxy: ProxyAddress) -> Self {
        Self::new(proxy.address, String::new(), proxy.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{ServiceType, Version};
    use crate::ser::SliceStream;

    fn calc() -> ServiceAddress {
        ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calculator")
    }

    #[test]
    fn test_conversion_drops_thread() {
        let stub = StubAddress::new(calc(), "provider-thread", Channel::new(256, 0, 256));
        let proxy = ProxyAddress::from(&stub);
        assert_eq!(proxy.service_address(), stub.service_address());
        assert_eq!(proxy.channel(), stub.channel());
        assert!(proxy.thread().is_empty());
        assert!(stub.is_proxy_compatible(&proxy));

        let back = StubAddress::from(proxy);
        assert_eq!(back.service_address(), stub.service_address());
        assert!(back.thread().is_empty());
    }

    #[test]
    fn test_identity_ignores_source_and_target() {
        let a = ProxyAddress::new(calc(), "consumer", Channel::new(1, 2, 300));
        let b = ProxyAddress::new(calc(), "consumer", Channel::new(9, 9, 300));
        let c = ProxyAddress::new(calc(), "consumer", Channel::new(1, 2, 301));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_validity_needs_channel() {
        let mut stub = StubAddress::local(calc(), "provider");
        assert!(stub.is_valid());
        assert!(stub.is_local());
        stub.set_channel(INVALID_CHANNEL);
        assert!(!stub.is_valid());
        assert!(!StubAddress::invalid().is_valid());
    }

    #[test]
    fn test_stream_round_trip() {
        let proxy = ProxyAddress::new(calc(), "consumer", Channel::new(256, 2, 256));
        let mut out = Vec::new();
        out.write_object(&proxy).expect("write");
        let back: ProxyAddress = SliceStream::new(&out).read_object().expect("read");
        assert_eq!(back, proxy);
        assert_eq!(back.channel(), proxy.channel());
    }
}
