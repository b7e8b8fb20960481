// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service manager, router link and proxy bindings of a process.

mod manager;
mod proxy;
mod router_client;

pub use manager::{ServiceManager, ServiceManagerHandle};
pub use proxy::ProxyBinding;
pub use router_client::{RouterClient, RouterSender};
