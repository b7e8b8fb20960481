// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_precision_loss)] // Stats/metrics need this
#![allow(clippy::cast_sign_loss)] // Test data conversions
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::unreadable_literal)] // Large test constants
#![allow(clippy::doc_markdown)] // Test documentation
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::missing_errors_doc)] // Test documentation
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::module_name_repetitions)] // Test modules
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::match_same_arms)] // Test pattern matching
#![allow(clippy::no_effect_underscore_binding)] // Test variables
#![allow(clippy::wildcard_imports)] // Test utility imports
#![allow(clippy::redundant_closure_for_method_calls)] // Test code clarity
#![allow(clippy::similar_names)] // Test variable naming
#![allow(clippy::shadow_unrelated)] // Test scoping
#![allow(clippy::needless_pass_by_value)] // Test functions
#![allow(clippy::cast_possible_wrap)] // Test conversions
#![allow(clippy::single_match_else)] // Test clarity
#![allow(clippy::needless_continue)] // Test logic
#![allow(clippy::cast_lossless)] // Test simplicity
#![allow(clippy::match_wild_err_arm)] // Test error handling
#![allow(clippy::explicit_iter_loop)] // Test iteration
#![allow(clippy::must_use_candidate)] // Test functions
#![allow(clippy::if_not_else)] // Test conditionals
#![allow(clippy::map_unwrap_or)] // Test options
#![allow(clippy::match_wildcard_for_single_variants)] // Test patterns
#![allow(clippy::ignored_unit_patterns)] // Test closures
#![allow(clippy::ignore_without_reason)] // Test ignore attributes

//! Remote service integration tests
//!
//! Two service managers (standing in for two processes) connect to one
//! router on loopback; a proxy in the first calls a stub in the second.

use crossbeam::channel::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;
use svcbus::config::ConnectionSettings;
use svcbus::event::EventDataStream;
use svcbus::interface::{REQUEST_ID_FIRST, RESPONSE_ID_FIRST};
use svcbus::{
    ConnectionChange, DispatcherThread, Event, EventClass, EventConsumer, InStream, OutStream,
    ProxyAddress, RequestEvent, ResponseEvent, ResultType, ServiceAddress, ServiceConnection,
    ServiceManager, ServiceManagerHandle, ServiceType, StubAddress, Version,
};
use svcbus_router::{RouterConfig, RouterServer};

const ADD: u32 = REQUEST_ID_FIRST + 1;
const SUM: u32 = RESPONSE_ID_FIRST + 1;
const TIMEOUT: Duration = Duration::from_secs(5);

fn calc() -> ServiceAddress {
    ServiceAddress::with("Calc", Version::new(1, 0, 0), ServiceType::Public, "calc")
}

/// Answers `Add(a, b)` with `Sum(a + b)`.
struct CalcServer {
    manager: ServiceManagerHandle,
    changes: Sender<ConnectionChange>,
}

impl EventConsumer for CalcServer {
    fn process_event(&self, event: &Event) -> bool {
        match event {
            Event::ServiceConnection(change) => {
                let _ = self.changes.send(change.clone());
                true
            }
            Event::Request(request) if request.message_id() == ADD => {
                let mut input = request.data().reader();
                let a = input.read_i32().expect("a");
                let b = input.read_i32().expect("b");

                let mut data = EventDataStream::external();
                data.writer().write_i32(a + b).expect("sum");
                let response = ResponseEvent::new_remote(
                    request.source().clone(),
                    request.target().clone(),
                    SUM,
                    ResultType::Ok,
                    request.seq_nr(),
                    data,
                )
                .expect("external data");
                self.manager
                    .send_event(Event::Response(response))
                    .expect("send response");
                true
            }
            _ => false,
        }
    }
}

/// Reports connection changes and sums to the test.
struct CalcClient {
    changes: Sender<ConnectionChange>,
    sums: Sender<(u64, ResultType, i32)>,
}

impl EventConsumer for CalcClient {
    fn process_event(&self, event: &Event) -> bool {
        match event {
            Event::ServiceConnection(change) => {
                let _ = self.changes.send(change.clone());
                true
            }
            Event::Response(response) if response.message_id() == SUM => {
                let sum = response.data().reader().read_i32().expect("sum");
                let _ = self.sums.send((response.seq_nr(), response.result(), sum));
                true
            }
            _ => false,
        }
    }
}

fn start_router() -> (RouterServer, ConnectionSettings) {
    let mut server = RouterServer::bind(RouterConfig::listen("127.0.0.1", 0)).expect("bind");
    server.start().expect("start");
    let settings = ConnectionSettings::tcpip("127.0.0.1", server.local_address().port());
    (server, settings)
}

fn wait_status(changes: &Receiver<ConnectionChange>, status: ServiceConnection) -> ConnectionChange {
    loop {
        let change = changes.recv_timeout(TIMEOUT).expect("connection change");
        if change.status == status {
            return change;
        }
    }
}

#[test]
fn test_remote_add_through_router() {
    let (mut router, settings) = start_router();

    let provider = ServiceManager::start_named("e2e-add-manager-provider").expect("provider");
    let consumer = ServiceManager::start_named("e2e-add-manager-consumer").expect("consumer");
    let provider_cookie = provider.connect_router(&settings).expect("provider link");
    let consumer_cookie = consumer.connect_router(&settings).expect("consumer link");
    assert_ne!(provider_cookie, consumer_cookie);

    let server = DispatcherThread::start("e2e-add-server").expect("server thread");
    let client = DispatcherThread::start("e2e-add-client").expect("client thread");

    let (server_tx, server_changes) = channel::unbounded();
    let calc_server: Arc<dyn EventConsumer> = Arc::new(CalcServer {
        manager: provider.handle(),
        changes: server_tx,
    });
    server
        .handle()
        .register_event_consumer(EventClass::Request, calc_server.clone());
    server
        .handle()
        .register_event_consumer(EventClass::ServiceConnection, calc_server);

    let (client_tx, client_changes) = channel::unbounded();
    let (sums_tx, sums) = channel::unbounded();
    let calc_client: Arc<dyn EventConsumer> = Arc::new(CalcClient {
        changes: client_tx,
        sums: sums_tx,
    });
    client
        .handle()
        .register_event_consumer(EventClass::Response, calc_client.clone());
    client
        .handle()
        .register_event_consumer(EventClass::ServiceConnection, calc_client);

    let proxy = ProxyAddress::local(calc(), "e2e-add-client");
    provider
        .handle()
        .register_stub(StubAddress::local(calc(), "e2e-add-server"))
        .expect("register stub");
    consumer.handle().register_proxy(proxy.clone()).expect("register proxy");

    let bound = wait_status(&client_changes, ServiceConnection::Connected);
    assert_eq!(bound.stub.cookie(), provider_cookie);
    assert_eq!(bound.proxy.cookie(), consumer_cookie);
    let seen_by_server = wait_status(&server_changes, ServiceConnection::Connected);
    assert_eq!(seen_by_server.proxy.thread(), "e2e-add-client");

    let mut data = EventDataStream::external();
    {
        let out = data.writer();
        out.write_i32(2).expect("a");
        out.write_i32(3).expect("b");
    }
    let request = RequestEvent::new_remote(proxy, bound.stub.clone(), ADD, 7, data).expect("request");
    consumer
        .handle()
        .send_event(Event::Request(request))
        .expect("send request");

    let (seq_nr, result, sum) = sums.recv_timeout(TIMEOUT).expect("sum");
    assert_eq!(seq_nr, 7);
    assert_eq!(result, ResultType::Ok);
    assert_eq!(sum, 5);

    // Losing the provider's link puts the proxy back to Pending.
    provider.disconnect_router();
    let lost = wait_status(&client_changes, ServiceConnection::Pending);
    assert_eq!(lost.stub.service_address(), &calc());

    router.stop();
}

#[test]
fn test_consumer_waits_for_late_provider() {
    let (_router, settings) = start_router();

    let consumer = ServiceManager::start_named("e2e-late-manager-consumer").expect("consumer");
    let provider = ServiceManager::start_named("e2e-late-manager-provider").expect("provider");
    consumer.connect_router(&settings).expect("consumer link");

    let client = DispatcherThread::start("e2e-late-client").expect("client thread");
    let (client_tx, client_changes) = channel::unbounded();
    let (sums_tx, _sums) = channel::unbounded();
    client.handle().register_event_consumer(
        EventClass::ServiceConnection,
        Arc::new(CalcClient {
            changes: client_tx,
            sums: sums_tx,
        }),
    );
    consumer
        .handle()
        .register_proxy(ProxyAddress::local(calc(), "e2e-late-client"))
        .expect("register proxy");

    assert!(client_changes.recv_timeout(Duration::from_millis(200)).is_err());

    // The provider registers before it even joins the network.
    provider
        .handle()
        .register_stub(StubAddress::local(calc(), "e2e-late-server"))
        .expect("register stub");
    let provider_cookie = provider.connect_router(&settings).expect("provider link");

    let bound = wait_status(&client_changes, ServiceConnection::Connected);
    assert_eq!(bound.stub.cookie(), provider_cookie);
    assert_eq!(bound.stub.thread(), "e2e-late-server");
}
