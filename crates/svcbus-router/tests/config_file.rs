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

//! Router configuration file tests

use std::io::Write;
use svcbus_router::{ConfigError, RouterConfig, RouterError, RouterServer};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file.flush().expect("flush");
    file
}

#[test]
fn test_load_config_file() {
    let file = write_config(
        r#"
[router]
name = "lab-router"
max_connections = 8
log_level = "debug"

[connection.tcpip]
address = "127.0.0.1"
port = 0
"#,
    );
    let config = RouterConfig::from_file(file.path()).expect("load");
    assert_eq!(config.router.name, "lab-router");
    assert_eq!(config.router.max_connections, 8);
    assert_eq!(config.router.log_level, "debug");
    assert_eq!(config.tcpip().port, 0);

    let server = RouterServer::bind(config).expect("bind");
    assert_ne!(server.local_address().port(), 0);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = RouterConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_invalid_file_is_rejected_by_bind() {
    let file = write_config("[router]\nmax_connections = 0\n");
    let err = RouterConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let mut config = RouterConfig::listen("127.0.0.1", 0);
    config.router.max_message_size = 0;
    assert!(matches!(RouterServer::bind(config), Err(RouterError::Config(_))));
}

#[test]
fn test_generated_config_loads_back() {
    let mut config = RouterConfig::listen("0.0.0.0", 9100);
    config.router.name = "generated".into();
    let file = write_config(&config.to_toml().expect("serialize"));
    assert_eq!(RouterConfig::from_file(file.path()).expect("load"), config);
}
