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

//! Copy-on-write buffer integration tests

use svcbus::buffer::{FileStream, RingStream};
use svcbus::config::MAX_BUFFER_SIZE;
use svcbus::{BufferKind, BufferStream, ByteBuffer, InStream, OutStream};

#[test]
fn test_shared_copies_detach_on_write() {
    let original = ByteBuffer::from_slice(BufferKind::Shared, b"hello");
    let mut copy = original.clone();
    assert!(original.is_shared());
    assert!(copy.is_shared());

    assert_eq!(copy.write_at(0, b"J"), 1);
    assert_eq!(copy.payload(), b"Jello");
    assert_eq!(original.payload(), b"hello");
    assert!(!original.is_shared());
    assert!(!copy.is_shared());
}

#[test]
fn test_internal_copies_are_deep() {
    let original = ByteBuffer::from_slice(BufferKind::Internal, b"abc");
    let copy = original.clone();
    assert!(!original.is_shared());
    assert!(!copy.is_shared());
    assert_eq!(copy, original);
}

#[test]
fn test_reserve_is_capped() {
    let mut buffer = ByteBuffer::new(BufferKind::Shared);
    buffer.reserve(MAX_BUFFER_SIZE + 1, false);
    assert!(buffer.length() <= MAX_BUFFER_SIZE);

    let mut small = ByteBuffer::from_slice(BufferKind::Shared, b"x");
    assert_eq!(small.write_at(MAX_BUFFER_SIZE, b"y"), 0);
    assert_eq!(small.payload(), b"x");
}

#[test]
fn test_stream_shares_buffer_with_reader() {
    let mut writer = BufferStream::new(BufferKind::Remote);
    writer.write_u32(0xDEAD_BEEF).expect("u32");
    writer.write_string("svcbus").expect("string");

    let mut reader = BufferStream::from_buffer(writer.buffer().clone());
    assert!(writer.buffer().is_shared());
    assert_eq!(reader.read_u32().expect("u32"), 0xDEAD_BEEF);
    assert_eq!(reader.read_string().expect("string"), "svcbus");
    assert_eq!(reader.bytes_available(), 0);
    assert!(reader.read_u8().is_err());
}

#[test]
fn test_ring_and_file_streams() {
    let mut ring = RingStream::new(8);
    ring.write_u32(7).expect("u32");
    assert_eq!(ring.read_u32().expect("u32"), 7);

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("stream.bin");
    {
        let mut file = FileStream::create(&path).expect("create");
        file.write_i64(-42).expect("i64");
    }
    let mut file = FileStream::open(&path).expect("open");
    assert_eq!(file.read_i64().expect("i64"), -42);
}
