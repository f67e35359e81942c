//! Integration tests for streamify
//!
//! Tests are organized by component:
//! - session_test: Playback session against in-memory fakes (paused time)
//! - streamhive_test: StreamHive client, resolver and progress store against a mock server
//! - cli_test: Argument parsing and JSON output
//! - ui_test: Player screen rendering

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
