// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for syncrelay integration tests.
//!
//! Provides a scripted dispatcher and a harness wiring the whole engine to a
//! temporary SQLite database, so tests run without any platform adapter.
//!
//! # Components
//!
//! - [`MockDispatcher`] - Records relays, edits and publishes; failures can be scripted
//! - [`TestHarness`] - Storage, registry, coordinator, queue and scheduler on a temp DB

pub mod harness;
pub mod mock_dispatcher;

pub use harness::{TestHarness, TestHarnessBuilder, create_event, edit_event};
pub use mock_dispatcher::{EditCall, MockDispatcher, RelayCall};
