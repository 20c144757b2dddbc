// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled publications for syncrelay.
//!
//! [`PublicationQueue`] is the operator-facing side: it validates references
//! and decides whether a new job starts as Draft or Queued.
//! [`PublicationScheduler`] periodically claims due jobs and hands them to the
//! adapter dispatcher.

pub mod queue;
pub mod scheduler;

pub use queue::PublicationQueue;
pub use scheduler::{PublicationScheduler, TickReport};
