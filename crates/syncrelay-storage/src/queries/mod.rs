// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table family. Each function takes `&Database` and
//! runs on the shared writer thread.

pub mod catalog;
pub mod counters;
pub mod health;
pub mod pairings;
pub mod publications;
pub mod sync_records;
