// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate and abuse guards.
//!
//! A [`RateGuard`] counts events per identity in a [`CounterStore`]
//! (in-process [`MemoryCounterStore`] or the shared SQLite table) and rejects
//! identities that exceed the configured limit. [`LoginGuard`] wraps one for
//! failed authentication attempts keyed by client address.
//!
//! Elapsed windows are removed by [`run_counter_pruner`].
//!
//! Windows are fixed, not sliding: a burst straddling a window boundary may
//! admit up to twice the limit.
//!
//! [`CounterStore`]: syncrelay_core::CounterStore

pub mod login;
pub mod memory;
pub mod pruner;
pub mod rate;

pub use login::LoginGuard;
pub use memory::MemoryCounterStore;
pub use pruner::run_counter_pruner;
pub use rate::RateGuard;
