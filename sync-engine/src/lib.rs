//! Metrics synchronization engine for pulseboard.
//!
//! Pulls daily analytics from connected creator platforms and merges them
//! into durable per-day snapshots. Each platform implements the
//! [`MetricsProvider`] trait; the [`SyncEngine`] drives a full pull cycle
//! over a trailing date window, tolerating partial failures.
//!
//! # Architecture
//!
//! ```text
//! Platform API (YouTube, Twitter, Instagram)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │   MetricsProvider (implements trait)     │
//! │  - Fetch raw counters per date range     │
//! │  - Normalize to DayMetrics               │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │   SyncEngine                             │
//! │  - Resolve a valid token (pulseboard)    │
//! │  - Chunk the window into units           │
//! │  - Upsert snapshots, contain failures    │
//! └─────────────────────────────────────────┘
//!          ↓
//!   SnapshotStore (one row per user/provider/day)
//! ```
//!
//! # Core types
//!
//! - [`MetricsProvider`] - Trait each platform adapter implements
//! - [`DayMetrics`] - One day's normalized counters
//! - [`SyncEngine`] / [`SyncOutcome`] - Pull cycle and its structured result
//! - [`SnapshotStore`] - Durable per-day metrics storage

mod engine;
mod provider;
mod snapshot;

pub mod providers;
pub mod registry;
pub mod scheduler;

pub use engine::{SyncEngine, SyncOutcome, UnitFailure, DEFAULT_WINDOW_DAYS};
pub use provider::{DayMetrics, MetricsProvider};
pub use snapshot::{MetricsSnapshot, SnapshotStore};
