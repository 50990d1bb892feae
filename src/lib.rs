//! Retrace - client-side checkpoint timeline and session cache
//!
//! This library manages a client-side view of an append-only sequence of
//! immutable project checkpoints owned by an external versioning backend,
//! and a TTL-bounded local cache of in-progress conversational sessions.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `api`: the consumed checkpoint backend boundary (trait + wire types)
//! - `timeline`: the timeline controller - load, order, enrich with
//!   incremental diff statistics, and reconcile under concurrent triggers
//! - `registry`: the session registry - a 24-hour-TTL cache persisted as a
//!   single JSON blob with lazy expiry and write-on-read compaction
//! - `push`: named-topic push channel fed by the host's transport
//! - `config`: tuning knobs with serde defaults and YAML loading
//! - `error`: error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use retrace::{Config, TimelineController, TimelineScope};
//! use retrace::api::CheckpointApi;
//!
//! async fn open_timeline(api: Arc<dyn CheckpointApi>) {
//!     let config = Config::default();
//!     let controller = TimelineController::new(
//!         api,
//!         TimelineScope::session("session-1", "/work/project"),
//!         config.timeline,
//!     );
//!     controller.load().await;
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod push;
pub mod registry;
pub mod timeline;

// Re-export commonly used types
pub use config::{Config, RegistryConfig, TimelineConfig};
pub use error::{Result, RetraceError};
pub use push::{checkpoint_created_topic, PushBus};
pub use registry::{SessionRegistry, StoredSession};
pub use timeline::{
    ActivePosition, EnrichedCheckpoint, ForkResult, LoadMode, PairDiffState, RestoreRequest,
    TimelineController, TimelineScope, TimelineState,
};

#[cfg(test)]
pub mod test_utils;
