//! Orchestration engine that relays stored video files to streaming platforms
//! through an external encoder process.

pub mod core;
pub mod model;
pub mod store;

pub use crate::core::{EngineConfig, RelayError, RelayOrchestrator, Result, SessionState, StatusSnapshot};
pub use crate::store::{InMemoryStore, RelayStore};
