mod commands;
mod config;
mod encoder;
mod endpoint;
mod engine;
mod error;
mod launcher;
mod orchestrator;
mod playlist;
mod probe;
mod registry;
mod state;
mod uptime;

pub use crate::model::{AssetId, Platform, Resolution, SessionKey, StreamTarget, VideoAsset};

pub use config::{EngineConfig, DEFAULT_ENCODER};
pub use encoder::{build_args, display_command};
pub use endpoint::{base_endpoint, resolve_endpoint, FACEBOOK_INGEST, LOCAL_INGEST, TWITCH_INGEST, YOUTUBE_INGEST};
pub use engine::{transition, RelayEngine, SessionEvent};
pub use error::{RelayError, Result};
pub use launcher::{NullLauncher, OutputLine, OutputSink, OutputStream, ProcessExit, ProcessHandle, ProcessLauncher, SpawnedProcess, TokioLauncher};
pub use orchestrator::RelayOrchestrator;
pub use playlist::PlaylistCursor;
pub use probe::{parse_version, probe_encoder};
pub use registry::{ExitNotice, ProcessRegistry, RegisteredProcess};
pub use state::{SessionState, StatusSnapshot};
pub use uptime::{format_uptime, UptimeTracker, IDLE_UPTIME};
