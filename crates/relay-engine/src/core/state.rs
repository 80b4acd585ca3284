use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AssetId, SessionKey, IDLE_UPTIME};

/// Lifecycle of the relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
	#[default]
	Idle,
	Starting,
	Live,
	Stopping,
	Error,
}

impl SessionState {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Starting => "starting",
			Self::Live => "live",
			Self::Stopping => "stopping",
			Self::Error => "error",
		}
	}

	/// A process is (or is about to be) running
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Starting | Self::Live)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Observable status, published on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
	pub state: SessionState,
	pub session_key: SessionKey,
	pub current_asset: Option<AssetId>,
	pub loop_enabled: bool,
	pub started_at: Option<DateTime<Utc>>,
	pub uptime: String,
	pub pid: Option<u32>,
	pub active_processes: usize,
	/// False when the live process was tracked without OS process support
	pub exit_events: bool,
	pub last_error: Option<String>,
}

impl StatusSnapshot {
	pub fn idle(session_key: SessionKey) -> Self {
		Self {
			state: SessionState::Idle,
			session_key,
			current_asset: None,
			loop_enabled: false,
			started_at: None,
			uptime: IDLE_UPTIME.to_string(),
			pid: None,
			active_processes: 0,
			exit_events: true,
			last_error: None,
		}
	}

	pub const fn is_live(&self) -> bool {
		matches!(self.state, SessionState::Live)
	}
}

impl Default for StatusSnapshot {
	fn default() -> Self {
		Self::idle(SessionKey::default())
	}
}
