use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::SessionKey;

pub const DEFAULT_ENCODER: &str = "ffmpeg";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
	pub session_key: SessionKey,
	pub encoder_path: String,
	/// Base directory for relative asset file locators
	pub media_root: Option<PathBuf>,
	pub stop_grace_ms: u64,
	pub uptime_cadence_ms: u64,
	pub output_buffer: usize,
}

impl EngineConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
		self.session_key = SessionKey::new(key);
		self
	}

	pub fn with_encoder_path(mut self, path: impl Into<String>) -> Self {
		self.encoder_path = path.into();
		self
	}

	pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.media_root = Some(root.into());
		self
	}

	pub fn with_stop_grace(mut self, ms: u64) -> Self {
		self.stop_grace_ms = ms;
		self
	}

	pub fn with_uptime_cadence(mut self, ms: u64) -> Self {
		self.uptime_cadence_ms = ms;
		self
	}

	pub fn stop_grace(&self) -> Duration {
		Duration::from_millis(self.stop_grace_ms)
	}

	pub fn uptime_cadence(&self) -> Duration {
		Duration::from_millis(self.uptime_cadence_ms)
	}

	/// Absolute locators are used as-is
	pub fn resolve_media(&self, file: &Path) -> PathBuf {
		match &self.media_root {
			Some(root) if file.is_relative() => root.join(file),
			_ => file.to_path_buf(),
		}
	}

	pub fn validate(&self) -> Result<(), String> {
		if self.session_key.as_str().trim().is_empty() {
			return Err("Session key must not be empty".to_string());
		}
		if self.encoder_path.trim().is_empty() {
			return Err("Encoder path must not be empty".to_string());
		}
		if self.uptime_cadence_ms == 0 {
			return Err("Uptime cadence must be positive".to_string());
		}
		if self.output_buffer == 0 {
			return Err("Output buffer must hold at least one line".to_string());
		}
		Ok(())
	}
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			session_key: SessionKey::default(),
			encoder_path: DEFAULT_ENCODER.to_string(),
			media_root: None,
			stop_grace_ms: 5_000,
			uptime_cadence_ms: 1_000,
			output_buffer: 256,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn relative_files_land_under_media_root() {
		let config = EngineConfig::new().with_media_root("/srv/media");
		assert_eq!(config.resolve_media(Path::new("clip.mp4")), PathBuf::from("/srv/media/clip.mp4"));
		assert_eq!(config.resolve_media(Path::new("/tmp/clip.mp4")), PathBuf::from("/tmp/clip.mp4"));
		assert_eq!(EngineConfig::new().resolve_media(Path::new("clip.mp4")), PathBuf::from("clip.mp4"));
	}

	#[test]
	fn rejects_empty_session_key() {
		assert!(EngineConfig::new().with_session_key(" ").validate().is_err());
		assert!(EngineConfig::new().with_uptime_cadence(0).validate().is_err());
		assert!(EngineConfig::new().validate().is_ok());
	}
}
