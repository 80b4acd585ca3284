use clap::{Args, Parser, Subcommand};
use relay_engine::core::{AssetId, EngineConfig};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "Relay stored videos to streaming platforms", long_about = None)]
pub struct Config {
	/// Use JSON formatting for tracing
	#[arg(long, env = "LOG_JSON", default_value = "false", global = true)]
	pub log_json: bool,

	/// Log filter directives
	#[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
	pub rust_log: String,

	/// Encoder executable
	#[arg(long, env = "ENCODER_PATH", default_value = "ffmpeg", global = true)]
	pub encoder_path: String,

	/// JSON manifest listing assets and the active stream target
	#[arg(long, env = "RELAY_MANIFEST", global = true)]
	pub manifest: Option<PathBuf>,

	/// Base directory for relative asset paths
	#[arg(long, env = "MEDIA_ROOT", global = true)]
	pub media_root: Option<PathBuf>,

	/// Name of the output session
	#[arg(long, env = "SESSION_KEY", default_value = "primary", global = true)]
	pub session_key: String,

	/// Milliseconds to wait after SIGTERM before killing the encoder
	#[arg(long, env = "STOP_GRACE_MS", default_value = "5000", global = true)]
	pub stop_grace_ms: u64,

	/// Milliseconds between uptime writes
	#[arg(long, env = "UPTIME_INTERVAL_MS", default_value = "1000", global = true)]
	pub uptime_interval_ms: u64,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
	/// Stream the selected asset until stopped
	Run(RunArgs),
	/// Check that the encoder is installed and report its version
	Probe(ProbeArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
	/// Asset to select before starting
	#[arg(long)]
	pub asset: Option<u64>,

	/// Keep advancing through the playlist
	#[arg(long = "loop-playlist", env = "LOOP_PLAYLIST")]
	pub loop_playlist: bool,

	/// Track sessions without launching the encoder
	#[arg(long, env = "DRY_RUN")]
	pub dry_run: bool,
}

impl RunArgs {
	pub fn asset_id(&self) -> Option<AssetId> {
		self.asset.map(AssetId)
	}
}

#[derive(Args, Clone, Debug)]
pub struct ProbeArgs {
	/// Give up after this many milliseconds
	#[arg(long, default_value = "10000")]
	pub timeout_ms: u64,
}

impl Config {
	pub fn engine_config(&self) -> EngineConfig {
		let config = EngineConfig::new()
			.with_session_key(self.session_key.clone())
			.with_encoder_path(self.encoder_path.clone())
			.with_stop_grace(self.stop_grace_ms)
			.with_uptime_cadence(self.uptime_interval_ms);

		match &self.media_root {
			Some(root) => config.with_media_root(root.clone()),
			None => config,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_flags_parse() {
		let config = Config::try_parse_from(["relay-orchestrator", "run", "--asset", "7", "--loop-playlist", "--dry-run", "--media-root", "/srv/media"]).unwrap();

		let Command::Run(args) = &config.command else {
			panic!("expected run");
		};
		assert_eq!(args.asset_id(), Some(AssetId(7)));
		assert!(args.loop_playlist);
		assert!(args.dry_run);

		let engine = config.engine_config();
		assert_eq!(engine.media_root, Some(PathBuf::from("/srv/media")));
		assert_eq!(engine.session_key.as_str(), "primary");
	}

	#[test]
	fn probe_defaults_to_ten_seconds() {
		let config = Config::try_parse_from(["relay-orchestrator", "--encoder-path", "/opt/ffmpeg", "probe"]).unwrap();

		let Command::Probe(args) = config.command else {
			panic!("expected probe");
		};
		assert_eq!(args.timeout_ms, 10_000);
		assert_eq!(config.encoder_path, "/opt/ffmpeg");
	}
}
