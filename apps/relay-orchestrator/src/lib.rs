pub mod config;

use relay_engine::core::{NullLauncher, ProcessLauncher, RelayOrchestrator, SessionState, StatusSnapshot, TokioLauncher};
use relay_engine::store::{InMemoryStore, RelayStore};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt::format::JsonFields, layer::SubscriberExt, util::SubscriberInitExt, Layer};

pub use config::{Command, Config, ProbeArgs, RunArgs};

pub fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::registry()
		.with(if config.log_json {
			Box::new(
				tracing_subscriber::fmt::layer()
					.fmt_fields(JsonFields::default())
					.event_format(tracing_subscriber::fmt::format().json().flatten_event(true).with_span_list(false))
					.with_filter(filter),
			) as Box<dyn Layer<_> + Send + Sync>
		} else {
			Box::new(tracing_subscriber::fmt::layer().event_format(tracing_subscriber::fmt::format().pretty()).with_filter(filter))
		})
		.init();
}

/// Orchestrator plus the tasks that watch it
#[derive(Clone)]
pub struct RelayService {
	orchestrator: RelayOrchestrator,
	store: Arc<InMemoryStore>,
	cancel_token: CancellationToken,
	publisher_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RelayService {
	pub async fn build(config: &Config, dry_run: bool) -> anyhow::Result<Self> {
		let store = match &config.manifest {
			Some(path) => {
				info!("📂 Loading manifest {}", path.display());
				Arc::new(InMemoryStore::load(path).await?)
			}
			None => {
				warn!("No manifest given, starting with an empty library");
				Arc::new(InMemoryStore::new())
			}
		};

		let engine_config = config.engine_config();
		let launcher: Arc<dyn ProcessLauncher> = if dry_run {
			info!("🧪 Dry run, the encoder will not be launched");
			Arc::new(NullLauncher)
		} else {
			Arc::new(TokioLauncher::new(engine_config.stop_grace()))
		};

		let orchestrator = RelayOrchestrator::with_launcher(engine_config, store.clone(), launcher)?;
		Ok(Self::new(orchestrator, store))
	}

	pub fn new(orchestrator: RelayOrchestrator, store: Arc<InMemoryStore>) -> Self {
		Self {
			orchestrator,
			store,
			cancel_token: CancellationToken::new(),
			publisher_handle: Arc::new(Mutex::new(None)),
		}
	}

	pub const fn orchestrator(&self) -> &RelayOrchestrator {
		&self.orchestrator
	}

	pub const fn store(&self) -> &Arc<InMemoryStore> {
		&self.store
	}

	/// Start streaming and block until the session ends or shutdown is requested
	pub async fn run(&self, args: &RunArgs) -> anyhow::Result<()> {
		let output_logger = self.spawn_output_logger();

		let started = self.start_session(args).await;
		match &started {
			Ok(status) => {
				info!("🚀 Streaming asset {:?} on session {}", status.current_asset, status.session_key);
				publish(status);
				let publisher = self.spawn_state_publisher(status.state);
				*self.publisher_handle.lock().await = Some(publisher);
				self.cancel_token.cancelled().await;
			}
			Err(e) => error!("❌ Failed to start streaming: {}", e),
		}

		output_logger.abort();
		self.finish().await;
		started.map(|_| ())
	}

	async fn start_session(&self, args: &RunArgs) -> anyhow::Result<StatusSnapshot> {
		if args.loop_playlist {
			self.orchestrator.enable_loop().await?;
		}

		if let Some(asset) = args.asset_id() {
			self.orchestrator.set_current(asset).await?;
		}

		if self.store.read_status().await?.current_asset_id.is_none() {
			let first = self.store.list_assets_ordered().await?.into_iter().next();
			match first {
				Some(asset) => self.orchestrator.set_current(asset.id).await?,
				None => anyhow::bail!("the library is empty, nothing to stream"),
			}
		}

		Ok(self.orchestrator.start_selected().await?)
	}

	/// Logs every status change and ends the run once the session settles
	fn spawn_state_publisher(&self, initial: SessionState) -> JoinHandle<()> {
		let mut status_rx = self.orchestrator.subscribe();
		let cancel_token = self.cancel_token.clone();

		tokio::spawn(async move {
			let mut last = initial;

			loop {
				tokio::select! {
					() = cancel_token.cancelled() => {
						debug!("State publisher cancelled");
						break;
					}
					result = status_rx.changed() => {
						if result.is_err() {
							info!("Status channel closed");
							break;
						}

						let status = status_rx.borrow_and_update().clone();
						if status.state != last {
							publish(&status);
							last = status.state;
						}

						if session_ended(&status) {
							info!("🏁 Session ended in {}", status.state);
							cancel_token.cancel();
							break;
						}
					}
				}
			}
		})
	}

	fn spawn_output_logger(&self) -> JoinHandle<()> {
		let mut output = self.orchestrator.subscribe_output();

		tokio::spawn(async move {
			loop {
				match output.recv().await {
					Ok(line) if line.line.contains("Error") || line.line.contains("error") => {
						warn!(target: "encoder", pid = ?line.pid, "{}", line.line);
					}
					Ok(_) => {}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						debug!("Output logger skipped {} lines", skipped);
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		})
	}

	async fn finish(&self) {
		if let Some(handle) = self.publisher_handle.lock().await.take() {
			let _ = handle.await;
		}

		self.orchestrator.shutdown().await;
		info!("👋 Relay service stopped");
	}

	pub fn shutdown(&self) {
		self.cancel_token.cancel();
	}
}

fn session_ended(status: &StatusSnapshot) -> bool {
	matches!(status.state, SessionState::Idle | SessionState::Error)
}

fn publish(status: &StatusSnapshot) {
	match serde_json::to_string(status) {
		Ok(json) => info!(state = %status.state, "📡 {}", json),
		Err(e) => error!("Failed to serialize status: {}", e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;
	use relay_engine::core::AssetId;
	use std::time::Duration;

	const MANIFEST: &str = r#"{
		"assets": [
			{ "id": 1, "title": "Opening", "file": "opening.mp4", "playlist_order": 1 },
			{ "id": 2, "title": "Main", "file": "main.mp4", "playlist_order": 2 }
		],
		"target": { "platform": "custom", "endpoint_override": "rtmp://127.0.0.1:1935/live" }
	}"#;

	fn config_for(media: &tempfile::TempDir, extra: &[&str]) -> Config {
		let manifest = media.path().join("library.json");
		std::fs::write(&manifest, MANIFEST).unwrap();
		for file in ["opening.mp4", "main.mp4"] {
			std::fs::write(media.path().join(file), b"demo").unwrap();
		}

		let mut args = vec![
			"relay-orchestrator".to_string(),
			"--manifest".to_string(),
			manifest.display().to_string(),
			"--media-root".to_string(),
			media.path().display().to_string(),
			"run".to_string(),
			"--dry-run".to_string(),
		];
		args.extend(extra.iter().map(ToString::to_string));
		Config::try_parse_from(args).unwrap()
	}

	fn run_args(config: &Config) -> RunArgs {
		match &config.command {
			Command::Run(args) => args.clone(),
			Command::Probe(_) => panic!("expected run"),
		}
	}

	#[tokio::test]
	async fn dry_run_streams_first_asset_until_shutdown() {
		let media = tempfile::tempdir().unwrap();
		let config = config_for(&media, &[]);
		let service = RelayService::build(&config, true).await.unwrap();

		let runner = service.clone();
		let args = run_args(&config);
		let run = tokio::spawn(async move { runner.run(&args).await });

		let mut status = service.orchestrator().subscribe();
		tokio::time::timeout(Duration::from_secs(2), status.wait_for(StatusSnapshot::is_live)).await.unwrap().unwrap();
		assert_eq!(service.orchestrator().current_status().current_asset, Some(AssetId(1)));

		service.shutdown();
		tokio::time::timeout(Duration::from_secs(2), run).await.unwrap().unwrap().unwrap();
		assert_eq!(service.store().read_status().await.unwrap().state, SessionState::Idle);
	}

	#[tokio::test]
	async fn stopping_the_session_ends_the_run() {
		let media = tempfile::tempdir().unwrap();
		let config = config_for(&media, &["--asset", "2", "--loop-playlist"]);
		let service = RelayService::build(&config, true).await.unwrap();

		let runner = service.clone();
		let args = run_args(&config);
		let run = tokio::spawn(async move { runner.run(&args).await });

		let mut status = service.orchestrator().subscribe();
		let live = tokio::time::timeout(Duration::from_secs(2), status.wait_for(StatusSnapshot::is_live)).await.unwrap().unwrap().clone();
		assert_eq!(live.current_asset, Some(AssetId(2)));
		assert!(live.loop_enabled);

		service.orchestrator().stop().await.unwrap();
		tokio::time::timeout(Duration::from_secs(2), run).await.unwrap().unwrap().unwrap();
	}

	#[tokio::test]
	async fn empty_library_is_an_error() {
		let config = Config::try_parse_from(["relay-orchestrator", "run", "--dry-run"]).unwrap();
		let service = RelayService::build(&config, true).await.unwrap();

		assert!(service.run(&run_args(&config)).await.is_err());
		assert!(service.orchestrator().query_status().await.is_err());
	}
}
