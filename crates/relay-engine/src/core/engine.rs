use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::commands::EngineCommand;
use super::encoder::{build_args, display_command};
use super::endpoint::resolve_endpoint;
use super::error::{RelayError, Result};
use super::launcher::{OutputLine, ProcessLauncher};
use super::playlist::PlaylistCursor;
use super::registry::{ExitNotice, ProcessRegistry, RegisteredProcess};
use super::uptime::{format_uptime, UptimeTracker, IDLE_UPTIME};
use super::{AssetId, EngineConfig, SessionKey, SessionState, StatusSnapshot, StreamTarget, VideoAsset};
use crate::store::RelayStore;

/// Time left for a kill to land after the grace period
const KILL_ALLOWANCE: Duration = Duration::from_secs(2);

// ============================================================================
// Session - Owns everything tied to the live encoder
// ============================================================================

struct Session {
	asset: AssetId,
	target: StreamTarget,
	pid: Option<u32>,
	exit_events: bool,
	started_at: Instant,
	started_at_utc: DateTime<Utc>,
	uptime: UptimeTracker,
}

// ============================================================================
// Pure FSM - Returns only the next state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
	/// A start request (explicit or loop driven) passed validation
	Start,
	Spawned,
	/// Spawn failure, crash, or a loop restart that could not proceed
	Fail,
	Stop,
	Stopped,
	/// Natural exit with nothing to chain
	Exit,
}

/// Pure FSM: validates transitions only
pub fn transition(state: SessionState, event: SessionEvent) -> Result<SessionState> {
	use SessionEvent as E;
	use SessionState as S;

	Ok(match (state, event) {
		// Live may be replaced in place, Error recovers through a new start
		(S::Idle | S::Live | S::Error, E::Start) => S::Starting,

		(S::Starting, E::Spawned) => S::Live,
		(S::Starting | S::Live, E::Fail) => S::Error,

		(S::Starting | S::Live | S::Error, E::Stop) => S::Stopping,
		(S::Idle | S::Stopping, E::Stop) => state, // Idempotent
		(S::Stopping, E::Stopped) => S::Idle,

		(S::Live, E::Exit) => S::Idle,

		(from, event) => return Err(RelayError::Internal(format!("no transition from {from} on {event:?}"))),
	})
}

// ============================================================================
// RelayEngine
// ============================================================================

pub struct RelayEngine {
	config: EngineConfig,
	store: Arc<dyn RelayStore>,
	registry: ProcessRegistry,
	exit_rx: mpsc::UnboundedReceiver<ExitNotice>,
	output_tx: broadcast::Sender<OutputLine>,
	status_tx: watch::Sender<StatusSnapshot>,
	status_rx: watch::Receiver<StatusSnapshot>,

	state: SessionState,
	session: Option<Session>,
	cursor: PlaylistCursor,
	loop_enabled: bool,
	current_asset: Option<AssetId>,
	/// Generations whose exit must not be acted upon
	pending_stops: HashSet<u64>,
	last_error: Option<String>,
}

impl RelayEngine {
	pub fn new(config: EngineConfig, store: Arc<dyn RelayStore>, launcher: Arc<dyn ProcessLauncher>) -> Result<Self> {
		config.validate().map_err(RelayError::InvalidConfig)?;

		let (exit_tx, exit_rx) = mpsc::unbounded_channel();
		let (output_tx, _) = broadcast::channel(config.output_buffer);
		let (status_tx, status_rx) = watch::channel(StatusSnapshot::idle(config.session_key.clone()));
		let registry = ProcessRegistry::new(launcher, exit_tx, output_tx.clone());

		info!(session = %config.session_key, encoder = %config.encoder_path, "RelayEngine created");

		Ok(Self {
			config,
			store,
			registry,
			exit_rx,
			output_tx,
			status_tx,
			status_rx,
			state: SessionState::Idle,
			session: None,
			cursor: PlaylistCursor::new(),
			loop_enabled: false,
			current_asset: None,
			pending_stops: HashSet::new(),
			last_error: None,
		})
	}

	pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
		self.status_rx.clone()
	}

	pub fn output_sender(&self) -> broadcast::Sender<OutputLine> {
		self.output_tx.clone()
	}

	pub async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<EngineCommand>, cancel: CancellationToken) {
		self.restore().await;
		info!("🚀 Relay engine started");

		let shutdown_ack = loop {
			tokio::select! {
				Some(notice) = self.exit_rx.recv() => {
					self.on_process_exit(notice).await;
				}

				cmd = command_rx.recv() => match cmd {
					Some(cmd) => {
						if let Some(ack) = self.handle_command(cmd).await {
							break Some(ack);
						}
					}
					None => {
						info!("All orchestrator handles dropped");
						break None;
					}
				},

				() = cancel.cancelled() => {
					info!("Relay engine cancelled");
					break None;
				}
			}
		};

		self.shutdown().await;
		if let Some(ack) = shutdown_ack {
			let _ = ack.send(());
		}
	}

	/// Returns the acknowledgement channel when shutdown was requested
	async fn handle_command(&mut self, cmd: EngineCommand) -> Option<oneshot::Sender<()>> {
		debug!(command = cmd.name(), state = %self.state, "Handling command");

		match cmd {
			EngineCommand::Start { asset, target, response } => {
				let _ = response.send(self.start(asset, *target).await);
			}
			EngineCommand::StartSelected { response } => {
				let _ = response.send(self.start_selected().await);
			}
			EngineCommand::Stop { key, response } => {
				let _ = response.send(self.stop(key.as_ref()).await);
			}
			EngineCommand::SetCurrent { asset, response } => {
				let _ = response.send(self.set_current(asset).await);
			}
			EngineCommand::SetLoop { enabled, response } => {
				let _ = response.send(self.set_loop(enabled).await);
			}
			EngineCommand::Status { response } => {
				let _ = response.send(self.snapshot());
			}
			EngineCommand::Shutdown { response } => return Some(response),
		}

		None
	}

	/// Seed the loop flag and selection from the store; nothing survives a restart
	async fn restore(&mut self) {
		match self.store.read_status().await {
			Ok(status) => {
				self.loop_enabled = status.loop_enabled;
				self.current_asset = status.current_asset_id;
			}
			Err(e) => warn!("Failed to read persisted status: {}", e),
		}

		self.refresh_cursor().await;
		self.persist_status().await;
		self.publish();
	}

	// ------------------------------------------------------------------------
	// Start
	// ------------------------------------------------------------------------

	async fn start(&mut self, asset_id: AssetId, target: StreamTarget) -> Result<StatusSnapshot> {
		let (asset, input) = self.validate_start(asset_id, &target).await.inspect_err(|e| warn!("Start rejected: {}", e))?;
		self.launch(asset, input, target).await
	}

	async fn start_selected(&mut self) -> Result<StatusSnapshot> {
		let status = self.store.read_status().await?;
		let asset = status.current_asset_id.ok_or(RelayError::NothingSelected)?;
		let target = self
			.store
			.active_target()
			.await?
			.ok_or_else(|| RelayError::TargetInvalid("no active stream target configured".to_string()))?;

		self.start(asset, target).await
	}

	/// Checks that run before any process is touched
	async fn validate_start(&self, asset_id: AssetId, target: &StreamTarget) -> Result<(VideoAsset, PathBuf)> {
		target.validate().map_err(RelayError::TargetInvalid)?;

		let asset = self.store.get_asset(asset_id).await?.ok_or(RelayError::AssetNotFound(asset_id))?;
		let input = self.config.resolve_media(&asset.file);

		if !tokio::fs::try_exists(&input).await.unwrap_or(false) {
			return Err(RelayError::AssetFileMissing { id: asset_id, path: input });
		}

		Ok((asset, input))
	}

	async fn launch(&mut self, asset: VideoAsset, input: PathBuf, target: StreamTarget) -> Result<StatusSnapshot> {
		self.apply(SessionEvent::Start);
		self.release_process().await;
		self.publish();

		let endpoint = resolve_endpoint(&target);
		let args = build_args(&input, &endpoint, &target);
		info!(
			"🎬 Starting '{}' to {}: {}",
			asset.title,
			target.platform,
			display_command(&self.config.encoder_path, &args, &target.stream_key)
		);

		let key = self.config.session_key.clone();
		let (pid, exit_events) = match self.registry.spawn(&key, &self.config.encoder_path, &args) {
			Ok(process) => (process.pid, process.reports_exit()),
			Err(e) => {
				self.fail(e.clone()).await;
				return Err(e);
			}
		};

		if !exit_events {
			warn!("⚠️ Encoder exits cannot be observed, playlist looping will stall");
		}

		let started_at = Instant::now();
		self.session = Some(Session {
			asset: asset.id,
			target,
			pid,
			exit_events,
			started_at,
			started_at_utc: Utc::now(),
			uptime: UptimeTracker::start(self.store.clone(), started_at, self.config.uptime_cadence()),
		});
		self.apply(SessionEvent::Spawned);
		self.current_asset = Some(asset.id);
		self.last_error = None;

		self.persist_status().await;
		self.refresh_cursor().await;
		self.publish();

		info!("🟢 Live: '{}' (asset {}, pid {:?})", asset.title, asset.id, pid);
		Ok(self.snapshot())
	}

	// ------------------------------------------------------------------------
	// Stop
	// ------------------------------------------------------------------------

	/// False only for a key this engine does not own; stopping an idle session succeeds
	async fn stop(&mut self, key: Option<&SessionKey>) -> Result<bool> {
		if let Some(key) = key {
			if *key != self.config.session_key {
				debug!(%key, "Stop for unknown session ignored");
				return Ok(false);
			}
		}

		if self.is_settled() {
			debug!(state = %self.state, "Nothing to stop");
			return Ok(true);
		}

		// No follow-up start once the operator has stopped the stream
		if self.loop_enabled {
			if let Err(e) = self.store.write_loop_enabled(false).await {
				warn!("Failed to persist loop flag: {}", e);
			}
			self.loop_enabled = false;
		}

		self.halt().await;
		Ok(true)
	}

	/// Idle or already on the way there
	fn is_settled(&self) -> bool {
		transition(self.state, SessionEvent::Stop).is_ok_and(|next| next == self.state)
	}

	/// Stopping then Idle
	async fn halt(&mut self) {
		if self.is_settled() {
			return;
		}

		self.apply(SessionEvent::Stop);
		self.release_process().await;
		self.publish();

		self.apply(SessionEvent::Stopped);
		self.current_asset = None;
		self.last_error = None;
		self.persist_status().await;
		self.publish();

		info!("⏹️ Stream stopped");
	}

	/// Terminate whatever runs under the session key and wait for it to go away,
	/// marking it so its exit is absorbed
	async fn release_process(&mut self) {
		if let Some(session) = self.session.take() {
			session.uptime.stop().await;
		}

		if let Some(process) = self.registry.terminate(&self.config.session_key) {
			debug!(generation = process.generation, pid = ?process.pid, "Releasing encoder");
			if process.reports_exit() {
				self.pending_stops.insert(process.generation);
				self.await_exit(&process).await;
			}
		}
	}

	/// The launcher kills the process once the grace period runs out
	async fn await_exit(&self, process: &RegisteredProcess) {
		let bound = self.config.stop_grace() + KILL_ALLOWANCE;
		if tokio::time::timeout(bound, process.exited()).await.is_err() {
			warn!(generation = process.generation, pid = ?process.pid, "⏱️ Encoder still running after {:?}", bound);
		}
	}

	// ------------------------------------------------------------------------
	// Process exit
	// ------------------------------------------------------------------------

	async fn on_process_exit(&mut self, notice: ExitNotice) {
		let ExitNotice { key, generation, exit } = notice;

		if self.pending_stops.remove(&generation) {
			debug!(%key, generation, %exit, "Released encoder exited");
			return;
		}

		if !self.registry.unregister(&key, generation) {
			debug!(%key, generation, %exit, "Ignoring exit of stale encoder");
			return;
		}

		let Some(finished) = self.session.take() else {
			warn!(%key, generation, "Encoder exited without a live session");
			return;
		};
		finished.uptime.stop().await;

		if exit.success() {
			info!("🏁 Encoder finished asset {}", finished.asset);
		} else {
			warn!("💥 Encoder for asset {} exited with {}", finished.asset, exit);
		}

		if self.loop_enabled {
			self.chain_next(finished.asset, finished.target).await;
		} else if exit.success() {
			self.apply(SessionEvent::Exit);
			self.persist_status().await;
			self.publish();
		} else {
			self.fail(RelayError::ProcessCrash(exit.to_string())).await;
		}
	}

	async fn chain_next(&mut self, finished: AssetId, target: StreamTarget) {
		self.refresh_cursor().await;

		let current = match self.store.read_status().await {
			Ok(status) => status.current_asset_id.or(Some(finished)),
			Err(e) => {
				warn!("Failed to read current asset, continuing from {}: {}", finished, e);
				Some(finished)
			}
		};

		let Some(next) = self.cursor.next_after(current) else {
			info!("Playlist is empty, nothing to loop");
			self.apply(SessionEvent::Exit);
			self.persist_status().await;
			self.publish();
			return;
		};

		info!("🔁 Looping to asset {} (index {:?})", next, self.cursor.last_index());

		let validated = self.validate_start(next, &target).await;
		let result = match validated {
			Ok((asset, input)) => self.launch(asset, input, target).await.map(|_| ()),
			Err(e) => Err(e),
		};

		// Spawn failures already landed in Error
		if let Err(e) = result {
			if self.state == SessionState::Live {
				self.fail(e).await;
			}
		}
	}

	// ------------------------------------------------------------------------
	// Selection and loop flag
	// ------------------------------------------------------------------------

	async fn set_current(&mut self, asset_id: AssetId) -> Result<()> {
		let asset = self.store.get_asset(asset_id).await?.ok_or(RelayError::AssetNotFound(asset_id))?;
		self.store.write_current_asset(Some(asset.id)).await?;

		if !self.state.is_active() {
			self.current_asset = Some(asset.id);
			self.publish();
		}

		info!("📌 Selected asset {} '{}'", asset.id, asset.title);
		Ok(())
	}

	async fn set_loop(&mut self, enabled: bool) -> Result<()> {
		self.store.write_loop_enabled(enabled).await?;
		self.loop_enabled = enabled;
		self.publish();

		info!("🔁 Playlist loop {}", if enabled { "enabled" } else { "disabled" });
		Ok(())
	}

	// ------------------------------------------------------------------------
	// Helpers
	// ------------------------------------------------------------------------

	async fn fail(&mut self, err: RelayError) {
		error!("❌ Session failed: {}", err);
		self.apply(SessionEvent::Fail);
		self.last_error = Some(err.to_string());
		self.persist_status().await;
		self.publish();
	}

	fn apply(&mut self, event: SessionEvent) {
		match transition(self.state, event) {
			Ok(next) => {
				debug!(from = %self.state, to = %next, ?event, "Session transition");
				self.state = next;
			}
			Err(e) => error!("{}", e),
		}
	}

	async fn refresh_cursor(&mut self) {
		match self.store.list_assets_ordered().await {
			Ok(assets) => self.cursor.refresh(&assets),
			Err(e) => warn!("Failed to load playlist: {}", e),
		}
	}

	async fn persist_status(&self) {
		let uptime = self.uptime();
		if let Err(e) = self.store.write_status(self.state, self.current_asset, &uptime).await {
			warn!("Failed to write status: {}", e);
		}
	}

	fn uptime(&self) -> String {
		match (&self.session, self.state) {
			(Some(session), SessionState::Live) => format_uptime(session.started_at.elapsed()),
			_ => IDLE_UPTIME.to_string(),
		}
	}

	fn snapshot(&self) -> StatusSnapshot {
		let session = self.session.as_ref();

		StatusSnapshot {
			state: self.state,
			session_key: self.config.session_key.clone(),
			current_asset: self.current_asset,
			loop_enabled: self.loop_enabled,
			started_at: session.map(|s| s.started_at_utc),
			uptime: self.uptime(),
			pid: session.and_then(|s| s.pid),
			active_processes: self.registry.len(),
			exit_events: session.map_or(true, |s| s.exit_events),
			last_error: self.last_error.clone(),
		}
	}

	fn publish(&self) {
		self.status_tx.send_replace(self.snapshot());
	}

	async fn shutdown(&mut self) {
		self.halt().await;

		for (key, process) in self.registry.terminate_all() {
			debug!(%key, generation = process.generation, "Terminated leftover encoder");
			self.await_exit(&process).await;
		}

		info!("Relay engine stopped");
	}
}
