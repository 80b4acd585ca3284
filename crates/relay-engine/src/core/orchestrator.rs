use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::commands::{EngineCommand, Reply};
use super::error::{RelayError, Result};
use super::launcher::{OutputLine, ProcessLauncher, TokioLauncher};
use super::probe::probe_encoder;
use super::{AssetId, EngineConfig, RelayEngine, SessionKey, StatusSnapshot, StreamTarget};
use crate::store::RelayStore;

/// The relay actor façade
#[derive(Clone)]
pub struct RelayOrchestrator {
	command_tx: mpsc::UnboundedSender<EngineCommand>,
	status_rx: watch::Receiver<StatusSnapshot>,
	output_tx: broadcast::Sender<OutputLine>,
	encoder_path: String,
	task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
	cancel_token: CancellationToken,
}

impl RelayOrchestrator {
	/// Orchestrator spawning real encoder processes
	pub fn new(config: EngineConfig, store: Arc<dyn RelayStore>) -> Result<Self> {
		let launcher = Arc::new(TokioLauncher::new(config.stop_grace()));
		Self::with_launcher(config, store, launcher)
	}

	pub fn with_launcher(config: EngineConfig, store: Arc<dyn RelayStore>, launcher: Arc<dyn ProcessLauncher>) -> Result<Self> {
		let cancel_token = CancellationToken::new();
		let (command_tx, command_rx) = mpsc::unbounded_channel();

		let encoder_path = config.encoder_path.clone();
		let engine = RelayEngine::new(config, store, launcher)?;
		let status_rx = engine.subscribe();
		let output_tx = engine.output_sender();

		let task_handle = tokio::spawn(engine.run(command_rx, cancel_token.clone()));

		info!("RelayOrchestrator created");

		Ok(Self {
			command_tx,
			status_rx,
			output_tx,
			encoder_path,
			task_handle: Arc::new(Mutex::new(Some(task_handle))),
			cancel_token,
		})
	}

	/// Send a command and await its reply
	async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EngineCommand) -> Result<T> {
		let (tx, rx) = oneshot::channel();
		self.command_tx.send(build(tx)).map_err(|_| RelayError::Internal("Failed to send command".into()))?;
		rx.await.map_err(|_| RelayError::Internal("Engine dropped".into()))?
	}

	pub async fn start(&self, asset: AssetId, target: StreamTarget) -> Result<StatusSnapshot> {
		self
			.request(|response| EngineCommand::Start {
				asset,
				target: Box::new(target),
				response,
			})
			.await
	}

	/// Start the selected asset with the stored active target
	pub async fn start_selected(&self) -> Result<StatusSnapshot> {
		self.request(|response| EngineCommand::StartSelected { response }).await
	}

	pub async fn stop(&self) -> Result<bool> {
		self.request(|response| EngineCommand::Stop { key: None, response }).await
	}

	pub async fn stop_session(&self, key: SessionKey) -> Result<bool> {
		self.request(|response| EngineCommand::Stop { key: Some(key), response }).await
	}

	pub async fn set_current(&self, asset: AssetId) -> Result<()> {
		self.request(|response| EngineCommand::SetCurrent { asset, response }).await
	}

	pub async fn enable_loop(&self) -> Result<()> {
		self.set_loop_enabled(true).await
	}

	pub async fn disable_loop(&self) -> Result<()> {
		self.set_loop_enabled(false).await
	}

	pub async fn set_loop_enabled(&self, enabled: bool) -> Result<()> {
		self.request(|response| EngineCommand::SetLoop { enabled, response }).await
	}

	/// Status with uptime computed at the time of the call
	pub async fn query_status(&self) -> Result<StatusSnapshot> {
		let (tx, rx) = oneshot::channel();
		self
			.command_tx
			.send(EngineCommand::Status { response: tx })
			.map_err(|_| RelayError::Internal("Failed to send command".into()))?;
		rx.await.map_err(|_| RelayError::Internal("Engine dropped".into()))
	}

	/// Version string reported by the configured encoder
	pub async fn probe_encoder(&self, timeout: Duration) -> Result<String> {
		probe_encoder(&self.encoder_path, timeout).await
	}

	// Access state
	pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
		self.status_rx.clone()
	}
	pub fn current_status(&self) -> StatusSnapshot {
		self.status_rx.borrow().clone()
	}
	pub fn subscribe_output(&self) -> broadcast::Receiver<OutputLine> {
		self.output_tx.subscribe()
	}

	/// Stop the session, terminate every encoder and end the actor
	pub async fn shutdown(&self) {
		let (tx, rx) = oneshot::channel();
		if self.command_tx.send(EngineCommand::Shutdown { response: tx }).is_ok() {
			let _ = rx.await;
		}

		self.cancel_token.cancel();
		if let Some(handle) = self.task_handle.lock().await.take() {
			let _ = handle.await;
		}
	}
}
