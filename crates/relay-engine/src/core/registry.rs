use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{RelayError, Result};
use super::launcher::{OutputSink, ProcessExit, ProcessHandle, ProcessLauncher};
use super::SessionKey;

/// Delivered once for every spawned process that can report its exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitNotice {
	pub key: SessionKey,
	pub generation: u64,
	pub exit: ProcessExit,
}

#[derive(Debug)]
pub struct RegisteredProcess {
	pub generation: u64,
	pub pid: Option<u32>,
	terminate: Option<CancellationToken>,
	/// Cancelled by the exit watcher once the process is gone
	exited: Option<CancellationToken>,
}

impl RegisteredProcess {
	/// False for `Unavailable` handles, which never produce an exit notice
	pub const fn reports_exit(&self) -> bool {
		self.terminate.is_some()
	}

	/// Resolves once the exit status has been collected. Returns at once for
	/// `Unavailable` handles.
	pub async fn exited(&self) {
		if let Some(exited) = &self.exited {
			exited.cancelled().await;
		}
	}

	fn request_termination(&self) {
		if let Some(token) = &self.terminate {
			token.cancel();
		}
	}
}

/// Owns the encoder processes, at most one per session key.
///
/// Lives inside the engine actor, so every mutation is already serialized.
pub struct ProcessRegistry {
	launcher: Arc<dyn ProcessLauncher>,
	processes: HashMap<SessionKey, RegisteredProcess>,
	next_generation: u64,
	exit_tx: mpsc::UnboundedSender<ExitNotice>,
	output: OutputSink,
}

impl ProcessRegistry {
	pub fn new(launcher: Arc<dyn ProcessLauncher>, exit_tx: mpsc::UnboundedSender<ExitNotice>, output: OutputSink) -> Self {
		Self {
			launcher,
			processes: HashMap::new(),
			next_generation: 1,
			exit_tx,
			output,
		}
	}

	/// Launch and register a process. A key that is already taken is refused;
	/// the caller has to terminate the old process first.
	pub fn spawn(&mut self, key: &SessionKey, program: &str, args: &[String]) -> Result<&RegisteredProcess> {
		if self.processes.contains_key(key) {
			return Err(RelayError::AlreadyRegistered(key.to_string()));
		}

		let handle = self.launcher.launch(program, args, self.output.clone())?;
		let generation = self.next_generation;
		self.next_generation += 1;

		let pid = handle.pid();
		let (terminate, exited) = match handle {
			ProcessHandle::Real(process) => {
				let exit_tx = self.exit_tx.clone();
				let key = key.clone();
				let exit_rx = process.exit;
				let exited = CancellationToken::new();
				let done = exited.clone();
				tokio::spawn(async move {
					let exit = exit_rx.await.unwrap_or_else(|_| {
						warn!(%key, generation, "Exit channel dropped without a status");
						ProcessExit { code: None, signal: None }
					});
					done.cancel();
					let _ = exit_tx.send(ExitNotice { key, generation, exit });
				});
				(Some(process.terminate), Some(exited))
			}
			ProcessHandle::Unavailable => {
				warn!(%key, "⚠️ Encoder tracked without a real process, no exit will be reported");
				(None, None)
			}
		};

		info!(%key, generation, pid = ?pid, "🎥 Encoder registered");
		let entry = self.processes.entry(key.clone()).or_insert(RegisteredProcess {
			generation,
			pid,
			terminate,
			exited,
		});
		Ok(entry)
	}

	/// Unregister the process under `key` and ask it to stop
	pub fn terminate(&mut self, key: &SessionKey) -> Option<RegisteredProcess> {
		let process = self.processes.remove(key)?;
		debug!(%key, generation = process.generation, "Terminating encoder");
		process.request_termination();
		Some(process)
	}

	pub fn terminate_all(&mut self) -> Vec<(SessionKey, RegisteredProcess)> {
		let drained: Vec<_> = self.processes.drain().collect();
		for (key, process) in &drained {
			debug!(%key, generation = process.generation, "Terminating encoder");
			process.request_termination();
		}
		drained
	}

	/// Drop the entry for an exited process. Stale generations are left alone.
	pub fn unregister(&mut self, key: &SessionKey, generation: u64) -> bool {
		match self.processes.get(key) {
			Some(process) if process.generation == generation => {
				self.processes.remove(key);
				true
			}
			_ => false,
		}
	}

	pub fn get(&self, key: &SessionKey) -> Option<&RegisteredProcess> {
		self.processes.get(key)
	}

	pub fn len(&self) -> usize {
		self.processes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}
}
