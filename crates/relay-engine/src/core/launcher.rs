use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{RelayError, Result};

/// Terminal status of an encoder process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
	pub code: Option<i32>,
	pub signal: Option<i32>,
}

impl ProcessExit {
	pub const fn exited(code: i32) -> Self {
		Self { code: Some(code), signal: None }
	}

	pub const fn signalled(signal: i32) -> Self {
		Self { code: None, signal: Some(signal) }
	}

	pub const fn success(&self) -> bool {
		matches!(self.code, Some(0))
	}
}

impl From<std::process::ExitStatus> for ProcessExit {
	fn from(status: std::process::ExitStatus) -> Self {
		#[cfg(unix)]
		let signal = std::os::unix::process::ExitStatusExt::signal(&status);
		#[cfg(not(unix))]
		let signal = None;

		Self { code: status.code(), signal }
	}
}

impl fmt::Display for ProcessExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.code, self.signal) {
			(Some(code), _) => write!(f, "exit code {code}"),
			(None, Some(signal)) => write!(f, "signal {signal}"),
			(None, None) => f.write_str("unknown status"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
	Stdout,
	Stderr,
}

/// One line of encoder output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
	pub stream: OutputStream,
	pub pid: Option<u32>,
	pub line: String,
}

pub type OutputSink = broadcast::Sender<OutputLine>;

/// A process that is running (or has run) out of process.
///
/// `exit` resolves exactly once, after all output has been forwarded. Cancelling
/// `terminate` asks the process to stop gracefully.
#[derive(Debug)]
pub struct SpawnedProcess {
	pub pid: Option<u32>,
	pub exit: oneshot::Receiver<ProcessExit>,
	pub terminate: CancellationToken,
}

/// Result of a successful spawn request.
///
/// `Unavailable` is handed out when the host cannot run child processes at all.
/// It never produces output and never reports an exit, so anything waiting on
/// exits (loop chaining) stalls behind it.
#[derive(Debug)]
pub enum ProcessHandle {
	Real(SpawnedProcess),
	Unavailable,
}

impl ProcessHandle {
	pub const fn reports_exit(&self) -> bool {
		matches!(self, Self::Real(_))
	}

	pub fn pid(&self) -> Option<u32> {
		match self {
			Self::Real(process) => process.pid,
			Self::Unavailable => None,
		}
	}
}

/// Process-execution collaborator used by the registry
pub trait ProcessLauncher: Send + Sync + 'static {
	fn launch(&self, program: &str, args: &[String], output: OutputSink) -> Result<ProcessHandle>;
}

/// Runs encoders as real child processes on the tokio runtime
#[derive(Debug, Clone)]
pub struct TokioLauncher {
	grace_period: Duration,
}

impl TokioLauncher {
	pub const fn new(grace_period: Duration) -> Self {
		Self { grace_period }
	}
}

impl Default for TokioLauncher {
	fn default() -> Self {
		Self::new(Duration::from_secs(5))
	}
}

impl ProcessLauncher for TokioLauncher {
	fn launch(&self, program: &str, args: &[String], output: OutputSink) -> Result<ProcessHandle> {
		let spawned = Command::new(program)
			.args(args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn();

		let mut child = match spawned {
			Ok(child) => child,
			Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
				warn!("⚠️ Process spawning unsupported on this host, tracking '{}' as unavailable", program);
				return Ok(ProcessHandle::Unavailable);
			}
			Err(e) => return Err(RelayError::SpawnFailure(format!("{program}: {e}"))),
		};

		let pid = child.id();
		let terminate = CancellationToken::new();
		let (exit_tx, exit_rx) = oneshot::channel();

		let stdout = child.stdout.take().map(|out| tokio::spawn(pump(out, OutputStream::Stdout, pid, output.clone())));
		let stderr = child.stderr.take().map(|err| tokio::spawn(pump(err, OutputStream::Stderr, pid, output)));

		let grace_period = self.grace_period;
		let token = terminate.clone();
		tokio::spawn(async move {
			let exit = supervise(&mut child, &token, grace_period).await;

			// Drain output before reporting the exit
			for task in [stdout, stderr].into_iter().flatten() {
				let _ = task.await;
			}

			debug!(pid = ?pid, "encoder process finished with {}", exit);
			let _ = exit_tx.send(exit);
		});

		Ok(ProcessHandle::Real(SpawnedProcess { pid, exit: exit_rx, terminate }))
	}
}

/// Waits for the child, escalating from SIGTERM to a kill once the grace period runs out
async fn supervise(child: &mut Child, terminate: &CancellationToken, grace_period: Duration) -> ProcessExit {
	let natural = tokio::select! {
		status = child.wait() => Some(status),
		() = terminate.cancelled() => None,
	};

	let status = match natural {
		Some(status) => status,
		None => {
			request_termination(child);
			match tokio::time::timeout(grace_period, child.wait()).await {
				Ok(status) => status,
				Err(_) => {
					warn!(pid = ?child.id(), "⏱️ Encoder ignored termination for {:?}, killing", grace_period);
					if let Err(e) = child.kill().await {
						warn!("Failed to kill encoder: {}", e);
					}
					child.wait().await
				}
			}
		}
	};

	match status {
		Ok(status) => ProcessExit::from(status),
		Err(e) => {
			warn!("Failed to collect encoder exit status: {}", e);
			ProcessExit { code: None, signal: None }
		}
	}
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
	use nix::sys::signal::{kill, Signal};
	use nix::unistd::Pid;

	let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
		return;
	};

	if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
		warn!(pid, "SIGTERM failed ({}), killing instead", e);
		let _ = child.start_kill();
	}
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
	let _ = child.start_kill();
}

/// Longest output line forwarded before the rest of it is dropped
const MAX_LINE_BYTES: usize = 8 * 1024;

fn line_codec() -> AnyDelimiterCodec {
	// Progress updates end in a bare carriage return
	AnyDelimiterCodec::new_with_max_length(b"\r\n".to_vec(), b"\n".to_vec(), MAX_LINE_BYTES)
}

/// Forwards output until the pipe closes. Bytes are decoded lossily and the
/// pipe is drained to the end so the encoder never writes into a closed pipe.
async fn pump<R>(reader: R, stream: OutputStream, pid: Option<u32>, output: OutputSink)
where
	R: AsyncRead + Unpin,
{
	let mut frames = FramedRead::new(reader, line_codec());
	loop {
		match frames.next().await {
			Some(Ok(chunk)) => {
				let line = String::from_utf8_lossy(&chunk).trim_end().to_string();
				if line.is_empty() {
					continue;
				}

				debug!(target: "encoder", pid = ?pid, ?stream, "{}", line);
				if line.contains("Stream mapping:") || line.contains("Press [q] to stop") {
					debug!(target: "encoder", pid = ?pid, "encoder connected to ingest");
				}
				// No subscribers is fine
				let _ = output.send(OutputLine { stream, pid, line });
			}
			Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
				debug!(pid = ?pid, ?stream, "Dropping encoder output line longer than {} bytes", MAX_LINE_BYTES);
				// A decode error ends the stream, so start over on the same pipe
				frames = FramedRead::new(frames.into_inner(), line_codec());
			}
			Some(Err(AnyDelimiterCodecError::Io(e))) => {
				warn!(pid = ?pid, "Encoder output read failed: {}", e);
				let mut reader = frames.into_inner();
				let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
				break;
			}
			None => break,
		}
	}
}

/// Launcher for hosts without process support, or dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLauncher;

impl ProcessLauncher for NullLauncher {
	fn launch(&self, program: &str, _args: &[String], _output: OutputSink) -> Result<ProcessHandle> {
		debug!("Not launching '{}', process execution disabled", program);
		Ok(ProcessHandle::Unavailable)
	}
}
