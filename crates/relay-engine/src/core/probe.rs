use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::error::{RelayError, Result};

/// Run `<encoder> -version` and report the version it prints
pub async fn probe_encoder(program: &str, timeout: Duration) -> Result<String> {
	debug!(program, ?timeout, "Probing encoder");

	let output = Command::new(program).arg("-version").stdin(Stdio::null()).kill_on_drop(true).output();

	let output = match tokio::time::timeout(timeout, output).await {
		Err(_) => return Err(RelayError::ProbeTimeout(timeout)),
		Ok(Err(e)) if e.kind() == ErrorKind::NotFound => return Err(RelayError::EncoderMissing(program.to_string())),
		Ok(Err(e)) => return Err(RelayError::ProbeFailed(e.to_string())),
		Ok(Ok(output)) => output,
	};

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		let reason = stderr.lines().next().unwrap_or_default().trim();
		return Err(RelayError::ProbeFailed(format!("{} exited with {}: {}", program, output.status, reason)));
	}

	let stdout = String::from_utf8_lossy(&output.stdout);
	let version = parse_version(&stdout).ok_or_else(|| RelayError::ProbeFailed("no version banner in output".to_string()))?;

	info!("🔍 Encoder available: {} {}", program, version);
	Ok(version)
}

/// Token following `version` on the banner line, falling back to the whole first line
pub fn parse_version(banner: &str) -> Option<String> {
	let first = banner.lines().map(str::trim).find(|line| !line.is_empty())?;

	let mut words = first.split_whitespace();
	while let Some(word) = words.next() {
		if word == "version" {
			return words.next().map(str::to_string);
		}
	}

	Some(first.to_string())
}
