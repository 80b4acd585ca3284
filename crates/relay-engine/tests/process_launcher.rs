// tests/process_launcher.rs
// Real child processes through the tokio launcher
#![cfg(unix)]

use relay_engine::core::*;
use relay_engine::store::{InMemoryStore, LibraryManifest};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn shell(script: &str) -> Vec<String> {
	vec!["-c".to_string(), script.to_string()]
}

fn spawned(handle: ProcessHandle) -> SpawnedProcess {
	match handle {
		ProcessHandle::Real(process) => process,
		ProcessHandle::Unavailable => panic!("expected a real process"),
	}
}

#[tokio::test]
async fn output_is_forwarded_before_exit() {
	let (output, mut lines) = broadcast::channel(16);
	let launcher = TokioLauncher::default();

	let process = spawned(launcher.launch("sh", &shell("echo first; echo second >&2; exit 3"), output).unwrap());
	assert!(process.pid.is_some());

	let exit = tokio::time::timeout(Duration::from_secs(5), process.exit).await.unwrap().unwrap();
	assert_eq!(exit, ProcessExit::exited(3));

	let mut seen = Vec::new();
	while let Ok(line) = lines.try_recv() {
		seen.push((line.stream, line.line));
	}
	seen.sort_by_key(|(_, line)| line.clone());
	assert_eq!(
		seen,
		vec![(OutputStream::Stdout, "first".to_string()), (OutputStream::Stderr, "second".to_string())]
	);
}

#[tokio::test]
async fn terminate_sends_sigterm() {
	let (output, _) = broadcast::channel(16);
	let launcher = TokioLauncher::new(Duration::from_secs(5));

	let process = spawned(launcher.launch("sleep", &["30".to_string()], output).unwrap());
	process.terminate.cancel();

	let exit = tokio::time::timeout(Duration::from_secs(5), process.exit).await.unwrap().unwrap();
	assert_eq!(exit, ProcessExit::signalled(15));
	assert!(!exit.success());
}

#[tokio::test]
async fn stubborn_process_is_killed_after_grace() {
	let (output, _) = broadcast::channel(16);
	let launcher = TokioLauncher::new(Duration::from_millis(200));

	let script = "trap '' TERM; while true; do sleep 0.05; done";
	let process = spawned(launcher.launch("sh", &shell(script), output).unwrap());
	// Give the shell time to install the trap
	tokio::time::sleep(Duration::from_millis(100)).await;
	process.terminate.cancel();

	let exit = tokio::time::timeout(Duration::from_secs(5), process.exit).await.unwrap().unwrap();
	assert_eq!(exit, ProcessExit::signalled(9));
}

#[tokio::test]
async fn missing_program_is_a_spawn_failure() {
	let (output, _) = broadcast::channel(16);
	let result = TokioLauncher::default().launch("relay-engine-no-such-encoder", &[], output);

	assert!(matches!(result, Err(RelayError::SpawnFailure(_))));
}

#[tokio::test]
async fn undecodable_output_does_not_cut_the_pipe() {
	let (output, mut lines) = broadcast::channel(64);
	let launcher = TokioLauncher::default();

	let script = "printf 'title: \\377\\n' >&2; sleep 0.2; for i in 1 2 3 4 5; do echo frame=$i >&2; done; printf 'frame=6\\rframe=7\\r' >&2; exit 0";
	let process = spawned(launcher.launch("sh", &shell(script), output).unwrap());

	let exit = tokio::time::timeout(Duration::from_secs(5), process.exit).await.unwrap().unwrap();
	assert_eq!(exit, ProcessExit::exited(0));

	let mut seen = Vec::new();
	while let Ok(line) = lines.try_recv() {
		seen.push(line.line);
	}
	assert_eq!(seen[0], "title: \u{FFFD}");
	assert_eq!(&seen[1..], ["frame=1", "frame=2", "frame=3", "frame=4", "frame=5", "frame=6", "frame=7"]);
}

// ============================================================================
// Replacing a running encoder
// ============================================================================

/// Writes an executable encoder stand-in that logs its lifecycle to `log`
fn write_encoder(dir: &Path, log: &Path) -> PathBuf {
	let path = dir.join("encoder.sh");
	let script = format!(
		"#!/bin/sh\ntrap 'sleep 0.3; echo done >> {log}; exit 0' TERM\necho start >> {log}\nwhile true; do sleep 0.05; done\n",
		log = log.display()
	);
	std::fs::write(&path, script).unwrap();
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
	path
}

fn events(log: &Path) -> Vec<String> {
	std::fs::read_to_string(log).unwrap_or_default().lines().map(str::to_string).collect()
}

async fn wait_for_events(log: &Path, count: usize) {
	let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
	while events(log).len() < count {
		assert!(tokio::time::Instant::now() < deadline, "encoder log stuck at {:?}", events(log));
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
}

#[tokio::test]
async fn replaced_encoder_exits_before_the_next_one_starts() {
	let media = tempfile::tempdir().unwrap();
	let log = media.path().join("encoder.log");
	let encoder = write_encoder(media.path(), &log);

	let assets = [(1, "a.mp4"), (2, "b.mp4")]
		.into_iter()
		.map(|(id, file)| {
			std::fs::write(media.path().join(file), b"video").unwrap();
			VideoAsset {
				id: AssetId(id),
				title: file.to_string(),
				file: PathBuf::from(file),
				size_bytes: 5,
				duration: "00:05".to_string(),
				playlist_order: i64::try_from(id).unwrap(),
			}
		})
		.collect();
	let store = Arc::new(InMemoryStore::from_manifest(LibraryManifest {
		assets,
		..LibraryManifest::default()
	}));

	let config = EngineConfig::new()
		.with_media_root(media.path())
		.with_encoder_path(encoder.display().to_string())
		.with_stop_grace(3_000);
	let orchestrator = RelayOrchestrator::new(config, store).unwrap();
	let target = StreamTarget::new(Platform::Custom, "").with_endpoint_override("rtmp://127.0.0.1:1935/live");

	orchestrator.start(AssetId(1), target.clone()).await.unwrap();
	// The trap has to be installed before the first encoder is replaced
	wait_for_events(&log, 1).await;

	orchestrator.start(AssetId(2), target).await.unwrap();
	wait_for_events(&log, 3).await;
	assert_eq!(events(&log), ["start", "done", "start"]);

	assert!(orchestrator.stop().await.unwrap());
	assert_eq!(events(&log), ["start", "done", "start", "done"]);
	orchestrator.shutdown().await;
}
