use relay_engine::core::{AssetId, EngineConfig, NullLauncher, Platform, RelayOrchestrator, Resolution, StreamTarget, VideoAsset};
use relay_engine::store::{InMemoryStore, LibraryManifest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_target(false).init();

	println!("\n📺 Stream Relay Demo (dry run)\n");

	let media = tempfile::tempdir()?;
	let mut assets = Vec::new();
	for (id, title) in [(1, "intro"), (2, "feature"), (3, "outro")] {
		let file = PathBuf::from(format!("{title}.mp4"));
		std::fs::write(media.path().join(&file), b"demo")?;
		assets.push(VideoAsset {
			id: AssetId(id),
			title: title.to_string(),
			file,
			size_bytes: 4,
			duration: "00:30".to_string(),
			playlist_order: i64::try_from(id)?,
		});
	}

	let target = StreamTarget::new(Platform::Youtube, "demo-key-1234").with_resolution(Resolution::fixed(1280, 720));
	let store = Arc::new(InMemoryStore::from_manifest(LibraryManifest {
		assets,
		target: Some(target.clone()),
		loop_playlist: true,
		current: None,
	}));

	let config = EngineConfig::new().with_media_root(media.path());
	let orchestrator = RelayOrchestrator::with_launcher(config, store, Arc::new(NullLauncher))?;

	orchestrator.set_current(AssetId(2)).await?;
	let status = orchestrator.start_selected().await?;
	println!("▶️  {:?} asset {:?}, exit events: {}", status.state, status.current_asset, status.exit_events);

	sleep(Duration::from_millis(1500)).await;
	println!("⏱️  uptime {}", orchestrator.query_status().await?.uptime);

	orchestrator.start(AssetId(3), target).await?;
	println!("♻️  replaced, {} process registered", orchestrator.query_status().await?.active_processes);

	orchestrator.stop().await?;
	println!("⏹️  {}", serde_json::to_string_pretty(&orchestrator.query_status().await?)?);

	orchestrator.shutdown().await;
	println!("\n✅ Demo completed!\n");
	Ok(())
}
