use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::{RelayStore, StatusRecord};
use crate::core::{RelayError, Result, SessionState};
use crate::model::{AssetId, StreamTarget, VideoAsset};

/// On-disk description of a media library, loaded into an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryManifest {
	#[serde(default)]
	pub assets: Vec<VideoAsset>,
	#[serde(default)]
	pub target: Option<StreamTarget>,
	#[serde(default)]
	pub loop_playlist: bool,
	#[serde(default)]
	pub current: Option<AssetId>,
}

#[derive(Debug, Default)]
struct Library {
	assets: BTreeMap<AssetId, VideoAsset>,
	target: Option<StreamTarget>,
	status: StatusRecord,
}

/// `RelayStore` kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
	library: RwLock<Library>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_manifest(manifest: LibraryManifest) -> Self {
		let status = StatusRecord {
			current_asset_id: manifest.current,
			loop_enabled: manifest.loop_playlist,
			..StatusRecord::default()
		};

		Self {
			library: RwLock::new(Library {
				assets: manifest.assets.into_iter().map(|asset| (asset.id, asset)).collect(),
				target: manifest.target,
				status,
			}),
		}
	}

	/// Read a JSON manifest from disk
	pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| RelayError::Store(format!("reading manifest {}: {e}", path.display())))?;
		let manifest: LibraryManifest = serde_json::from_str(&raw).map_err(|e| RelayError::Store(format!("parsing manifest {}: {e}", path.display())))?;

		Ok(Self::from_manifest(manifest))
	}

	pub async fn insert_asset(&self, asset: VideoAsset) {
		self.library.write().await.assets.insert(asset.id, asset);
	}

	pub async fn remove_asset(&self, id: AssetId) -> Option<VideoAsset> {
		self.library.write().await.assets.remove(&id)
	}

	/// Move an asset to a new playlist position; false when the asset is unknown
	pub async fn reorder(&self, id: AssetId, playlist_order: i64) -> bool {
		match self.library.write().await.assets.get_mut(&id) {
			Some(asset) => {
				asset.playlist_order = playlist_order;
				true
			}
			None => false,
		}
	}

	pub async fn set_active_target(&self, target: Option<StreamTarget>) {
		self.library.write().await.target = target;
	}

	pub async fn status(&self) -> StatusRecord {
		self.library.read().await.status.clone()
	}

	pub async fn uptime(&self) -> String {
		self.library.read().await.status.uptime.clone()
	}
}

#[async_trait]
impl RelayStore for InMemoryStore {
	async fn get_asset(&self, id: AssetId) -> Result<Option<VideoAsset>> {
		Ok(self.library.read().await.assets.get(&id).cloned())
	}

	async fn list_assets_ordered(&self) -> Result<Vec<VideoAsset>> {
		let mut assets: Vec<VideoAsset> = self.library.read().await.assets.values().cloned().collect();
		assets.sort_by_key(|asset| (asset.playlist_order, asset.id));
		Ok(assets)
	}

	async fn active_target(&self) -> Result<Option<StreamTarget>> {
		Ok(self.library.read().await.target.clone())
	}

	async fn write_status(&self, state: SessionState, current_asset_id: Option<AssetId>, uptime: &str) -> Result<()> {
		let mut library = self.library.write().await;
		library.status.state = state;
		library.status.current_asset_id = current_asset_id;
		library.status.uptime = uptime.to_string();
		Ok(())
	}

	async fn read_status(&self) -> Result<StatusRecord> {
		Ok(self.status().await)
	}

	async fn write_uptime(&self, uptime: &str) -> Result<()> {
		self.library.write().await.status.uptime = uptime.to_string();
		Ok(())
	}

	async fn write_loop_enabled(&self, enabled: bool) -> Result<()> {
		self.library.write().await.status.loop_enabled = enabled;
		Ok(())
	}

	async fn write_current_asset(&self, current_asset_id: Option<AssetId>) -> Result<()> {
		self.library.write().await.status.current_asset_id = current_asset_id;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Platform;

	const MANIFEST: &str = r#"{
		"assets": [
			{ "id": 2, "title": "Second", "file": "b.mp4", "playlist_order": 20 },
			{ "id": 1, "title": "First", "file": "a.mp4", "size_bytes": 1024, "duration": "01:00", "playlist_order": 10 }
		],
		"target": { "platform": "twitch", "stream_key": "live_1", "resolution": "1280x720" },
		"loop_playlist": true,
		"current": 1
	}"#;

	#[tokio::test]
	async fn manifest_seeds_library_and_status() {
		let manifest: LibraryManifest = serde_json::from_str(MANIFEST).unwrap();
		let store = InMemoryStore::from_manifest(manifest);

		let ordered: Vec<AssetId> = store.list_assets_ordered().await.unwrap().into_iter().map(|a| a.id).collect();
		assert_eq!(ordered, vec![AssetId(1), AssetId(2)]);

		let target = store.active_target().await.unwrap().unwrap();
		assert_eq!(target.platform, Platform::Twitch);

		let status = store.read_status().await.unwrap();
		assert!(status.loop_enabled);
		assert_eq!(status.current_asset_id, Some(AssetId(1)));
		assert_eq!(status.state, SessionState::Idle);
	}

	#[tokio::test]
	async fn reorder_changes_listing() {
		let store = InMemoryStore::from_manifest(serde_json::from_str(MANIFEST).unwrap());
		assert!(store.reorder(AssetId(2), 1).await);
		assert!(!store.reorder(AssetId(9), 1).await);

		let first = store.list_assets_ordered().await.unwrap().remove(0);
		assert_eq!(first.id, AssetId(2));
	}

	#[tokio::test]
	async fn uptime_write_keeps_state() {
		let store = InMemoryStore::new();
		store.write_status(SessionState::Live, Some(AssetId(3)), "00:00:00").await.unwrap();
		store.write_uptime("00:00:05").await.unwrap();

		let status = store.status().await;
		assert_eq!(status.state, SessionState::Live);
		assert_eq!(status.current_asset_id, Some(AssetId(3)));
		assert_eq!(status.uptime, "00:00:05");
	}
}
