//! Data-access contract between the engine and whatever persists assets,
//! stream targets and the status row.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Result, SessionState, IDLE_UPTIME};
use crate::model::{AssetId, StreamTarget, VideoAsset};

pub use memory::{InMemoryStore, LibraryManifest};

/// Persisted status row as the engine reads it back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
	pub state: SessionState,
	pub current_asset_id: Option<AssetId>,
	pub loop_enabled: bool,
	pub uptime: String,
}

impl Default for StatusRecord {
	fn default() -> Self {
		Self {
			state: SessionState::Idle,
			current_asset_id: None,
			loop_enabled: false,
			uptime: IDLE_UPTIME.to_string(),
		}
	}
}

#[async_trait]
pub trait RelayStore: Send + Sync + 'static {
	/// `Ok(None)` when the asset does not exist (or was deleted)
	async fn get_asset(&self, id: AssetId) -> Result<Option<VideoAsset>>;

	/// All assets, ascending by playlist order
	async fn list_assets_ordered(&self) -> Result<Vec<VideoAsset>>;

	async fn active_target(&self) -> Result<Option<StreamTarget>>;

	async fn write_status(&self, state: SessionState, current_asset_id: Option<AssetId>, uptime: &str) -> Result<()>;

	async fn read_status(&self) -> Result<StatusRecord>;

	/// Uptime-only update, leaves state and current asset untouched
	async fn write_uptime(&self, uptime: &str) -> Result<()>;

	async fn write_loop_enabled(&self, enabled: bool) -> Result<()>;

	async fn write_current_asset(&self, current_asset_id: Option<AssetId>) -> Result<()>;
}
