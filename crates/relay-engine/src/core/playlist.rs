use super::{AssetId, VideoAsset};

/// Snapshot of the playlist in play order, plus where we last were in it
#[derive(Debug, Clone, Default)]
pub struct PlaylistCursor {
	order: Vec<AssetId>,
	last_index: Option<usize>,
}

impl PlaylistCursor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build from assets in any order; sorted by playlist order, ties broken by id
	pub fn from_assets(assets: &[VideoAsset]) -> Self {
		let mut cursor = Self::new();
		cursor.refresh(assets);
		cursor
	}

	/// Replace the snapshot, e.g. after a reorder or delete between plays
	pub fn refresh(&mut self, assets: &[VideoAsset]) {
		let mut sorted: Vec<&VideoAsset> = assets.iter().collect();
		sorted.sort_by_key(|asset| (asset.playlist_order, asset.id));
		self.order = sorted.into_iter().map(|asset| asset.id).collect();
		self.last_index = None;
	}

	/// Asset that follows `current`, wrapping past the end.
	///
	/// An id missing from the snapshot (deleted mid-stream, or nothing playing)
	/// restarts from the top. Empty playlists yield nothing.
	pub fn next_after(&mut self, current: Option<AssetId>) -> Option<AssetId> {
		if self.order.is_empty() {
			return None;
		}

		let next_index = current.and_then(|id| self.position(id)).map_or(0, |found| (found + 1) % self.order.len());

		self.last_index = Some(next_index);
		self.order.get(next_index).copied()
	}

	pub fn position(&self, id: AssetId) -> Option<usize> {
		self.order.iter().position(|candidate| *candidate == id)
	}

	pub const fn last_index(&self) -> Option<usize> {
		self.last_index
	}

	pub fn ids(&self) -> &[AssetId] {
		&self.order
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}
}
