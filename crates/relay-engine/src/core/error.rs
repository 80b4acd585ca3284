use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::AssetId;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
	#[error("Asset {0} not found")]
	AssetNotFound(AssetId),

	#[error("Asset {id} file missing on disk: {}", path.display())]
	AssetFileMissing { id: AssetId, path: PathBuf },

	#[error("No asset is selected")]
	NothingSelected,

	#[error("Invalid stream target: {0}")]
	TargetInvalid(String),

	#[error("Failed to spawn encoder: {0}")]
	SpawnFailure(String),

	#[error("Encoder crashed with {0}")]
	ProcessCrash(String),

	#[error("Encoder probe timed out after {0:?}")]
	ProbeTimeout(Duration),

	#[error("Encoder executable not found: {0}")]
	EncoderMissing(String),

	#[error("Encoder probe failed: {0}")]
	ProbeFailed(String),

	#[error("Session {0} already has a registered process")]
	AlreadyRegistered(String),

	#[error("Invalid engine configuration: {0}")]
	InvalidConfig(String),

	#[error("Store error: {0}")]
	Store(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

impl RelayError {
	/// Errors raised while validating a start request, before any process is touched
	pub const fn is_validation(&self) -> bool {
		matches!(self, Self::AssetNotFound(_) | Self::AssetFileMissing { .. } | Self::NothingSelected | Self::TargetInvalid(_))
	}
}
