use tokio::sync::oneshot;

use super::error::Result;
use super::{AssetId, SessionKey, StatusSnapshot, StreamTarget};

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Internal command type consumed by the engine actor
#[derive(Debug)]
pub enum EngineCommand {
	Start {
		asset: AssetId,
		target: Box<StreamTarget>,
		response: Reply<StatusSnapshot>,
	},
	StartSelected {
		response: Reply<StatusSnapshot>,
	},
	Stop {
		key: Option<SessionKey>,
		response: Reply<bool>,
	},
	SetCurrent {
		asset: AssetId,
		response: Reply<()>,
	},
	SetLoop {
		enabled: bool,
		response: Reply<()>,
	},
	Status {
		response: oneshot::Sender<StatusSnapshot>,
	},
	Shutdown {
		response: oneshot::Sender<()>,
	},
}

impl EngineCommand {
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Start { .. } => "start",
			Self::StartSelected { .. } => "start_selected",
			Self::Stop { .. } => "stop",
			Self::SetCurrent { .. } => "set_current",
			Self::SetLoop { .. } => "set_loop",
			Self::Status { .. } => "status",
			Self::Shutdown { .. } => "shutdown",
		}
	}
}
