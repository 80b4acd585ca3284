use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::RelayStore;

pub const IDLE_UPTIME: &str = "00:00:00";

/// Zero-padded `HH:MM:SS`; hours keep growing past 99
pub fn format_uptime(elapsed: Duration) -> String {
	let seconds = elapsed.as_secs();
	let hours = seconds / 3600;
	let minutes = (seconds % 3600) / 60;
	let secs = seconds % 60;
	format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Periodic writer of the live uptime to the status store.
///
/// Only runs while a session is Live; dropping or stopping it ends the task.
pub struct UptimeTracker {
	cancel: CancellationToken,
	handle: Option<JoinHandle<()>>,
}

impl UptimeTracker {
	pub fn start(store: Arc<dyn RelayStore>, started_at: Instant, cadence: Duration) -> Self {
		let cancel = CancellationToken::new();
		let token = cancel.clone();

		let handle = tokio::spawn(async move {
			let mut ticker = interval(cadence);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				tokio::select! {
					() = token.cancelled() => break,
					_ = ticker.tick() => {
						let uptime = format_uptime(started_at.elapsed());
						if let Err(e) = store.write_uptime(&uptime).await {
							warn!("Failed to write uptime: {}", e);
						}
					}
				}
			}

			debug!("Uptime tracker stopped");
		});

		Self { cancel, handle: Some(handle) }
	}

	/// Cancel and wait for an in-flight write to land
	pub async fn stop(mut self) {
		self.cancel.cancel();
		if let Some(handle) = self.handle.take() {
			let _ = handle.await;
		}
	}
}

impl Drop for UptimeTracker {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::InMemoryStore;

	#[test]
	fn formats_hours_minutes_seconds() {
		assert_eq!(format_uptime(Duration::from_secs(3661)), "01:01:01");
		assert_eq!(format_uptime(Duration::ZERO), IDLE_UPTIME);
		assert_eq!(format_uptime(Duration::from_millis(59_999)), "00:00:59");
		assert_eq!(format_uptime(Duration::from_secs(100 * 3600)), "100:00:00");
	}

	#[tokio::test(start_paused = true)]
	async fn writes_uptime_until_stopped() {
		let store = Arc::new(InMemoryStore::new());
		let started_at = Instant::now();
		let tracker = UptimeTracker::start(store.clone(), started_at, Duration::from_secs(1));

		tokio::time::sleep(Duration::from_millis(3500)).await;
		assert_eq!(store.uptime().await, "00:00:03");

		tracker.stop().await;
		tokio::time::sleep(Duration::from_secs(5)).await;
		assert_eq!(store.uptime().await, "00:00:03");
	}
}
