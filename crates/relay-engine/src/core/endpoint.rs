use super::{Platform, StreamTarget};

pub const YOUTUBE_INGEST: &str = "rtmp://a.rtmp.youtube.com/live2";
pub const TWITCH_INGEST: &str = "rtmp://live.twitch.tv/app";
pub const FACEBOOK_INGEST: &str = "rtmps://live-api-s.facebook.com:443/rtmp";
pub const LOCAL_INGEST: &str = "rtmp://localhost:1935/live";

/// Base ingest URL for a platform. The override only applies to `Custom`.
pub fn base_endpoint(platform: Platform, endpoint_override: Option<&str>) -> String {
	match platform {
		Platform::Youtube => YOUTUBE_INGEST.to_string(),
		Platform::Twitch => TWITCH_INGEST.to_string(),
		Platform::Facebook => FACEBOOK_INGEST.to_string(),
		Platform::Custom => endpoint_override
			.map(|url| url.trim().trim_end_matches('/'))
			.filter(|url| !url.is_empty())
			.unwrap_or(LOCAL_INGEST)
			.to_string(),
	}
}

/// Fully qualified publish endpoint: base URL joined with the stream key
pub fn resolve_endpoint(target: &StreamTarget) -> String {
	let base = base_endpoint(target.platform, target.endpoint_override.as_deref());
	let key = target.stream_key.trim();

	if key.is_empty() {
		base
	} else {
		format!("{base}/{key}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_platforms_ignore_override() {
		let target = StreamTarget::new(Platform::Youtube, "abcd-1234").with_endpoint_override("rtmp://elsewhere/live");
		assert_eq!(resolve_endpoint(&target), "rtmp://a.rtmp.youtube.com/live2/abcd-1234");

		let target = StreamTarget::new(Platform::Twitch, "live_42");
		assert_eq!(resolve_endpoint(&target), "rtmp://live.twitch.tv/app/live_42");

		let target = StreamTarget::new(Platform::Facebook, "FB-1");
		assert_eq!(resolve_endpoint(&target), "rtmps://live-api-s.facebook.com:443/rtmp/FB-1");
	}

	#[test]
	fn custom_uses_override_or_local_default() {
		assert_eq!(base_endpoint(Platform::Custom, Some("rtmp://relay.example/live/")), "rtmp://relay.example/live");
		assert_eq!(base_endpoint(Platform::Custom, Some("   ")), LOCAL_INGEST);
		assert_eq!(base_endpoint(Platform::Custom, None), LOCAL_INGEST);

		let unknown = StreamTarget::new(Platform::from_identifier("kick"), "key");
		assert_eq!(resolve_endpoint(&unknown), "rtmp://localhost:1935/live/key");
	}

	#[test]
	fn empty_key_keeps_base_untouched() {
		let target = StreamTarget::new(Platform::Custom, "").with_endpoint_override("rtmp://relay.example/live/show");
		assert_eq!(resolve_endpoint(&target), "rtmp://relay.example/live/show");
	}
}
