use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of a stored video asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<u64> for AssetId {
	fn from(id: u64) -> Self {
		Self(id)
	}
}

/// Identifier of one logical output stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self(key.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for SessionKey {
	fn default() -> Self {
		Self::new("primary")
	}
}

impl fmt::Display for SessionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A video file known to the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoAsset {
	pub id: AssetId,
	pub title: String,
	/// Location of the file, relative paths resolve against the media root
	pub file: PathBuf,
	#[serde(default)]
	pub size_bytes: u64,
	#[serde(default = "default_duration_label")]
	pub duration: String,
	pub playlist_order: i64,
}

fn default_duration_label() -> String {
	"00:00".to_string()
}

/// Destination platform of an outbound stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
	Youtube,
	Twitch,
	Facebook,
	Custom,
}

impl Platform {
	/// Case-insensitive lookup; unrecognised identifiers fall back to `Custom`
	pub fn from_identifier(identifier: &str) -> Self {
		match identifier.trim().to_ascii_lowercase().as_str() {
			"youtube" => Self::Youtube,
			"twitch" => Self::Twitch,
			"facebook" => Self::Facebook,
			_ => Self::Custom,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Youtube => "youtube",
			Self::Twitch => "twitch",
			Self::Facebook => "facebook",
			Self::Custom => "custom",
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for Platform {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for Platform {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		Ok(Self::from_identifier(&raw))
	}
}

/// Output frame size. `Original` keeps the source dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
	Original,
	Fixed { width: u32, height: u32 },
}

impl Resolution {
	pub const fn fixed(width: u32, height: u32) -> Self {
		Self::Fixed { width, height }
	}
}

impl Default for Resolution {
	fn default() -> Self {
		Self::fixed(1920, 1080)
	}
}

impl fmt::Display for Resolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Original => f.write_str("original"),
			Self::Fixed { width, height } => write!(f, "{width}x{height}"),
		}
	}
}

impl FromStr for Resolution {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.eq_ignore_ascii_case("original") {
			return Ok(Self::Original);
		}

		let (width, height) = s.split_once(['x', 'X']).ok_or_else(|| format!("resolution '{s}' is not WxH or 'original'"))?;
		let width: u32 = width.trim().parse().map_err(|_| format!("invalid width in resolution '{s}'"))?;
		let height: u32 = height.trim().parse().map_err(|_| format!("invalid height in resolution '{s}'"))?;

		if width == 0 || height == 0 {
			return Err(format!("resolution '{s}' has a zero dimension"));
		}

		Ok(Self::Fixed { width, height })
	}
}

impl Serialize for Resolution {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Resolution {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Destination and quality settings for one start call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTarget {
	pub platform: Platform,
	#[serde(default)]
	pub stream_key: String,
	#[serde(default)]
	pub endpoint_override: Option<String>,
	#[serde(default)]
	pub resolution: Resolution,
	#[serde(default = "default_framerate")]
	pub framerate: u32,
	/// Video bitrate in kbps
	#[serde(default = "default_video_bitrate")]
	pub video_bitrate: u32,
	/// Audio bitrate in kbps
	#[serde(default = "default_audio_bitrate")]
	pub audio_bitrate: u32,
}

const fn default_framerate() -> u32 {
	30
}

const fn default_video_bitrate() -> u32 {
	2500
}

const fn default_audio_bitrate() -> u32 {
	128
}

impl StreamTarget {
	pub fn new(platform: Platform, stream_key: impl Into<String>) -> Self {
		Self {
			platform,
			stream_key: stream_key.into(),
			endpoint_override: None,
			resolution: Resolution::default(),
			framerate: default_framerate(),
			video_bitrate: default_video_bitrate(),
			audio_bitrate: default_audio_bitrate(),
		}
	}

	pub fn with_endpoint_override(mut self, url: impl Into<String>) -> Self {
		self.endpoint_override = Some(url.into());
		self
	}

	pub fn with_resolution(mut self, resolution: Resolution) -> Self {
		self.resolution = resolution;
		self
	}

	pub fn with_framerate(mut self, framerate: u32) -> Self {
		self.framerate = framerate;
		self
	}

	pub fn with_video_bitrate(mut self, kbps: u32) -> Self {
		self.video_bitrate = kbps;
		self
	}

	fn has_override(&self) -> bool {
		self.endpoint_override.as_deref().is_some_and(|url| !url.trim().is_empty())
	}

	/// Checks the target before anything is spawned for it
	pub fn validate(&self) -> Result<(), String> {
		let key_optional = self.platform == Platform::Custom && self.has_override();
		if self.stream_key.trim().is_empty() && !key_optional {
			return Err(format!("stream key is required for platform '{}'", self.platform));
		}
		if self.framerate == 0 {
			return Err("framerate must be greater than zero".to_string());
		}
		if self.video_bitrate == 0 {
			return Err("video bitrate must be greater than zero".to_string());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolution_parses_dimensions_and_sentinel() {
		assert_eq!("1280x720".parse::<Resolution>(), Ok(Resolution::fixed(1280, 720)));
		assert_eq!("ORIGINAL".parse::<Resolution>(), Ok(Resolution::Original));
		assert!("1280".parse::<Resolution>().is_err());
		assert!("0x720".parse::<Resolution>().is_err());
		assert!("widexhigh".parse::<Resolution>().is_err());
	}

	#[test]
	fn unknown_platform_falls_back_to_custom() {
		assert_eq!(Platform::from_identifier("YouTube"), Platform::Youtube);
		assert_eq!(Platform::from_identifier("kick"), Platform::Custom);

		let parsed: Platform = serde_json::from_str("\"kick\"").unwrap();
		assert_eq!(parsed, Platform::Custom);
	}

	#[test]
	fn target_requires_key_unless_custom_override() {
		assert!(StreamTarget::new(Platform::Youtube, "").validate().is_err());
		assert!(StreamTarget::new(Platform::Custom, "").validate().is_err());
		assert!(StreamTarget::new(Platform::Custom, "").with_endpoint_override("rtmp://relay/live").validate().is_ok());
		assert!(StreamTarget::new(Platform::Twitch, "live_123").validate().is_ok());
		assert!(StreamTarget::new(Platform::Twitch, "live_123").with_framerate(0).validate().is_err());
	}

	#[test]
	fn target_deserializes_with_defaults() {
		let target: StreamTarget = serde_json::from_str(r#"{"platform":"twitch","stream_key":"abc","resolution":"original"}"#).unwrap();
		assert_eq!(target.resolution, Resolution::Original);
		assert_eq!(target.framerate, 30);
		assert_eq!(target.video_bitrate, 2500);
		assert_eq!(target.audio_bitrate, 128);
	}
}
