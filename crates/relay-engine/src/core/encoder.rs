use std::path::Path;

use super::{Resolution, StreamTarget};

pub const VIDEO_CODEC: &str = "libx264";
pub const PRESET: &str = "ultrafast";
pub const TUNE: &str = "zerolatency";
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";
pub const AUDIO_SAMPLE_RATE: &str = "44100";
pub const CONTAINER: &str = "flv";

/// Encoder argument list for relaying `input` to `endpoint`.
///
/// Output is a pure function of the inputs: same file, endpoint and target always
/// produce the same sequence. A fixed resolution adds a scale filter right before
/// the container/output pair.
pub fn build_args(input: &Path, endpoint: &str, target: &StreamTarget) -> Vec<String> {
	let bitrate = target.video_bitrate;
	let framerate = target.framerate;

	let mut args: Vec<String> = vec![
		"-re".into(),
		"-i".into(),
		input.to_string_lossy().into_owned(),
		"-c:v".into(),
		VIDEO_CODEC.into(),
		"-preset".into(),
		PRESET.into(),
		"-tune".into(),
		TUNE.into(),
		"-b:v".into(),
		format!("{bitrate}k"),
		"-maxrate".into(),
		format!("{bitrate}k"),
		"-bufsize".into(),
		format!("{}k", u64::from(bitrate) * 2),
		"-r".into(),
		framerate.to_string(),
		"-g".into(),
		(u64::from(framerate) * 2).to_string(),
		"-c:a".into(),
		AUDIO_CODEC.into(),
		"-b:a".into(),
		AUDIO_BITRATE.into(),
		"-ar".into(),
		AUDIO_SAMPLE_RATE.into(),
	];

	if let Resolution::Fixed { width, height } = target.resolution {
		args.push("-vf".into());
		args.push(format!("scale={width}:{height}"));
	}

	args.push("-f".into());
	args.push(CONTAINER.into());
	args.push(endpoint.to_string());

	args
}

/// Shell-like rendering for logs. The stream key is masked.
pub fn display_command(program: &str, args: &[String], stream_key: &str) -> String {
	let mut line = String::from(program);
	for arg in args {
		line.push(' ');
		if stream_key.is_empty() {
			line.push_str(arg);
		} else {
			line.push_str(&arg.replace(stream_key, "****"));
		}
	}
	line
}
