mod color;
mod ffprobe_info;
mod format;
mod media_backend;
mod path_validator;
mod video_scanner;

pub use color::{ffmpeg_color, parse_color};
pub use ffprobe_info::{VideoMetadata, get_video_info};
pub use format::{format_bitrate, format_duration, format_megabytes};
pub use media_backend::{ClipRequest, FfmpegBackend, FrameRequest, MediaBackend, letterbox_filter};
pub use path_validator::{ensure_directory_exists, validate_input_exists};
pub use video_scanner::scan_video_files;
