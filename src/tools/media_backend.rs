//! 解碼後端
//!
//! 流程只透過 [`MediaBackend`] 存取影片，實際實作是 ffmpeg / ffprobe 子程序。
//! 每次呼叫都會啟動獨立的 ffmpeg 程序，因此解碼狀態不會在執行緒間共用。

use crate::error::{MontageError, MontageResult};
use crate::tools::color::ffmpeg_color;
use crate::tools::ffprobe_info::{VideoMetadata, get_video_info};
use image::{Rgb, RgbImage};
use log::debug;
use std::path::Path;
use std::process::Command;

/// 兩段式 seek 的前置緩衝時間（秒）
const SEEK_MARGIN: f64 = 2.0;

/// 單張影格的擷取參數
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
}

/// 片段擷取參數（GIF 模式）
#[derive(Debug, Clone, Copy)]
pub struct ClipRequest {
    pub start: f64,
    pub duration: f64,
    pub fps: u32,
    pub max_frames: usize,
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
}

pub trait MediaBackend: Sync {
    /// 開啟影片並讀取基本資訊，失敗時回傳 `MontageError::Input`
    fn probe(&self, path: &Path) -> MontageResult<VideoMetadata>;

    /// 解碼時間點之後（含）的第一張影格，並以 letterbox 縮放到指定尺寸
    fn decode_frame(&self, path: &Path, request: &FrameRequest) -> MontageResult<RgbImage>;

    /// 解碼一段片段，依 `fps` 取樣，最多 `max_frames` 張
    fn decode_clip(&self, path: &Path, request: &ClipRequest) -> MontageResult<Vec<RgbImage>>;
}

/// 以 ffmpeg 命令列實作的後端
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// 建立單張影格的 ffmpeg 命令（使用兩段式 seek 加速）
    ///
    /// 1. `-ss` 在 `-i` 前：快速跳轉到最近的關鍵幀
    /// 2. `-ss` 在 `-i` 後：精準解碼到目標時間點
    #[must_use]
    pub fn build_frame_command(path: &Path, request: &FrameRequest) -> Command {
        let t0 = (request.timestamp - SEEK_MARGIN).max(0.0);
        let delta = request.timestamp - t0;

        let mut cmd = base_command();
        if t0 > 0.0 {
            cmd.args(["-ss", &format!("{t0:.3}")]);
        }
        cmd.arg("-i").arg(path);
        if delta > 0.0 {
            cmd.args(["-ss", &format!("{delta:.3}")]);
        }
        cmd.args([
            "-frames:v",
            "1",
            "-an",
            "-sn",
            "-dn",
            "-threads",
            "1",
            "-vf",
            &letterbox_filter(request.width, request.height, request.background),
        ]);
        raw_output_args(&mut cmd);
        cmd
    }

    /// 建立片段擷取的 ffmpeg 命令
    #[must_use]
    pub fn build_clip_command(path: &Path, request: &ClipRequest) -> Command {
        let filter = format!(
            "fps={},{}",
            request.fps,
            letterbox_filter(request.width, request.height, request.background)
        );

        let mut cmd = base_command();
        cmd.args(["-ss", &format!("{:.3}", request.start.max(0.0))]);
        cmd.arg("-i").arg(path);
        cmd.args([
            "-t",
            &format!("{:.3}", request.duration),
            "-frames:v",
            &request.max_frames.to_string(),
            "-an",
            "-sn",
            "-dn",
            "-threads",
            "1",
            "-vf",
            &filter,
        ]);
        raw_output_args(&mut cmd);
        cmd
    }
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> MontageResult<VideoMetadata> {
        get_video_info(path)
    }

    fn decode_frame(&self, path: &Path, request: &FrameRequest) -> MontageResult<RgbImage> {
        debug!(
            "擷取影格: {} @ {:.3}s",
            path.display(),
            request.timestamp
        );
        let mut cmd = Self::build_frame_command(path, request);
        let raw = run_raw(&mut cmd)?;
        let mut frames = split_raw_frames(raw, request.width, request.height);
        if frames.is_empty() {
            return Err(MontageError::Decode(format!(
                "在 {:.3}s 沒有可解碼的影格",
                request.timestamp
            )));
        }
        Ok(frames.swap_remove(0))
    }

    fn decode_clip(&self, path: &Path, request: &ClipRequest) -> MontageResult<Vec<RgbImage>> {
        debug!(
            "擷取片段: {} @ {:.3}s + {:.3}s ({} fps)",
            path.display(),
            request.start,
            request.duration,
            request.fps
        );
        let mut cmd = Self::build_clip_command(path, request);
        let raw = run_raw(&mut cmd)?;
        let frames = split_raw_frames(raw, request.width, request.height);
        if frames.is_empty() {
            return Err(MontageError::Decode(format!(
                "片段 {:.3}s 沒有可解碼的影格",
                request.start
            )));
        }
        Ok(frames)
    }
}

fn base_command() -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
    cmd
}

fn raw_output_args(cmd: &mut Command) {
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);
}

/// 縮放並保持比例，不足部分以背景色填滿
///
/// 使用 bitexact 縮放讓相同輸入產生相同像素
#[must_use]
pub fn letterbox_filter(width: u32, height: u32, background: Rgb<u8>) -> String {
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease:flags=bilinear+accurate_rnd+bitexact,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color={},setsar=1",
        ffmpeg_color(background)
    )
}

fn run_raw(cmd: &mut Command) -> MontageResult<Vec<u8>> {
    let output = cmd
        .output()
        .map_err(|e| MontageError::Decode(format!("無法執行 ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MontageError::Decode(format!(
            "ffmpeg 解碼失敗: {}",
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// 將 rgb24 原始資料切成影格，不完整的尾端會被丟棄
fn split_raw_frames(raw: Vec<u8>, width: u32, height: u32) -> Vec<RgbImage> {
    let frame_len = width as usize * height as usize * 3;
    if frame_len == 0 {
        return Vec::new();
    }

    raw.chunks_exact(frame_len)
        .filter_map(|chunk| RgbImage::from_raw(width, height, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_letterbox_filter() {
        let filter = letterbox_filter(320, 180, Rgb([0x22, 0x22, 0x22]));
        assert!(filter.starts_with("scale=320:180:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=320:180:(ow-iw)/2:(oh-ih)/2:color=0x222222"));
    }

    #[test]
    fn test_frame_command_two_stage_seek() {
        let request = FrameRequest {
            timestamp: 30.5,
            width: 320,
            height: 180,
            background: Rgb([0, 0, 0]),
        };
        let args = args_of(&FfmpegBackend::build_frame_command(
            Path::new("/v/a.mp4"),
            &request,
        ));

        let first_ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[first_ss + 1], "28.500");
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(first_ss < input);
        assert_eq!(args[input + 1], "/v/a.mp4");
        assert_eq!(args[input + 2], "-ss");
        assert_eq!(args[input + 3], "2.000");
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "rgb24"));
    }

    #[test]
    fn test_frame_command_near_start() {
        let request = FrameRequest {
            timestamp: 1.0,
            width: 16,
            height: 16,
            background: Rgb([0, 0, 0]),
        };
        let args = args_of(&FfmpegBackend::build_frame_command(Path::new("a.mp4"), &request));
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(!args[..input].contains(&"-ss".to_string()));
        assert_eq!(args[input + 3], "1.000");
    }

    #[test]
    fn test_clip_command() {
        let request = ClipRequest {
            start: 9.0,
            duration: 2.0,
            fps: 10,
            max_frames: 20,
            width: 64,
            height: 36,
            background: Rgb([0, 0, 0]),
        };
        let args = args_of(&FfmpegBackend::build_clip_command(Path::new("a.mp4"), &request));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "2.000"));
        assert!(args.windows(2).any(|w| w[0] == "-frames:v" && w[1] == "20"));
        assert!(args.iter().any(|a| a.starts_with("fps=10,scale=64:36")));
    }

    #[test]
    fn test_split_raw_frames() {
        let raw = vec![7u8; 2 * 2 * 3 * 2 + 5];
        let frames = split_raw_frames(raw, 2, 2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].get_pixel(1, 1), &Rgb([7, 7, 7]));
        assert!(split_raw_frames(vec![0; 3], 2, 2).is_empty());
    }
}
