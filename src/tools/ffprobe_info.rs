use crate::error::{MontageError, MontageResult};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 影片基本資訊，每個檔案只讀取一次
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub bit_rate: u64,
    pub file_size: u64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

/// 使用 ffprobe 取得影片資訊
///
/// 無法開啟、沒有視訊串流或長度無效都視為輸入錯誤
pub fn get_video_info(path: &Path) -> MontageResult<VideoMetadata> {
    if !path.is_file() {
        return Err(MontageError::Input(format!("檔案不存在: {}", path.display())));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| MontageError::Input(format!("無法執行 ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MontageError::Input(format!(
            "ffprobe 無法開啟 {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    parse_ffprobe_output(path, &stdout, file_size)
}

/// 解析 ffprobe JSON 輸出
fn parse_ffprobe_output(path: &Path, json: &str, file_size: u64) -> MontageResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| MontageError::Input(format!("無法解析 ffprobe 輸出: {e}")))?;

    let streams = probe.streams.unwrap_or_default();

    // 找到視訊串流
    let video_stream = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MontageError::Input(format!("找不到視訊串流: {}", path.display())))?;

    let audio_codec = streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.codec_name.clone());

    // 取得寬度和高度
    let width = video_stream
        .width
        .filter(|&w| w > 0)
        .ok_or_else(|| MontageError::Input("無法取得影片寬度".to_string()))?;
    let height = video_stream
        .height
        .filter(|&h| h > 0)
        .ok_or_else(|| MontageError::Input("無法取得影片高度".to_string()))?;

    // 取得影片長度（優先從 format，其次從 stream）
    let format = probe.format.as_ref();
    let duration_seconds = format
        .and_then(|f| f.duration.as_deref())
        .or(video_stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| MontageError::Input(format!("無效的影片長度: {}", path.display())))?;

    // 解析幀率（格式可能是 "30/1" 或 "30000/1001"），avg_frame_rate 可能是 "0/0"
    let frame_rate = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let file_size = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(file_size);

    // 容器沒有 bit_rate 時以檔案大小估算
    let bit_rate = format
        .and_then(|f| f.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .filter(|&b| b > 0)
        .unwrap_or_else(|| (file_size as f64 * 8.0 / duration_seconds).round() as u64);

    let metadata = VideoMetadata {
        path: path.to_path_buf(),
        duration_seconds,
        width,
        height,
        frame_rate,
        video_codec: video_stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        audio_codec,
        bit_rate,
        file_size,
    };

    debug!("影片資訊: {metadata:?}");
    Ok(metadata)
}

/// 解析幀率字串（例如 "30/1" 或 "30000/1001"）
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num_str, den_str)) = rate.split_once('/') {
        let num: f64 = num_str.parse().ok()?;
        let den: f64 = den_str.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate.parse().ok().filter(|r: &f64| *r > 0.0)
}
