use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTypeTable {
    #[serde(rename = "VIDEO_FILE")]
    pub video_file: Vec<String>,
}

impl FileTypeTable {
    #[must_use]
    pub fn video_extensions_set(&self) -> HashSet<String> {
        self.video_file
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn is_video_file(&self, path: &Path) -> bool {
        let video_extensions = self.video_extensions_set();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| video_extensions.contains(&format!(".{}", ext.to_lowercase())))
    }
}

/// 輸出格式（對應 `jpg` / `gif` 子命令）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpg,
    Gif,
}

impl OutputFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Gif => "gif",
        }
    }
}

/// 可解碼影格少於格子數時的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFramePolicy {
    /// 失敗的格子以底色填滿
    #[default]
    Blank,
    /// 只要有一格失敗就放棄整個檔案
    Error,
}

/// 自動網格規則：影片長度 <= `max_duration` 秒時使用 `columns` x `rows`
///
/// `max_duration` 為負數代表預設規則（其他規則都不符合時使用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRule {
    pub max_duration: f64,
    pub columns: u32,
    pub rows: u32,
}

#[must_use]
pub fn default_grid_rules() -> Vec<GridRule> {
    vec![
        GridRule {
            max_duration: 120.0,
            columns: 2,
            rows: 2,
        },
        GridRule {
            max_duration: 600.0,
            columns: 3,
            rows: 3,
        },
        GridRule {
            max_duration: 1800.0,
            columns: 4,
            rows: 4,
        },
        GridRule {
            max_duration: -1.0,
            columns: 5,
            rows: 5,
        },
    ]
}

pub const COLORS_MIN: u32 = 2;
pub const COLORS_MAX: u32 = 256;

/// 驗證後的完整設定
///
/// 由 [`ConfigLayer`] 依「命令列 > 設定檔 > 預設值」合併而成，
/// 在任何檔案開始處理前驗證一次。
#[derive(Debug, Clone, PartialEq)]
pub struct MontageConfig {
    pub format: OutputFormat,

    // 網格
    pub columns: u32,
    pub rows: u32,
    pub auto_grid: bool,
    pub duration_grid_rules: Vec<GridRule>,
    pub thumb_width: u32,
    /// -1 代表依影片比例自動計算
    pub thumb_height: i32,
    pub padding: u32,
    pub margin: u32,
    pub header_height: u32,

    // 輸入輸出
    pub output: Option<PathBuf>,
    pub overwrite: bool,
    pub recursive: bool,

    // 擷取
    pub skip_start: f64,
    pub skip_end: f64,
    pub max_workers: usize,
    pub missing_frames: MissingFramePolicy,

    // 外觀
    pub font_file: Option<PathBuf>,
    pub font_color: String,
    pub shadow_color: String,
    pub background_color: String,
    pub placeholder_color: Option<String>,
    pub show_full_path: bool,

    // JPG
    pub jpeg_quality: u8,

    // GIF
    pub clip_duration: f64,
    /// 片段起點相對取樣點的偏移（秒），未設定時為 `-clip_duration / 2`
    pub clip_start_offset: Option<f64>,
    /// 片段終點相對取樣點的偏移（秒），未設定時為 `clip_duration / 2`
    pub clip_end_offset: Option<f64>,
    pub fps: u32,
    pub colors: u32,
    pub loop_count: u16,
    pub optimize: bool,
    /// 量化時使用 Floyd-Steinberg 抖色
    pub dither: bool,

    pub quiet: bool,
    pub verbose: bool,
}

impl MontageConfig {
    #[must_use]
    pub fn defaults(format: OutputFormat) -> Self {
        Self {
            format,
            columns: 4,
            rows: 5,
            auto_grid: false,
            duration_grid_rules: default_grid_rules(),
            thumb_width: 640,
            thumb_height: -1,
            padding: 5,
            margin: 20,
            header_height: 120,
            output: None,
            overwrite: false,
            recursive: false,
            skip_start: 5.0,
            skip_end: 5.0,
            max_workers: 8,
            missing_frames: MissingFramePolicy::Blank,
            font_file: None,
            font_color: "white".to_string(),
            shadow_color: "black".to_string(),
            background_color: "#222222".to_string(),
            placeholder_color: None,
            show_full_path: false,
            jpeg_quality: 85,
            clip_duration: 2.0,
            clip_start_offset: None,
            clip_end_offset: None,
            fps: 10,
            colors: COLORS_MAX,
            loop_count: 0,
            optimize: true,
            dither: false,
            quiet: false,
            verbose: false,
        }
    }

    /// 片段的 `(起點, 終點)` 偏移，未設定的一端由 `clip_duration` 推算
    #[must_use]
    pub fn clip_offsets(&self) -> (f64, f64) {
        let half = self.clip_duration / 2.0;
        (
            self.clip_start_offset.unwrap_or(-half),
            self.clip_end_offset.unwrap_or(half),
        )
    }

    /// 輸出到標準輸出（`--output -`）
    #[must_use]
    pub fn writes_to_stdout(&self) -> bool {
        self.output.as_deref() == Some(Path::new("-"))
    }
}

/// 單一設定來源（設定檔或命令列），所有欄位皆為選填
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub columns: Option<u32>,
    pub rows: Option<u32>,
    pub auto_grid: Option<bool>,
    pub duration_grid_rules: Option<Vec<GridRule>>,
    pub thumb_width: Option<u32>,
    pub thumb_height: Option<i32>,
    pub padding: Option<u32>,
    pub margin: Option<u32>,
    pub header_height: Option<u32>,
    #[serde(alias = "output_path")]
    pub output: Option<PathBuf>,
    pub overwrite: Option<bool>,
    pub recursive: Option<bool>,
    #[serde(alias = "skip_start_percent")]
    pub skip_start: Option<f64>,
    #[serde(alias = "skip_end_percent")]
    pub skip_end: Option<f64>,
    pub max_workers: Option<usize>,
    pub missing_frames: Option<MissingFramePolicy>,
    pub font_file: Option<PathBuf>,
    pub font_color: Option<String>,
    pub shadow_color: Option<String>,
    pub background_color: Option<String>,
    pub placeholder_color: Option<String>,
    pub show_full_path: Option<bool>,
    pub jpeg_quality: Option<u8>,
    #[serde(alias = "gif_clip_duration")]
    pub clip_duration: Option<f64>,
    #[serde(alias = "gif_clip_start_offset")]
    pub clip_start_offset: Option<f64>,
    #[serde(alias = "gif_clip_end_offset")]
    pub clip_end_offset: Option<f64>,
    #[serde(alias = "gif_fps")]
    pub fps: Option<u32>,
    #[serde(alias = "gif_colors")]
    pub colors: Option<u32>,
    #[serde(rename = "loop", alias = "gif_loop")]
    pub loop_count: Option<u16>,
    #[serde(alias = "gif_optimize")]
    pub optimize: Option<bool>,
    #[serde(alias = "gif_dither")]
    pub dither: Option<bool>,
    pub quiet: Option<bool>,
    pub verbose: Option<bool>,
}
