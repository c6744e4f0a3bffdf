use crate::config::{ConfigLayer, MontageConfig, OutputFormat};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// 從影片取樣影格，產生網格預覽圖（JPG）或動態預覽圖（GIF）
#[derive(Parser, Debug)]
#[command(name = "video_montage", version)]
pub struct Args {
    /// YAML 設定檔
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 只顯示錯誤
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// 顯示除錯訊息
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 產生靜態網格預覽圖
    Jpg(JpgCommand),
    /// 產生動態預覽圖，每個格子播放一段片段
    Gif(GifCommand),
}

/// 兩種格式共用的選項
#[derive(clap::Args, Debug, Default)]
pub struct CommonArgs {
    /// 影片檔案或資料夾
    pub input: PathBuf,

    /// 輸出檔案、資料夾，或 `-` 代表標準輸出
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub columns: Option<u32>,

    #[arg(long)]
    pub rows: Option<u32>,

    /// 依影片長度自動決定網格
    #[arg(long)]
    pub auto_grid: bool,

    #[arg(long)]
    pub thumb_width: Option<u32>,

    /// -1 代表依影片比例自動計算
    #[arg(long, allow_negative_numbers = true)]
    pub thumb_height: Option<i32>,

    #[arg(long)]
    pub padding: Option<u32>,

    #[arg(long)]
    pub margin: Option<u32>,

    #[arg(long)]
    pub header_height: Option<u32>,

    /// 略過開頭的百分比
    #[arg(long)]
    pub skip_start: Option<f64>,

    /// 略過結尾的百分比
    #[arg(long)]
    pub skip_end: Option<f64>,

    #[arg(long)]
    pub max_workers: Option<usize>,

    /// 覆寫已存在的輸出檔
    #[arg(long)]
    pub overwrite: bool,

    /// 掃描子資料夾
    #[arg(long)]
    pub recursive: bool,

    /// TrueType / OpenType 字型檔，未指定時不繪製文字
    #[arg(long)]
    pub font_file: Option<PathBuf>,

    #[arg(long)]
    pub font_color: Option<String>,

    #[arg(long)]
    pub shadow_color: Option<String>,

    #[arg(long = "bg-color")]
    pub background_color: Option<String>,

    /// 標題顯示完整路徑
    #[arg(long)]
    pub show_full_path: bool,
}

#[derive(clap::Args, Debug)]
pub struct JpgCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// JPEG 品質（1-100）
    #[arg(long)]
    pub quality: Option<u8>,
}

#[derive(clap::Args, Debug)]
pub struct GifCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// 每段片段的秒數
    #[arg(long)]
    pub clip_duration: Option<f64>,

    /// 片段起點相對取樣點的秒數（負數代表之前）
    #[arg(long, allow_negative_numbers = true)]
    pub clip_start_offset: Option<f64>,

    /// 片段終點相對取樣點的秒數
    #[arg(long, allow_negative_numbers = true)]
    pub clip_end_offset: Option<f64>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// 調色盤顏色數（2-256）
    #[arg(long)]
    pub colors: Option<u32>,

    /// 循環次數，0 代表無限循環
    #[arg(long = "loop")]
    pub loop_count: Option<u16>,

    /// 每張影格都寫出完整畫布
    #[arg(long)]
    pub no_optimize: bool,

    /// 量化時使用 Floyd-Steinberg 抖色
    #[arg(long)]
    pub dither: bool,
}

/// 旗標只有在指定時才覆蓋設定檔
const fn flag(value: bool) -> Option<bool> {
    if value { Some(true) } else { None }
}

impl CommonArgs {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            columns: self.columns,
            rows: self.rows,
            auto_grid: flag(self.auto_grid),
            thumb_width: self.thumb_width,
            thumb_height: self.thumb_height,
            padding: self.padding,
            margin: self.margin,
            header_height: self.header_height,
            output: self.output.clone(),
            overwrite: flag(self.overwrite),
            recursive: flag(self.recursive),
            skip_start: self.skip_start,
            skip_end: self.skip_end,
            max_workers: self.max_workers,
            font_file: self.font_file.clone(),
            font_color: self.font_color.clone(),
            shadow_color: self.shadow_color.clone(),
            background_color: self.background_color.clone(),
            show_full_path: flag(self.show_full_path),
            ..ConfigLayer::default()
        }
    }
}

impl Args {
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        match self.command {
            Command::Jpg(_) => OutputFormat::Jpg,
            Command::Gif(_) => OutputFormat::Gif,
        }
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        match &self.command {
            Command::Jpg(cmd) => &cmd.common.input,
            Command::Gif(cmd) => &cmd.common.input,
        }
    }

    /// 命令列指定的設定
    #[must_use]
    pub fn cli_layer(&self) -> ConfigLayer {
        let mut layer = match &self.command {
            Command::Jpg(cmd) => ConfigLayer {
                jpeg_quality: cmd.quality,
                ..cmd.common.layer()
            },
            Command::Gif(cmd) => ConfigLayer {
                clip_duration: cmd.clip_duration,
                clip_start_offset: cmd.clip_start_offset,
                clip_end_offset: cmd.clip_end_offset,
                fps: cmd.fps,
                colors: cmd.colors,
                loop_count: cmd.loop_count,
                optimize: cmd.no_optimize.then_some(false),
                dither: flag(cmd.dither),
                ..cmd.common.layer()
            },
        };
        layer.quiet = flag(self.quiet);
        layer.verbose = flag(self.verbose);
        layer
    }

    /// 讀取 `--config` 指定的設定檔
    pub fn file_layer(&self) -> Result<Option<ConfigLayer>> {
        self.config
            .as_deref()
            .map(|path| {
                ConfigLayer::from_yaml_file(path)
                    .with_context(|| format!("無法載入設定檔: {}", path.display()))
            })
            .transpose()
    }

    /// 合併設定檔與命令列後驗證
    pub fn resolve_config(&self, file_layer: Option<ConfigLayer>) -> Result<MontageConfig> {
        MontageConfig::resolve(self.format(), file_layer, self.cli_layer()).context("設定無效")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_jpg() {
        let args = parse(&[
            "video_montage",
            "jpg",
            "/v/a.mp4",
            "--columns",
            "3",
            "--thumb-height",
            "-1",
            "--quality",
            "90",
            "-o",
            "-",
        ]);
        assert_eq!(args.format(), OutputFormat::Jpg);
        assert_eq!(args.input(), Path::new("/v/a.mp4"));

        let layer = args.cli_layer();
        assert_eq!(layer.columns, Some(3));
        assert_eq!(layer.thumb_height, Some(-1));
        assert_eq!(layer.jpeg_quality, Some(90));
        assert_eq!(layer.output, Some(PathBuf::from("-")));
        assert_eq!(layer.overwrite, None);
    }

    #[test]
    fn test_parse_gif() {
        let args = parse(&[
            "video_montage",
            "-v",
            "gif",
            "/v",
            "--fps",
            "12",
            "--loop",
            "3",
            "--no-optimize",
            "--overwrite",
            "--bg-color",
            "black",
        ]);
        assert_eq!(args.format(), OutputFormat::Gif);

        let layer = args.cli_layer();
        assert_eq!(layer.fps, Some(12));
        assert_eq!(layer.loop_count, Some(3));
        assert_eq!(layer.optimize, Some(false));
        assert_eq!(layer.overwrite, Some(true));
        assert_eq!(layer.background_color.as_deref(), Some("black"));
        assert_eq!(layer.verbose, Some(true));
        assert_eq!(layer.dither, None);
    }

    #[test]
    fn test_parse_gif_clip_window() {
        let args = parse(&[
            "video_montage",
            "gif",
            "a.mp4",
            "--clip-start-offset",
            "-0.5",
            "--clip-end-offset",
            "1.5",
            "--dither",
        ]);
        let config = args.resolve_config(None).unwrap();
        assert_eq!(config.clip_offsets(), (-0.5, 1.5));
        assert!(config.dither);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["video_montage", "jpg", "a.mp4", "-q", "-c", "cfg.yaml"]);
        assert!(args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("cfg.yaml")));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["video_montage", "-q", "-v", "jpg", "a.mp4"]).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let args = parse(&["video_montage", "jpg", "a.mp4", "--rows", "7"]);
        let file = ConfigLayer::from_yaml_str("rows: 2\ncolumns: 6\n").unwrap();

        let config = args.resolve_config(Some(file)).unwrap();
        assert_eq!(config.rows, 7);
        assert_eq!(config.columns, 6);
        assert_eq!(config.padding, 5);
    }

    #[test]
    fn test_invalid_value_is_error() {
        let args = parse(&["video_montage", "jpg", "a.mp4", "--quality", "0"]);
        assert!(args.resolve_config(None).is_err());
    }
}
