use super::clip_extractor::{ClipSettings, extract_clips};
use super::compositor::{CellState, MontageComposer, MontageStyle, RenderResources, compose};
use super::encoder::{GifOptions, encode_gif, encode_jpeg};
use super::frame_extractor::{ExtractionTarget, extract_frames};
use super::frame_selector::{SampleWindow, grid_for_duration, snap_to_frames};
use super::layout::{GridSpec, resolve_thumb_height};
use super::output_naming::{OutputMode, OutputTarget, resolve_output};
use crate::config::{FileTypeTable, MissingFramePolicy, MontageConfig, OutputFormat};
use crate::error::{MontageError, MontageResult};
use crate::tools::{
    FfmpegBackend, MediaBackend, ensure_directory_exists, scan_video_files, validate_input_exists,
};
use anyhow::{Context, Result};
use console::style;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 單一檔案的處理結果
#[derive(Debug)]
pub enum FileOutcome {
    Created {
        target: OutputTarget,
        bytes: usize,
        /// 以佔位色填滿的格子數
        placeholders: usize,
    },
    /// 輸出檔已存在且未指定 overwrite
    Skipped { target: OutputTarget },
    Failed(MontageError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// 批次處理結果
#[derive(Debug, Default)]
pub struct GenerationResult {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub interrupted: bool,
    pub outcomes: Vec<FileReport>,
}

impl GenerationResult {
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// 依錯誤分類統計失敗的檔案數
    #[must_use]
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.outcomes {
            if let FileOutcome::Failed(e) = &report.outcome {
                *counts.entry(e.kind()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// 影片預覽圖生成器
///
/// 每個檔案依序經過：
/// A. 讀取影片資訊
/// B. 決定網格並選取時間點
/// C. 平行擷取影格（GIF 模式為片段）
/// D. 合成畫布
/// E. 編碼並寫出
pub struct MontageGenerator<B: MediaBackend = FfmpegBackend> {
    config: MontageConfig,
    backend: B,
    style: MontageStyle,
    resources: RenderResources,
    file_type_table: FileTypeTable,
    shutdown_signal: Arc<AtomicBool>,
}

impl MontageGenerator<FfmpegBackend> {
    pub fn new(config: MontageConfig, shutdown_signal: Arc<AtomicBool>) -> MontageResult<Self> {
        Self::with_backend(config, FfmpegBackend::new(), shutdown_signal)
    }
}

impl<B: MediaBackend> MontageGenerator<B> {
    /// 建立生成器並載入整批共用的字型
    pub fn with_backend(
        config: MontageConfig,
        backend: B,
        shutdown_signal: Arc<AtomicBool>,
    ) -> MontageResult<Self> {
        let style = MontageStyle::from_config(&config)?;
        let resources = RenderResources::load(config.font_file.as_deref())?;
        if !resources.has_font() {
            info!("未指定字型檔（--font-file），預覽圖不含標題與時間標籤");
        }
        let file_type_table = FileTypeTable::embedded()?;

        Ok(Self {
            config,
            backend,
            style,
            resources,
            file_type_table,
            shutdown_signal,
        })
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// 處理單一影片或整個資料夾
    pub fn run(&self, input: &Path) -> Result<GenerationResult> {
        validate_input_exists(input)?;

        let (videos, input_root) = if input.is_dir() {
            let videos = scan_video_files(input, &self.file_type_table, self.config.recursive)
                .with_context(|| format!("無法掃描資料夾: {}", input.display()))?;
            (videos, Some(input))
        } else {
            (vec![input.to_path_buf()], None)
        };

        if videos.is_empty() {
            self.say(None, style("找不到任何影片檔案").yellow().to_string());
            return Ok(GenerationResult::default());
        }

        let mode = OutputMode::from_setting(self.config.output.as_deref());
        if input_root.is_some() {
            match &mode {
                OutputMode::Stdout => warn!("批次模式無法輸出到標準輸出，改為輸出到影片所在資料夾"),
                OutputMode::File(path) => warn!(
                    "批次模式忽略輸出檔案路徑 {}，改為輸出到影片所在資料夾",
                    path.display()
                ),
                _ => {}
            }
            self.say(
                None,
                style(format!("找到 {} 個影片檔案", videos.len())).green().to_string(),
            );
        }

        let progress = if !self.config.quiet && videos.len() > 1 {
            let bar = ProgressBar::new(videos.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )?
                .progress_chars("#>-"),
            );
            Some(bar)
        } else {
            None
        };

        let mut result = GenerationResult {
            total_videos: videos.len(),
            ..GenerationResult::default()
        };

        for video in &videos {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷訊號，停止處理");
                result.interrupted = true;
                if let Some(bar) = &progress {
                    bar.abandon_with_message("操作已中斷");
                }
                break;
            }

            let name = video
                .file_name()
                .map_or_else(|| video.display().to_string(), |n| n.to_string_lossy().to_string());
            if let Some(bar) = &progress {
                bar.set_message(name.clone());
            }

            let target = resolve_output(&mode, video, input_root, self.config.format);
            let outcome = self.process_file(video, &target);

            match &outcome {
                FileOutcome::Created {
                    target,
                    placeholders,
                    ..
                } => {
                    result.successful += 1;
                    if !self.config.quiet && *target != OutputTarget::Stdout {
                        let note = if *placeholders > 0 {
                            format!("（{placeholders} 格使用佔位色）")
                        } else {
                            String::new()
                        };
                        self.say(
                            progress.as_ref(),
                            format!("  {} {name} -> {target}{note}", style("✓").green()),
                        );
                    }
                }
                FileOutcome::Skipped { target } => {
                    result.skipped += 1;
                    warn!("輸出檔已存在，跳過（使用 --overwrite 覆寫）: {target}");
                }
                FileOutcome::Failed(e) => {
                    result.failed += 1;
                    error!("處理影片失敗 [{}] {}: {e}", e.kind(), video.display());
                    let line = format!("  {} {name}: {e}", style("✗").red());
                    match &progress {
                        Some(bar) => bar.println(line),
                        None => eprintln!("{line}"),
                    }
                }
            }

            result.outcomes.push(FileReport {
                path: video.clone(),
                outcome,
            });
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = &progress
            && !result.interrupted
        {
            bar.finish_with_message("完成");
        }

        if input_root.is_some() {
            self.print_summary(&result);
        }

        Ok(result)
    }

    fn print_summary(&self, result: &GenerationResult) {
        self.say(None, String::new());
        self.say(None, style("=== 預覽圖生成摘要 ===").cyan().bold().to_string());
        self.say(None, format!("  總計: {} 個影片", result.total_videos));
        self.say(None, format!("  成功: {} 個", style(result.successful).green()));
        if result.skipped > 0 {
            self.say(None, format!("  跳過: {} 個", style(result.skipped).yellow()));
        }
        if result.failed > 0 {
            self.say(None, format!("  失敗: {} 個", style(result.failed).red()));
            for (kind, count) in result.failures_by_kind() {
                self.say(None, format!("    {kind}: {count}"));
            }
        }

        info!(
            "預覽圖生成完成 - 成功: {}, 跳過: {}, 失敗: {}",
            result.successful, result.skipped, result.failed
        );
    }

    /// 處理單一影片，錯誤只影響這個檔案
    pub fn process_file(&self, video: &Path, target: &OutputTarget) -> FileOutcome {
        if let OutputTarget::File(path) = target
            && path.exists()
            && !self.config.overwrite
        {
            return FileOutcome::Skipped {
                target: target.clone(),
            };
        }

        match self.render(video).and_then(|(bytes, placeholders)| {
            write_output(target, &bytes)?;
            Ok((bytes.len(), placeholders))
        }) {
            Ok((bytes, placeholders)) => {
                info!("已建立預覽圖: {target} ({bytes} bytes)");
                FileOutcome::Created {
                    target: target.clone(),
                    bytes,
                    placeholders,
                }
            }
            Err(e) => FileOutcome::Failed(e),
        }
    }

    /// 產生編碼後的輸出內容與佔位格子數
    fn render(&self, video: &Path) -> MontageResult<(Vec<u8>, usize)> {
        // Stage A: 讀取影片資訊
        let metadata = self.backend.probe(video)?;
        debug!(
            "{}: {:.2}s, {}x{}, {:.2} fps",
            video.display(),
            metadata.duration_seconds,
            metadata.width,
            metadata.height,
            metadata.frame_rate
        );

        // Stage B: 網格與時間點
        let (columns, rows) = if self.config.auto_grid {
            grid_for_duration(&self.config.duration_grid_rules, metadata.duration_seconds)
                .unwrap_or((self.config.columns, self.config.rows))
        } else {
            (self.config.columns, self.config.rows)
        };
        let thumb_height = resolve_thumb_height(
            self.config.thumb_width,
            self.config.thumb_height,
            metadata.width,
            metadata.height,
        )?;
        let geometry = GridSpec::new(
            columns,
            rows,
            self.config.thumb_width,
            thumb_height,
            self.config.padding,
            self.config.margin,
            self.config.header_height,
        )?
        .geometry();

        let count = geometry.cell_count();
        let window = SampleWindow::new(
            metadata.duration_seconds,
            self.config.skip_start,
            self.config.skip_end,
        )?;
        let mut timestamps = window.spread(count)?;
        snap_to_frames(
            &mut timestamps,
            metadata.frame_rate,
            window,
            metadata.duration_seconds,
        );
        debug!("{columns}x{rows} 網格，{count} 個時間點: {timestamps:?}");

        let target = ExtractionTarget {
            width: geometry.spec.thumb_width,
            height: geometry.spec.thumb_height,
            background: self.style.background,
            max_workers: self.config.max_workers,
        };

        // Stage C ~ E
        match self.config.format {
            OutputFormat::Jpg => {
                let frames = extract_frames(&self.backend, video, &timestamps, &target)?;
                let placeholders = frames.iter().filter(|f| f.failed).count();
                self.check_missing_frames(placeholders, count)?;

                let canvas = compose(geometry, &frames, &metadata, &self.style, &self.resources);
                Ok((encode_jpeg(&canvas, self.config.jpeg_quality)?, placeholders))
            }
            OutputFormat::Gif => {
                let settings = ClipSettings::from_config(&self.config, metadata.duration_seconds);
                let clips = extract_clips(&self.backend, video, &timestamps, &settings, &target)?;
                let placeholders = clips.iter().filter(|c| c.failed).count();
                self.check_missing_frames(placeholders, count)?;

                let cells: Vec<CellState> = clips
                    .iter()
                    .map(|c| CellState {
                        timestamp: c.timestamp,
                        failed: c.failed,
                    })
                    .collect();
                let composer =
                    MontageComposer::new(geometry, &metadata, &cells, &self.style, &self.resources);
                let canvases = animate(&composer, &clips, settings.frames_per_clip(), &target);

                let options = GifOptions::from_config(&self.config);
                Ok((encode_gif(&canvases, &options)?, placeholders))
            }
        }
    }

    fn check_missing_frames(&self, placeholders: usize, count: usize) -> MontageResult<()> {
        if placeholders > 0 && self.config.missing_frames == MissingFramePolicy::Error {
            return Err(MontageError::Input(format!(
                "{placeholders} / {count} 個格子無法解碼"
            )));
        }
        Ok(())
    }

    /// 狀態訊息；輸出到標準輸出時改寫到 stderr，避免混入影像資料
    fn say(&self, progress: Option<&ProgressBar>, line: String) {
        if self.config.quiet {
            return;
        }
        match progress {
            Some(bar) => bar.println(line),
            None if self.config.writes_to_stdout() => eprintln!("{line}"),
            None => println!("{line}"),
        }
    }
}

/// 每張輸出影格都是完整的網格，較短的片段停在最後一張
fn animate(
    composer: &MontageComposer,
    clips: &[super::ExtractedClip],
    frames_per_clip: usize,
    target: &ExtractionTarget,
) -> Vec<RgbImage> {
    let blank = RgbImage::from_pixel(target.width, target.height, target.background);
    (0..frames_per_clip)
        .map(|n| {
            let images: Vec<&RgbImage> = clips
                .iter()
                .map(|clip| clip.frame_at(n).unwrap_or(&blank))
                .collect();
            composer.compose_frame(&images)
        })
        .collect()
}

fn write_output(target: &OutputTarget, bytes: &[u8]) -> MontageResult<()> {
    match target {
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| MontageError::Output(format!("無法寫入標準輸出: {e}")))
        }
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent() {
                ensure_directory_exists(parent)?;
            }
            fs::write(path, bytes)
                .map_err(|e| MontageError::Output(format!("無法寫入 {}: {e}", path.display())))
        }
    }
}
