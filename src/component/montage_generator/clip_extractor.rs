//! GIF 模式的片段擷取
//!
//! 每個格子對應一段取樣時間點附近的片段，各自以獨立的解碼程序取得。
//! 預設以取樣點為中心；設定前後偏移時片段可以不對稱。

use super::frame_extractor::{ExtractionTarget, build_worker_pool, ensure_size};
use crate::config::MontageConfig;
use crate::error::MontageResult;
use crate::tools::{ClipRequest, MediaBackend};
use image::RgbImage;
use log::{debug, warn};
use rayon::prelude::*;
use std::path::Path;

/// 一個格子的片段
#[derive(Debug, Clone)]
pub struct ExtractedClip {
    pub index: usize,
    pub clip_start: f64,
    /// 取樣時間點
    pub timestamp: f64,
    pub frames: Vec<RgbImage>,
    pub failed: bool,
}

impl ExtractedClip {
    /// 取得第 `n` 張影格，片段較短時停留在最後一張
    #[must_use]
    pub fn frame_at(&self, n: usize) -> Option<&RgbImage> {
        self.frames.get(n).or_else(|| self.frames.last())
    }
}

/// 片段設定
///
/// 片段範圍為 `[t + start_offset, t + end_offset]`，`t` 為取樣時間點
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSettings {
    pub start_offset: f64,
    pub end_offset: f64,
    pub fps: u32,
    /// 影片總長度，片段會被移到 `[0, duration]` 之內
    pub duration: f64,
}

impl ClipSettings {
    /// 以取樣時間點為中心、長度 `clip_duration` 的片段
    #[must_use]
    pub fn centered(clip_duration: f64, fps: u32, duration: f64) -> Self {
        Self {
            start_offset: -clip_duration / 2.0,
            end_offset: clip_duration / 2.0,
            fps,
            duration,
        }
    }

    #[must_use]
    pub fn from_config(config: &MontageConfig, duration: f64) -> Self {
        let (start_offset, end_offset) = config.clip_offsets();
        Self {
            start_offset,
            end_offset,
            fps: config.fps,
            duration,
        }
    }

    #[must_use]
    pub fn clip_duration(&self) -> f64 {
        (self.end_offset - self.start_offset).max(0.0)
    }

    /// 每段片段的影格數：`max(1, round(clip_duration * fps))`
    #[must_use]
    pub fn frames_per_clip(&self) -> usize {
        ((self.clip_duration() * f64::from(self.fps)).round() as usize).max(1)
    }

    /// 取樣點 `center` 的片段區間 `(start, length)`
    ///
    /// 長度固定，超出影片範圍時整段平移回 `[0, duration]`
    #[must_use]
    pub fn window(&self, center: f64) -> (f64, f64) {
        let length = self.clip_duration().min(self.duration).max(0.0);
        let latest_start = (self.duration - length).max(0.0);
        let start = (center + self.start_offset).clamp(0.0, latest_start);
        (start, length)
    }
}

/// 平行擷取每個中心點的片段，結果依輸入順序排列
pub fn extract_clips(
    backend: &dyn MediaBackend,
    source: &Path,
    centers: &[f64],
    settings: &ClipSettings,
    target: &ExtractionTarget,
) -> MontageResult<Vec<ExtractedClip>> {
    let pool = build_worker_pool(target.max_workers.min(centers.len().max(1)))?;

    let mut clips = Vec::with_capacity(centers.len());
    pool.install(|| {
        centers
            .par_iter()
            .enumerate()
            .map(|(index, &center)| extract_single_clip(backend, source, index, center, settings, target))
            .collect_into_vec(&mut clips);
    });

    let failed = clips.iter().filter(|c| c.failed).count();
    if failed > 0 {
        warn!(
            "{}: {failed} / {} 段片段擷取失敗，已使用佔位影格",
            source.display(),
            clips.len()
        );
    }

    Ok(clips)
}

fn extract_single_clip(
    backend: &dyn MediaBackend,
    source: &Path,
    index: usize,
    center: f64,
    settings: &ClipSettings,
    target: &ExtractionTarget,
) -> ExtractedClip {
    let (start, length) = settings.window(center);
    let max_frames = settings.frames_per_clip();
    let request = ClipRequest {
        start,
        duration: length,
        fps: settings.fps,
        max_frames,
        width: target.width,
        height: target.height,
        background: target.background,
    };

    let decoded = backend.decode_clip(source, &request).and_then(|frames| {
        frames
            .into_iter()
            .take(max_frames)
            .map(|frame| ensure_size(frame, target.width, target.height))
            .collect::<MontageResult<Vec<_>>>()
    });

    match decoded {
        Ok(frames) if !frames.is_empty() => ExtractedClip {
            index,
            clip_start: start,
            timestamp: center,
            frames,
            failed: false,
        },
        Ok(_) => {
            debug!("片段 [{index}] @ {start:.2}s 沒有影格，改用佔位影格");
            placeholder_clip(index, start, center, target)
        }
        Err(e) => {
            debug!("片段 [{index}] @ {start:.2}s 擷取失敗，改用佔位影格: {e}");
            placeholder_clip(index, start, center, target)
        }
    }
}

fn placeholder_clip(index: usize, start: f64, center: f64, target: &ExtractionTarget) -> ExtractedClip {
    ExtractedClip {
        index,
        clip_start: start,
        timestamp: center,
        frames: vec![RgbImage::from_pixel(target.width, target.height, target.background)],
        failed: true,
    }
}
