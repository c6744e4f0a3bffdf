use crate::error::{MontageError, MontageResult};
use crate::tools::{FrameRequest, MediaBackend};
use image::{Rgb, RgbImage};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::Path;

/// 擷取結果：成功的影格，或以純色填滿的佔位影格（`failed = true`）
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    pub index: usize,
    pub timestamp: f64,
    pub image: RgbImage,
    pub failed: bool,
}

impl ExtractedFrame {
    #[must_use]
    pub fn placeholder(index: usize, timestamp: f64, width: u32, height: u32, fill: Rgb<u8>) -> Self {
        Self {
            index,
            timestamp,
            image: RgbImage::from_pixel(width, height, fill),
            failed: true,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 擷取目標尺寸與背景色
#[derive(Debug, Clone, Copy)]
pub struct ExtractionTarget {
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
    pub max_workers: usize,
}

/// 建立固定大小的工作執行緒池
pub(crate) fn build_worker_pool(max_workers: usize) -> MontageResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers.max(1))
        .thread_name(|i| format!("montage-worker-{i}"))
        .build()
        .map_err(|e| MontageError::Config(format!("無法建立工作執行緒池: {e}")))
}

/// 平行擷取多張影格
///
/// 每個時間點使用獨立的解碼程序；結果依輸入順序寫入預先配置的陣列，
/// 與完成順序無關。單一時間點失敗只會產生佔位影格。
pub fn extract_frames(
    backend: &dyn MediaBackend,
    source: &Path,
    timestamps: &[f64],
    target: &ExtractionTarget,
) -> MontageResult<Vec<ExtractedFrame>> {
    let pool = build_worker_pool(target.max_workers.min(timestamps.len().max(1)))?;

    let mut frames = Vec::with_capacity(timestamps.len());
    pool.install(|| {
        timestamps
            .par_iter()
            .enumerate()
            .map(|(index, &timestamp)| extract_single(backend, source, index, timestamp, target))
            .collect_into_vec(&mut frames);
    });

    let failed: Vec<usize> = frames.iter().filter(|f| f.failed).map(|f| f.index).collect();
    if failed.is_empty() {
        debug!("擷取完成: {} 張影格", frames.len());
    } else {
        warn!(
            "{}: {} / {} 張影格擷取失敗，已使用佔位影格",
            source.display(),
            failed.len(),
            frames.len()
        );
    }

    Ok(frames)
}

fn extract_single(
    backend: &dyn MediaBackend,
    source: &Path,
    index: usize,
    timestamp: f64,
    target: &ExtractionTarget,
) -> ExtractedFrame {
    let request = FrameRequest {
        timestamp,
        width: target.width,
        height: target.height,
        background: target.background,
    };

    match backend
        .decode_frame(source, &request)
        .and_then(|image| ensure_size(image, target.width, target.height))
    {
        Ok(image) => ExtractedFrame {
            index,
            timestamp,
            image,
            failed: false,
        },
        Err(e) => {
            debug!("影格 [{index}] @ {timestamp:.2}s 擷取失敗，改用佔位影格: {e}");
            ExtractedFrame::placeholder(index, timestamp, target.width, target.height, target.background)
        }
    }
}

/// 解碼結果尺寸必須與格子完全相同
pub(crate) fn ensure_size(image: RgbImage, width: u32, height: u32) -> MontageResult<RgbImage> {
    if image.dimensions() == (width, height) {
        Ok(image)
    } else {
        Err(MontageError::Decode(format!(
            "影格尺寸 {}x{} 與目標 {width}x{height} 不符",
            image.width(),
            image.height()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ClipRequest, VideoMetadata};
    use std::time::Duration;

    /// 依時間點產生純色影格；指定的時間點會失敗，較早的時間點刻意延遲完成
    struct FakeBackend {
        fail_at: Vec<f64>,
    }

    impl MediaBackend for FakeBackend {
        fn probe(&self, _path: &Path) -> MontageResult<VideoMetadata> {
            unreachable!()
        }

        fn decode_frame(&self, _path: &Path, request: &FrameRequest) -> MontageResult<RgbImage> {
            if self.fail_at.iter().any(|t| (t - request.timestamp).abs() < 1e-9) {
                return Err(MontageError::Decode("boom".to_string()));
            }
            // 越早的時間點越晚完成，用來驗證結果不依完成順序排列
            std::thread::sleep(Duration::from_millis((100.0 - request.timestamp).max(0.0) as u64));
            let shade = request.timestamp as u8;
            Ok(RgbImage::from_pixel(
                request.width,
                request.height,
                Rgb([shade, shade, shade]),
            ))
        }

        fn decode_clip(&self, _path: &Path, _request: &ClipRequest) -> MontageResult<Vec<RgbImage>> {
            unreachable!()
        }
    }

    fn target() -> ExtractionTarget {
        ExtractionTarget {
            width: 8,
            height: 6,
            background: Rgb([1, 2, 3]),
            max_workers: 4,
        }
    }

    #[test]
    fn test_results_follow_input_order() {
        let backend = FakeBackend { fail_at: vec![] };
        let timestamps: Vec<f64> = (0..12).map(|i| f64::from(i) * 5.0).collect();

        let frames = extract_frames(&backend, Path::new("a.mp4"), &timestamps, &target()).unwrap();

        assert_eq!(frames.len(), 12);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index, i);
            assert!((frame.timestamp - timestamps[i]).abs() < 1e-9);
            assert!(!frame.failed);
            let shade = timestamps[i] as u8;
            assert_eq!(frame.image.get_pixel(0, 0), &Rgb([shade, shade, shade]));
        }
    }

    #[test]
    fn test_failure_isolated_to_placeholder() {
        let backend = FakeBackend {
            fail_at: vec![10.0, 30.0],
        };
        let timestamps = vec![0.0, 10.0, 20.0, 30.0];

        let frames = extract_frames(&backend, Path::new("a.mp4"), &timestamps, &target()).unwrap();

        let failed: Vec<bool> = frames.iter().map(|f| f.failed).collect();
        assert_eq!(failed, vec![false, true, false, true]);
        assert_eq!(frames[1].image.get_pixel(3, 3), &Rgb([1, 2, 3]));
        assert_eq!((frames[1].width(), frames[1].height()), (8, 6));
    }

    #[test]
    fn test_wrong_size_becomes_placeholder() {
        struct WrongSize;
        impl MediaBackend for WrongSize {
            fn probe(&self, _path: &Path) -> MontageResult<VideoMetadata> {
                unreachable!()
            }
            fn decode_frame(&self, _path: &Path, _r: &FrameRequest) -> MontageResult<RgbImage> {
                Ok(RgbImage::new(2, 2))
            }
            fn decode_clip(&self, _path: &Path, _r: &ClipRequest) -> MontageResult<Vec<RgbImage>> {
                unreachable!()
            }
        }

        let frames = extract_frames(&WrongSize, Path::new("a.mp4"), &[1.0], &target()).unwrap();
        assert!(frames[0].failed);
    }

    #[test]
    fn test_empty_timestamps() {
        let backend = FakeBackend { fail_at: vec![] };
        let frames = extract_frames(&backend, Path::new("a.mp4"), &[], &target()).unwrap();
        assert!(frames.is_empty());
    }
}
