//! 影片預覽圖生成元件
//!
//! 每個檔案的處理流程：
//! 選取時間點 -> 平行擷取影格 -> 計算版面 -> 合成畫布 -> 編碼輸出

mod clip_extractor;
mod compositor;
mod encoder;
mod frame_extractor;
mod frame_selector;
mod layout;
mod main;
mod output_naming;

pub use clip_extractor::{ClipSettings, ExtractedClip, extract_clips};
pub use compositor::{
    CellState, MontageComposer, MontageStyle, RenderResources, compose, metadata_line1,
    metadata_line2, title_text,
};
pub use encoder::{GifOptions, encode_gif, encode_jpeg};
pub use frame_extractor::{ExtractedFrame, ExtractionTarget, extract_frames};
pub use frame_selector::{SampleWindow, grid_for_duration, select_timestamps, snap_to_frames};
pub use layout::{CanvasGeometry, CellRect, GridSpec, MAX_CANVAS_DIMENSION, resolve_thumb_height};
pub use main::{FileOutcome, FileReport, GenerationResult, MontageGenerator};
pub use output_naming::{
    OutputMode, OutputTarget, default_output_path, resolve_output, unique_filename,
};
