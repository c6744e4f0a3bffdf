//! 畫布合成
//!
//! 背景與標題列只繪製一次；每個格子的時間標籤預先渲染成透明樣板，
//! 之後每張輸出影格只需複製縮圖並混合樣板。

use super::layout::CanvasGeometry;
use crate::config::MontageConfig;
use crate::error::{MontageError, MontageResult};
use crate::tools::{VideoMetadata, format_bitrate, format_duration, format_megabytes, parse_color};
use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use log::debug;
use rayon::prelude::*;
use std::path::Path;

const TITLE_MAX_SIZE: f32 = 40.0;
const TITLE_MIN_SIZE: f32 = 10.0;
const TITLE_STEP: f32 = 2.0;
/// 標題寬度上限（畫布寬度比例）
const TITLE_MAX_WIDTH_RATIO: f32 = 0.9;
const TITLE_CENTER_Y: i32 = 30;
const TITLE_SHADOW: i32 = 2;

const META_SIZE: f32 = 20.0;
const META_CENTER_Y: [i32; 2] = [80, 105];
const META_SHADOW: i32 = 1;

const LABEL_SIZE: f32 = 18.0;
const LABEL_SHADOW: u32 = 1;
const LABEL_INSET_X: u32 = 10;
const LABEL_INSET_BOTTOM: u32 = 5;

/// 合成用的顏色與選項（已解析）
///
/// 標題、資訊列與時間標籤都使用 `font_color`（預設白色）搭配 `shadow_color` 陰影。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MontageStyle {
    pub font_color: Rgb<u8>,
    pub shadow_color: Rgb<u8>,
    pub background: Rgb<u8>,
    pub placeholder: Rgb<u8>,
    pub show_full_path: bool,
}

impl MontageStyle {
    pub fn from_config(config: &MontageConfig) -> MontageResult<Self> {
        let background = parse_color(&config.background_color)?;
        let placeholder = match &config.placeholder_color {
            Some(color) => parse_color(color)?,
            None => background,
        };

        Ok(Self {
            font_color: parse_color(&config.font_color)?,
            shadow_color: parse_color(&config.shadow_color)?,
            background,
            placeholder,
            show_full_path: config.show_full_path,
        })
    }
}

/// 整批共用的唯讀資源，只載入一次
pub struct RenderResources {
    font: Option<FontVec>,
}

impl RenderResources {
    /// 載入字型；未指定字型時停用所有文字繪製
    pub fn load(font_file: Option<&Path>) -> MontageResult<Self> {
        let Some(path) = font_file else {
            return Ok(Self::without_font());
        };

        let data = std::fs::read(path).map_err(|e| {
            MontageError::Config(format!("無法讀取字型檔 {}: {e}", path.display()))
        })?;
        let font = FontVec::try_from_vec(data).map_err(|e| {
            MontageError::Config(format!("無效的字型檔 {}: {e}", path.display()))
        })?;

        debug!("已載入字型: {}", path.display());
        Ok(Self { font: Some(font) })
    }

    #[must_use]
    pub const fn without_font() -> Self {
        Self { font: None }
    }

    #[must_use]
    pub const fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

impl std::fmt::Debug for RenderResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResources")
            .field("font", &self.font.is_some())
            .finish()
    }
}

/// 每個格子的狀態
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellState {
    pub timestamp: f64,
    pub failed: bool,
}

/// 預先渲染的時間標籤與其在格子內的位置
#[derive(Debug, Clone)]
struct LabelPlacement {
    template: RgbaImage,
    x: u32,
    y: u32,
}

/// 標題列顯示的檔名（或完整路徑）
#[must_use]
pub fn title_text(metadata: &VideoMetadata, show_full_path: bool) -> String {
    if show_full_path {
        let full = metadata
            .path
            .canonicalize()
            .or_else(|_| std::path::absolute(&metadata.path))
            .unwrap_or_else(|_| metadata.path.clone());
        return full.display().to_string();
    }

    metadata
        .path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| metadata.path.display().to_string())
}

/// `1920x1080 | 29.97 FPS | 4.20 Mbps`
#[must_use]
pub fn metadata_line1(metadata: &VideoMetadata) -> String {
    let fps = if metadata.frame_rate > 0.0 {
        format!("{:.2} FPS", metadata.frame_rate)
    } else {
        "N/A FPS".to_string()
    };
    format!(
        "{}x{} | {fps} | {}",
        metadata.width,
        metadata.height,
        format_bitrate(metadata.bit_rate)
    )
}

/// `00:10:00 | 300.00 MB | H264 / AAC`
#[must_use]
pub fn metadata_line2(metadata: &VideoMetadata) -> String {
    let mut codecs = metadata.video_codec.to_uppercase();
    if let Some(audio) = &metadata.audio_codec {
        codecs.push_str(" / ");
        codecs.push_str(&audio.to_uppercase());
    }
    format!(
        "{} | {} | {codecs}",
        format_duration(metadata.duration_seconds),
        format_megabytes(metadata.file_size)
    )
}

/// 由 40px 逐步縮小，直到標題寬度小於畫布寬度的 90%
fn fit_title_scale(font: &FontVec, text: &str, canvas_width: u32) -> PxScale {
    let limit = canvas_width as f32 * TITLE_MAX_WIDTH_RATIO;
    let mut size = TITLE_MAX_SIZE;
    while size > TITLE_MIN_SIZE {
        let (width, _) = text_size(PxScale::from(size), font, text);
        if (width as f32) < limit {
            return PxScale::from(size);
        }
        size -= TITLE_STEP;
    }
    PxScale::from(TITLE_MIN_SIZE)
}

/// 水平置中、垂直以 `center_y` 為中心繪製一行帶陰影的文字
#[allow(clippy::too_many_arguments)]
fn draw_centered_line(
    canvas: &mut RgbImage,
    font: &FontVec,
    scale: PxScale,
    text: &str,
    center_y: i32,
    shadow: i32,
    color: Rgb<u8>,
    shadow_color: Rgb<u8>,
) {
    let (width, height) = text_size(scale, font, text);
    let x = (canvas.width() as i32 - width as i32) / 2;
    let y = center_y - height as i32 / 2;
    draw_text_mut(canvas, shadow_color, x + shadow, y + shadow, scale, font, text);
    draw_text_mut(canvas, color, x, y, scale, font, text);
}

/// 繪製標題列
///
/// 標題列先畫在獨立的影像上再貼到畫布，文字不會超出標題區進入格子
fn render_header(
    width: u32,
    header_height: u32,
    font: &FontVec,
    metadata: &VideoMetadata,
    style: &MontageStyle,
) -> RgbImage {
    let mut header = RgbImage::from_pixel(width, header_height, style.background);

    let title = title_text(metadata, style.show_full_path);
    let title_scale = fit_title_scale(font, &title, width);
    draw_centered_line(
        &mut header,
        font,
        title_scale,
        &title,
        TITLE_CENTER_Y,
        TITLE_SHADOW,
        style.font_color,
        style.shadow_color,
    );

    let lines = [metadata_line1(metadata), metadata_line2(metadata)];
    for (line, center_y) in lines.iter().zip(META_CENTER_Y) {
        draw_centered_line(
            &mut header,
            font,
            PxScale::from(META_SIZE),
            line,
            center_y,
            META_SHADOW,
            style.font_color,
            style.shadow_color,
        );
    }

    header
}

/// 把文字渲染成透明樣板（文字疊在陰影上）
fn render_label_template(font: &FontVec, text: &str, style: &MontageStyle) -> RgbaImage {
    let scale = PxScale::from(LABEL_SIZE);
    let (text_width, text_height) = text_size(scale, font, text);
    // 多留幾個像素給陰影與字形下緣
    let width = text_width + LABEL_SHADOW + 2;
    let height = text_height + LABEL_SHADOW + 4;

    let mut text_mask = GrayImage::new(width, height);
    draw_text_mut(&mut text_mask, Luma([255]), 0, 0, scale, font, text);
    let mut shadow_mask = GrayImage::new(width, height);
    let offset = LABEL_SHADOW as i32;
    draw_text_mut(&mut shadow_mask, Luma([255]), offset, offset, scale, font, text);

    let fc = style.font_color.0;
    let sc = style.shadow_color.0;
    RgbaImage::from_fn(width, height, |x, y| {
        let at = f32::from(text_mask.get_pixel(x, y).0[0]) / 255.0;
        let as_ = f32::from(shadow_mask.get_pixel(x, y).0[0]) / 255.0;
        let alpha = at + as_ * (1.0 - at);
        if alpha <= 0.0 {
            return Rgba([0, 0, 0, 0]);
        }
        let channel = |i: usize| {
            let value = (f32::from(fc[i]) * at + f32::from(sc[i]) * as_ * (1.0 - at)) / alpha;
            value.round().clamp(0.0, 255.0) as u8
        };
        Rgba([
            channel(0),
            channel(1),
            channel(2),
            (alpha * 255.0).round() as u8,
        ])
    })
}

/// 建立底圖與時間標籤樣板後，可重複合成多張影格
///
/// JPG 模式合成一次；GIF 模式每張輸出影格都重用同一份底圖與樣板。
#[derive(Debug)]
pub struct MontageComposer {
    geometry: CanvasGeometry,
    base: RgbImage,
    cells: Vec<CellState>,
    labels: Vec<Option<LabelPlacement>>,
    placeholder: Rgb<u8>,
}

impl MontageComposer {
    #[must_use]
    pub fn new(
        geometry: CanvasGeometry,
        metadata: &VideoMetadata,
        cells: &[CellState],
        style: &MontageStyle,
        resources: &RenderResources,
    ) -> Self {
        let mut base = RgbImage::from_pixel(geometry.width, geometry.height, style.background);

        let header_height = geometry.spec.header_height;
        if let Some(font) = &resources.font
            && header_height > 0
        {
            let header = render_header(geometry.width, header_height, font, metadata, style);
            image::imageops::replace(&mut base, &header, 0, 0);
        }

        let mut cells: Vec<CellState> = cells.iter().take(geometry.cell_count()).copied().collect();
        let labels = cells
            .iter()
            .zip(&geometry.cells)
            .map(|(state, rect)| {
                let font = resources.font.as_ref()?;
                if state.failed {
                    return None;
                }
                let template = render_label_template(font, &format_duration(state.timestamp), style);
                let x = LABEL_INSET_X.min(rect.width.saturating_sub(1));
                let y = rect
                    .height
                    .saturating_sub(template.height() + LABEL_INSET_BOTTOM);
                Some(LabelPlacement { template, x, y })
            })
            .collect();

        // 沒有影格的格子視為佔位
        while cells.len() < geometry.cell_count() {
            cells.push(CellState {
                timestamp: 0.0,
                failed: true,
            });
        }

        let composer = Self {
            geometry,
            base,
            cells,
            labels,
            placeholder: style.placeholder,
        };
        let failed = composer.placeholder_cells();
        if !failed.is_empty() {
            debug!("佔位格子: {failed:?}");
        }
        composer
    }

    #[must_use]
    pub const fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }

    /// 佔位格子的索引
    #[must_use]
    pub fn placeholder_cells(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.failed)
            .map(|(i, _)| i)
            .collect()
    }

    /// 將每個格子的影像貼到底圖的複本上
    ///
    /// `images[i]` 對應第 i 個格子；佔位格子與缺少的影像一律填入佔位色
    #[must_use]
    pub fn compose_frame(&self, images: &[&RgbImage]) -> RgbImage {
        let mut canvas = self.base.clone();
        self.place_cells(&mut canvas, images);
        canvas
    }

    fn place_cells(&self, canvas: &mut RgbImage, images: &[&RgbImage]) {
        let spec = self.geometry.spec;
        let stride = canvas.width() as usize * 3;
        if stride == 0 {
            return;
        }
        let grid_top = self.geometry.grid_top();
        let pitch = spec.thumb_height + spec.padding;

        let buffer: &mut [u8] = canvas;
        buffer
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let Some(relative) = (y as u32).checked_sub(grid_top) else {
                    return;
                };
                let cell_row = relative / pitch;
                let within = relative % pitch;
                if cell_row >= spec.rows || within >= spec.thumb_height {
                    return;
                }

                for col in 0..spec.columns {
                    let index = (cell_row * spec.columns + col) as usize;
                    let rect = &self.geometry.cells[index];
                    let start = rect.x as usize * 3;
                    let dst = &mut row[start..start + rect.width as usize * 3];

                    let image = images.get(index).filter(|_| !self.cells[index].failed);
                    match image {
                        Some(image) if within < image.height() => {
                            copy_image_row(dst, image, within);
                            if let Some(Some(label)) = self.labels.get(index) {
                                blend_label_row(dst, label, within);
                            }
                        }
                        _ => fill_row(dst, self.placeholder),
                    }
                }
            });
    }
}

fn fill_row(dst: &mut [u8], color: Rgb<u8>) {
    for px in dst.chunks_exact_mut(3) {
        px.copy_from_slice(&color.0);
    }
}

fn copy_image_row(dst: &mut [u8], image: &RgbImage, y: u32) {
    let src_stride = image.width() as usize * 3;
    let src_start = y as usize * src_stride;
    let src = &image.as_raw()[src_start..src_start + src_stride];
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
}

fn blend_label_row(dst: &mut [u8], label: &LabelPlacement, y: u32) {
    let Some(ty) = y.checked_sub(label.y) else {
        return;
    };
    if ty >= label.template.height() {
        return;
    }

    let cell_width = (dst.len() / 3) as u32;
    for tx in 0..label.template.width() {
        let x = label.x + tx;
        if x >= cell_width {
            break;
        }
        let Rgba([r, g, b, a]) = *label.template.get_pixel(tx, ty);
        if a == 0 {
            continue;
        }
        let px = &mut dst[x as usize * 3..x as usize * 3 + 3];
        for (channel, src) in px.iter_mut().zip([r, g, b]) {
            let blended = (u32::from(src) * u32::from(a) + u32::from(*channel) * (255 - u32::from(a)) + 127) / 255;
            *channel = blended as u8;
        }
    }
}

/// 合成單張預覽圖（JPG 模式）
#[must_use]
pub fn compose(
    geometry: CanvasGeometry,
    frames: &[super::ExtractedFrame],
    metadata: &VideoMetadata,
    style: &MontageStyle,
    resources: &RenderResources,
) -> RgbImage {
    let cells: Vec<CellState> = frames
        .iter()
        .map(|f| CellState {
            timestamp: f.timestamp,
            failed: f.failed,
        })
        .collect();
    let composer = MontageComposer::new(geometry, metadata, &cells, style, resources);
    let images: Vec<&RgbImage> = frames.iter().map(|f| &f.image).collect();
    composer.compose_frame(&images)
}
