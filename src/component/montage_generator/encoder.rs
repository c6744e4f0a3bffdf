//! JPG 與動態 GIF 編碼

use crate::config::{COLORS_MAX, COLORS_MIN, MontageConfig};
use crate::error::{MontageError, MontageResult};
use color_quant::NeuQuant;
use gif::{DisposalMethod, Encoder, Frame, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, ColorMap};
use image::{Rgb, RgbImage};
use log::debug;
use rayon::prelude::*;
use std::borrow::Cow;

/// 建立調色盤時最多取樣的像素數
const PALETTE_SAMPLE_PIXELS: usize = 512 * 1024;
/// NeuQuant 取樣係數（1 最精確，30 最快）
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

/// 將畫布編碼為 baseline JPEG
pub fn encode_jpeg(canvas: &RgbImage, quality: u8) -> MontageResult<Vec<u8>> {
    if canvas.width() == 0 || canvas.height() == 0 {
        return Err(MontageError::Encoding("畫布尺寸為 0，無法編碼".to_string()));
    }

    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    encoder
        .encode_image(canvas)
        .map_err(|e| MontageError::Encoding(format!("JPEG 編碼失敗: {e}")))?;

    debug!(
        "JPEG 編碼完成: {}x{}, 品質 {quality}, {} bytes",
        canvas.width(),
        canvas.height(),
        bytes.len()
    );
    Ok(bytes)
}

/// GIF 編碼選項
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    pub fps: u32,
    pub colors: u32,
    /// 0 代表無限循環
    pub loop_count: u16,
    pub optimize: bool,
    /// Floyd-Steinberg 抖色
    pub dither: bool,
}

impl GifOptions {
    #[must_use]
    pub const fn from_config(config: &MontageConfig) -> Self {
        Self {
            fps: config.fps,
            colors: config.colors,
            loop_count: config.loop_count,
            optimize: config.optimize,
            dither: config.dither,
        }
    }

    /// 每張影格的延遲（1/100 秒），至少 1
    #[must_use]
    pub fn frame_delay(&self) -> u16 {
        let fps = f64::from(self.fps.max(1));
        ((100.0 / fps).round() as u16).max(1)
    }

    #[must_use]
    pub const fn repeat(&self) -> Repeat {
        match self.loop_count {
            0 => Repeat::Infinite,
            n => Repeat::Finite(n),
        }
    }

    #[must_use]
    pub fn palette_size(&self) -> usize {
        self.colors.clamp(COLORS_MIN, COLORS_MAX) as usize
    }
}

/// 將影格序列編碼為動態 GIF
///
/// 所有影格共用一組以 NeuQuant 訓練的全域調色盤
pub fn encode_gif(frames: &[RgbImage], options: &GifOptions) -> MontageResult<Vec<u8>> {
    let first = frames
        .first()
        .ok_or_else(|| MontageError::Encoding("沒有可編碼的影格".to_string()))?;
    let (width, height) = first.dimensions();
    if width == 0 || height == 0 {
        return Err(MontageError::Encoding("畫布尺寸為 0，無法編碼".to_string()));
    }
    if let Some(frame) = frames.iter().find(|f| f.dimensions() != (width, height)) {
        return Err(MontageError::Encoding(format!(
            "影格尺寸不一致: {}x{} 與 {width}x{height}",
            frame.width(),
            frame.height()
        )));
    }
    let (gif_width, gif_height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(MontageError::Encoding(format!(
                "畫布 {width}x{height} 超過 GIF 上限 65535x65535"
            )));
        }
    };

    let quantizer = train_palette(frames, options.palette_size());
    let palette = quantizer.color_map_rgb();
    let indexed: Vec<Vec<u8>> = if options.dither {
        let map = PaletteMap {
            quantizer: &quantizer,
            palette: &palette,
        };
        frames.par_iter().map(|f| dither_frame(&map, f)).collect()
    } else {
        frames.iter().map(|f| index_frame(&quantizer, f)).collect()
    };

    let mut bytes = Vec::new();
    let mut encoder = Encoder::new(&mut bytes, gif_width, gif_height, &palette).map_err(gif_error)?;
    encoder.set_repeat(options.repeat()).map_err(gif_error)?;

    let delay = options.frame_delay();
    let mut previous: Option<&[u8]> = None;
    for indices in &indexed {
        let frame = match previous {
            Some(prev) if options.optimize => delta_frame(prev, indices, width, height),
            _ => full_frame(indices, gif_width, gif_height),
        };
        let frame = Frame {
            delay,
            dispose: DisposalMethod::Keep,
            ..frame
        };
        encoder.write_frame(&frame).map_err(gif_error)?;
        previous = Some(indices);
    }
    encoder
        .into_inner()
        .map_err(|e| MontageError::Encoding(format!("GIF 寫入失敗: {e}")))?;

    debug!(
        "GIF 編碼完成: {width}x{height}, {} 張影格, {} 色, {} bytes",
        frames.len(),
        palette.len() / 3,
        bytes.len()
    );
    Ok(bytes)
}

fn gif_error(e: gif::EncodingError) -> MontageError {
    MontageError::Encoding(format!("GIF 編碼失敗: {e}"))
}

/// 從所有影格平均取樣像素訓練調色盤
fn train_palette(frames: &[RgbImage], colors: usize) -> NeuQuant {
    let total: usize = frames.iter().map(|f| f.as_raw().len() / 3).sum();
    let step = total.div_ceil(PALETTE_SAMPLE_PIXELS).max(1);

    let mut sample = Vec::with_capacity((total / step + 1) * 4);
    for (i, px) in frames
        .iter()
        .flat_map(|f| f.as_raw().chunks_exact(3))
        .enumerate()
    {
        if i % step == 0 {
            sample.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
    }

    NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, colors, &sample)
}

fn index_frame(quantizer: &NeuQuant, frame: &RgbImage) -> Vec<u8> {
    frame
        .as_raw()
        .par_chunks_exact(3)
        .map(|px| quantizer.index_of(&[px[0], px[1], px[2], 255]) as u8)
        .collect()
}

/// 以訓練好的調色盤作為 `image` 的色彩對應表
struct PaletteMap<'a> {
    quantizer: &'a NeuQuant,
    palette: &'a [u8],
}

impl ColorMap for PaletteMap<'_> {
    type Color = Rgb<u8>;

    fn index_of(&self, color: &Rgb<u8>) -> usize {
        let [r, g, b] = color.0;
        self.quantizer.index_of(&[r, g, b, 255])
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        let i = self.index_of(color) * 3;
        if let Some(c) = self.palette.get(i..i + 3) {
            *color = Rgb([c[0], c[1], c[2]]);
        }
    }
}

fn dither_frame(map: &PaletteMap<'_>, frame: &RgbImage) -> Vec<u8> {
    let mut work = frame.clone();
    imageops::dither(&mut work, map);
    imageops::index_colors(&work, map).into_raw()
}

fn full_frame(indices: &[u8], width: u16, height: u16) -> Frame<'static> {
    Frame {
        width,
        height,
        buffer: Cow::Owned(indices.to_vec()),
        ..Frame::default()
    }
}

/// 只寫出與前一張不同的最小矩形，完全相同時寫出 1x1
fn delta_frame(previous: &[u8], current: &[u8], width: u32, height: u32) -> Frame<'static> {
    let Some((left, top, right, bottom)) = changed_bounds(previous, current, width, height) else {
        return Frame {
            width: 1,
            height: 1,
            buffer: Cow::Owned(vec![current[0]]),
            ..Frame::default()
        };
    };

    let w = (right - left + 1) as usize;
    let mut buffer = Vec::with_capacity(w * (bottom - top + 1) as usize);
    for y in top..=bottom {
        let start = (y * width + left) as usize;
        buffer.extend_from_slice(&current[start..start + w]);
    }

    Frame {
        left: left as u16,
        top: top as u16,
        width: w as u16,
        height: (bottom - top + 1) as u16,
        buffer: Cow::Owned(buffer),
        ..Frame::default()
    }
}

/// 變動像素的包圍框 `(left, top, right, bottom)`（含端點）
fn changed_bounds(previous: &[u8], current: &[u8], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let row_len = width as usize;
    let mut bounds: Option<(u32, u32, u32, u32)> = None;

    for y in 0..height {
        let start = y as usize * row_len;
        let prev_row = &previous[start..start + row_len];
        let cur_row = &current[start..start + row_len];
        let Some(first) = prev_row.iter().zip(cur_row).position(|(a, b)| a != b) else {
            continue;
        };
        let last = prev_row
            .iter()
            .zip(cur_row)
            .rposition(|(a, b)| a != b)
            .unwrap_or(first);

        let (first, last) = (first as u32, last as u32);
        bounds = Some(match bounds {
            None => (first, y, last, y),
            Some((l, t, r, _)) => (l.min(first), t, r.max(last), y),
        });
    }

    bounds
}
