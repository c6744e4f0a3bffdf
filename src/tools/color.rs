use crate::error::{MontageError, MontageResult};
use image::Rgb;
use regex::Regex;
use std::sync::LazyLock;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$")
        .expect("hex color pattern is valid")
});

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0x00, 0x00, 0x00]),
    ("white", [0xFF, 0xFF, 0xFF]),
    ("red", [0xFF, 0x00, 0x00]),
    ("lime", [0x00, 0xFF, 0x00]),
    ("green", [0x00, 0x80, 0x00]),
    ("blue", [0x00, 0x00, 0xFF]),
    ("yellow", [0xFF, 0xFF, 0x00]),
    ("cyan", [0x00, 0xFF, 0xFF]),
    ("magenta", [0xFF, 0x00, 0xFF]),
    ("silver", [0xC0, 0xC0, 0xC0]),
    ("gray", [0x80, 0x80, 0x80]),
    ("grey", [0x80, 0x80, 0x80]),
    ("maroon", [0x80, 0x00, 0x00]),
    ("olive", [0x80, 0x80, 0x00]),
    ("purple", [0x80, 0x00, 0x80]),
    ("teal", [0x00, 0x80, 0x80]),
    ("navy", [0x00, 0x00, 0x80]),
    ("darkgray", [0xA9, 0xA9, 0xA9]),
    ("darkgrey", [0xA9, 0xA9, 0xA9]),
    ("lightgray", [0xD3, 0xD3, 0xD3]),
    ("lightgrey", [0xD3, 0xD3, 0xD3]),
];

/// 解析顏色字串
///
/// 支援 `#RRGGBB`、`RRGGBB` 以及常見的顏色名稱（不分大小寫）
pub fn parse_color(value: &str) -> MontageResult<Rgb<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MontageError::Config("顏色字串不可為空".to_string()));
    }

    let lower = trimmed.to_lowercase();
    if let Some((_, rgb)) = NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
        return Ok(Rgb(*rgb));
    }

    let caps = HEX_COLOR.captures(trimmed).ok_or_else(|| {
        MontageError::Config(format!(
            "無效的顏色格式: {value}（應為 #RRGGBB、RRGGBB 或顏色名稱）"
        ))
    })?;

    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).unwrap_or(0);
    Ok(Rgb([channel(1), channel(2), channel(3)]))
}

/// 轉為 ffmpeg 濾鏡可用的色碼（`0xRRGGBB`）
#[must_use]
pub fn ffmpeg_color(color: Rgb<u8>) -> String {
    format!("0x{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_color() {
        assert_eq!(parse_color("white").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_color("Navy").unwrap(), Rgb([0, 0, 128]));
        assert_eq!(parse_color(" grey ").unwrap(), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_color("#222222").unwrap(), Rgb([0x22, 0x22, 0x22]));
        assert_eq!(parse_color("ff8000").unwrap(), Rgb([255, 128, 0]));
        assert_eq!(parse_color("#AbCdEf").unwrap(), Rgb([0xAB, 0xCD, 0xEF]));
    }

    #[test]
    fn test_parse_invalid_color() {
        assert!(parse_color("").is_err());
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#GGGGGG").is_err());
        assert!(parse_color("not-a-color").is_err());
    }

    #[test]
    fn test_ffmpeg_color() {
        assert_eq!(ffmpeg_color(Rgb([0x22, 0x22, 0x22])), "0x222222");
        assert_eq!(ffmpeg_color(Rgb([255, 0, 16])), "0xFF0010");
    }
}
