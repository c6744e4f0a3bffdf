use crate::config::types::{
    COLORS_MAX, COLORS_MIN, ConfigLayer, FileTypeTable, MontageConfig, OutputFormat,
};
use crate::error::{MontageError, MontageResult};
use crate::tools::parse_color;
use log::{debug, warn};
use std::fs;
use std::path::Path;

/// 編譯時嵌入的檔案類型設定（不需要外部檔案）
const FILE_TYPE_TABLE_JSON: &str = include_str!("../data/file_type_table.json");

impl FileTypeTable {
    /// 從編譯時嵌入的 JSON 載入檔案類型表
    pub fn embedded() -> MontageResult<Self> {
        serde_json::from_str(FILE_TYPE_TABLE_JSON)
            .map_err(|e| MontageError::Config(format!("無法解析嵌入的檔案類型設定: {e}")))
    }
}

impl ConfigLayer {
    /// 讀取 YAML 設定檔，未知的欄位會被忽略
    pub fn from_yaml_file(path: &Path) -> MontageResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MontageError::Config(format!("無法讀取設定檔 {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
            .map_err(|e| MontageError::Config(format!("無法解析設定檔 {}: {e}", path.display())))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // 空白檔案視為沒有任何設定
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// 以 `higher` 覆蓋目前的值（`higher` 有設定的欄位優先）
    #[must_use]
    pub fn merge(self, higher: Self) -> Self {
        Self {
            columns: higher.columns.or(self.columns),
            rows: higher.rows.or(self.rows),
            auto_grid: higher.auto_grid.or(self.auto_grid),
            duration_grid_rules: higher.duration_grid_rules.or(self.duration_grid_rules),
            thumb_width: higher.thumb_width.or(self.thumb_width),
            thumb_height: higher.thumb_height.or(self.thumb_height),
            padding: higher.padding.or(self.padding),
            margin: higher.margin.or(self.margin),
            header_height: higher.header_height.or(self.header_height),
            output: higher.output.or(self.output),
            overwrite: higher.overwrite.or(self.overwrite),
            recursive: higher.recursive.or(self.recursive),
            skip_start: higher.skip_start.or(self.skip_start),
            skip_end: higher.skip_end.or(self.skip_end),
            max_workers: higher.max_workers.or(self.max_workers),
            missing_frames: higher.missing_frames.or(self.missing_frames),
            font_file: higher.font_file.or(self.font_file),
            font_color: higher.font_color.or(self.font_color),
            shadow_color: higher.shadow_color.or(self.shadow_color),
            background_color: higher.background_color.or(self.background_color),
            placeholder_color: higher.placeholder_color.or(self.placeholder_color),
            show_full_path: higher.show_full_path.or(self.show_full_path),
            jpeg_quality: higher.jpeg_quality.or(self.jpeg_quality),
            clip_duration: higher.clip_duration.or(self.clip_duration),
            clip_start_offset: higher.clip_start_offset.or(self.clip_start_offset),
            clip_end_offset: higher.clip_end_offset.or(self.clip_end_offset),
            fps: higher.fps.or(self.fps),
            colors: higher.colors.or(self.colors),
            loop_count: higher.loop_count.or(self.loop_count),
            optimize: higher.optimize.or(self.optimize),
            dither: higher.dither.or(self.dither),
            quiet: higher.quiet.or(self.quiet),
            verbose: higher.verbose.or(self.verbose),
        }
    }
}

impl MontageConfig {
    /// 依「命令列 > 設定檔 > 預設值」建立設定並驗證
    pub fn resolve(
        format: OutputFormat,
        file_layer: Option<ConfigLayer>,
        cli_layer: ConfigLayer,
    ) -> MontageResult<Self> {
        let layer = file_layer.unwrap_or_default().merge(cli_layer);
        let mut config = Self::defaults(format);
        config.apply(layer);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, layer: ConfigLayer) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = layer.$field { self.$field = value; })*
            };
        }

        set!(
            columns,
            rows,
            auto_grid,
            duration_grid_rules,
            thumb_width,
            thumb_height,
            padding,
            margin,
            header_height,
            overwrite,
            recursive,
            skip_start,
            skip_end,
            max_workers,
            missing_frames,
            font_color,
            shadow_color,
            background_color,
            show_full_path,
            jpeg_quality,
            clip_duration,
            fps,
            colors,
            loop_count,
            optimize,
            dither,
            quiet,
            verbose,
        );

        // 空字串視為未設定
        self.output = layer
            .output
            .filter(|p| !p.as_os_str().is_empty())
            .or(self.output.take());
        self.font_file = layer
            .font_file
            .filter(|p| !p.as_os_str().is_empty())
            .or(self.font_file.take());
        if let Some(color) = layer.placeholder_color {
            self.placeholder_color = Some(color);
        }
        if let Some(offset) = layer.clip_start_offset {
            self.clip_start_offset = Some(offset);
        }
        if let Some(offset) = layer.clip_end_offset {
            self.clip_end_offset = Some(offset);
        }
    }

    /// 驗證所有欄位，`colors` 會被限制在 [2, 256]
    pub fn validate(&mut self) -> MontageResult<()> {
        if self.columns == 0 || self.rows == 0 {
            return Err(MontageError::Config(format!(
                "columns 與 rows 必須 >= 1（目前 {}x{}）",
                self.columns, self.rows
            )));
        }
        if self.thumb_width == 0 {
            return Err(MontageError::Config("thumb_width 必須 >= 1".to_string()));
        }
        if self.thumb_height == 0 || self.thumb_height < -1 {
            return Err(MontageError::Config(format!(
                "thumb_height 必須 >= 1 或 -1（自動），目前為 {}",
                self.thumb_height
            )));
        }

        validate_skip_percentages(self.skip_start, self.skip_end)?;

        if self.max_workers == 0 {
            return Err(MontageError::Config("max_workers 必須 >= 1".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MontageError::Config(format!(
                "jpeg_quality 必須介於 1-100，目前為 {}",
                self.jpeg_quality
            )));
        }
        if self.fps == 0 {
            return Err(MontageError::Config("fps 必須 >= 1".to_string()));
        }
        if !(self.clip_duration.is_finite() && self.clip_duration > 0.0) {
            return Err(MontageError::Config(format!(
                "clip_duration 必須大於 0，目前為 {}",
                self.clip_duration
            )));
        }

        let (start_offset, end_offset) = self.clip_offsets();
        if !(start_offset.is_finite() && end_offset.is_finite()) || end_offset <= start_offset {
            return Err(MontageError::Config(format!(
                "片段偏移無效: 起點 {start_offset} 必須小於終點 {end_offset}"
            )));
        }

        let clamped = self.colors.clamp(COLORS_MIN, COLORS_MAX);
        if clamped != self.colors {
            warn!("colors {} 超出範圍，已調整為 {clamped}", self.colors);
            self.colors = clamped;
        }

        if self.auto_grid {
            if self.duration_grid_rules.is_empty() {
                return Err(MontageError::Config(
                    "已啟用 auto_grid 但 duration_grid_rules 為空".to_string(),
                ));
            }
            if let Some(rule) = self
                .duration_grid_rules
                .iter()
                .find(|r| r.columns == 0 || r.rows == 0)
            {
                return Err(MontageError::Config(format!(
                    "自動網格規則的欄列數必須 >= 1: {}x{}",
                    rule.columns, rule.rows
                )));
            }
        }

        parse_color(&self.font_color)?;
        parse_color(&self.shadow_color)?;
        parse_color(&self.background_color)?;
        if let Some(color) = &self.placeholder_color {
            parse_color(color)?;
        }

        if let Some(font_file) = &self.font_file
            && !font_file.is_file()
        {
            return Err(MontageError::Config(format!(
                "字型檔不存在: {}",
                font_file.display()
            )));
        }

        debug!("設定驗證完成: {self:?}");
        Ok(())
    }
}

/// 檢查前後略過百分比，兩者相加必須小於 100
pub fn validate_skip_percentages(skip_start: f64, skip_end: f64) -> MontageResult<()> {
    let in_range = |v: f64| v.is_finite() && (0.0..100.0).contains(&v);
    if !in_range(skip_start) || !in_range(skip_end) {
        return Err(MontageError::Config(format!(
            "skip_start 與 skip_end 必須介於 0-100，目前為 {skip_start} / {skip_end}"
        )));
    }
    if skip_start + skip_end >= 100.0 {
        return Err(MontageError::Config(format!(
            "skip_start + skip_end 必須小於 100，目前為 {skip_start} + {skip_end}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::MissingFramePolicy;
    use std::path::PathBuf;

    #[test]
    fn test_embedded_file_type_table() {
        let table = FileTypeTable::embedded().unwrap();
        assert!(table.is_video_file(Path::new("/videos/a.MP4")));
        assert!(table.is_video_file(Path::new("clip.mkv")));
        assert!(!table.is_video_file(Path::new("notes.txt")));
        assert!(!table.is_video_file(Path::new("no_extension")));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MontageConfig::resolve(OutputFormat::Jpg, None, ConfigLayer::default())
            .unwrap();
        assert_eq!(config.columns, 4);
        assert_eq!(config.rows, 5);
        assert_eq!(config.thumb_height, -1);
        assert_eq!(config.jpeg_quality, 85);
        assert!(config.optimize);
        assert_eq!(config.missing_frames, MissingFramePolicy::Blank);
    }

    #[test]
    fn test_precedence_cli_over_file_over_default() {
        let file = ConfigLayer::from_yaml_str("columns: 6\nrows: 7\npadding: 9\n").unwrap();
        let cli = ConfigLayer {
            columns: Some(3),
            ..ConfigLayer::default()
        };
        let config = MontageConfig::resolve(OutputFormat::Jpg, Some(file), cli).unwrap();
        assert_eq!(config.columns, 3);
        assert_eq!(config.rows, 7);
        assert_eq!(config.padding, 9);
        assert_eq!(config.margin, 20);
    }

    #[test]
    fn test_yaml_aliases_and_unknown_keys() {
        let yaml = "skip_start_percent: 10\ngif_fps: 12\nloop: 3\nsomething_else: true\n";
        let layer = ConfigLayer::from_yaml_str(yaml).unwrap();
        assert_eq!(layer.skip_start, Some(10.0));
        assert_eq!(layer.fps, Some(12));
        assert_eq!(layer.loop_count, Some(3));
    }

    #[test]
    fn test_yaml_grid_rules() {
        let yaml = "auto_grid: true\nduration_grid_rules:\n  - {max_duration: 60, columns: 1, rows: 2}\n  - {max_duration: -1, columns: 6, rows: 6}\n";
        let layer = ConfigLayer::from_yaml_str(yaml).unwrap();
        let config = MontageConfig::resolve(OutputFormat::Gif, Some(layer), ConfigLayer::default())
            .unwrap();
        assert!(config.auto_grid);
        assert_eq!(config.duration_grid_rules.len(), 2);
        assert_eq!(config.duration_grid_rules[1].columns, 6);
    }

    #[test]
    fn test_clip_offsets_and_dither() {
        let yaml = "gif_clip_start_offset: -0.5\ngif_clip_end_offset: 1.5\ngif_dither: true\n";
        let layer = ConfigLayer::from_yaml_str(yaml).unwrap();
        let config = MontageConfig::resolve(OutputFormat::Gif, Some(layer), ConfigLayer::default())
            .unwrap();
        assert_eq!(config.clip_offsets(), (-0.5, 1.5));
        assert!(config.dither);

        // 只設定一端時，另一端由 clip_duration 推算
        let cli = ConfigLayer {
            clip_duration: Some(4.0),
            clip_end_offset: Some(0.5),
            ..ConfigLayer::default()
        };
        let config = MontageConfig::resolve(OutputFormat::Gif, None, cli).unwrap();
        assert_eq!(config.clip_offsets(), (-2.0, 0.5));
        assert!(!config.dither);
    }

    #[test]
    fn test_inverted_clip_offsets_rejected() {
        let cli = ConfigLayer {
            clip_start_offset: Some(1.0),
            clip_end_offset: Some(0.5),
            ..ConfigLayer::default()
        };
        let err = MontageConfig::resolve(OutputFormat::Gif, None, cli).unwrap_err();
        assert!(matches!(err, MontageError::Config(_)));
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(ConfigLayer::from_yaml_str("  \n").unwrap(), ConfigLayer::default());
    }

    #[test]
    fn test_skip_percentages_rejected() {
        let cli = ConfigLayer {
            skip_start: Some(60.0),
            skip_end: Some(40.0),
            ..ConfigLayer::default()
        };
        let err = MontageConfig::resolve(OutputFormat::Jpg, None, cli).unwrap_err();
        assert!(matches!(err, MontageError::Config(_)));
    }

    #[test]
    fn test_colors_clamped() {
        let low = ConfigLayer {
            colors: Some(1),
            ..ConfigLayer::default()
        };
        let high = ConfigLayer {
            colors: Some(1000),
            ..ConfigLayer::default()
        };
        assert_eq!(
            MontageConfig::resolve(OutputFormat::Gif, None, low).unwrap().colors,
            2
        );
        assert_eq!(
            MontageConfig::resolve(OutputFormat::Gif, None, high).unwrap().colors,
            256
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            ConfigLayer {
                jpeg_quality: Some(0),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                jpeg_quality: Some(101),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                columns: Some(0),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                thumb_height: Some(-5),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                max_workers: Some(0),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                background_color: Some("#12".to_string()),
                ..ConfigLayer::default()
            },
            ConfigLayer {
                font_file: Some(PathBuf::from("/definitely/missing/font.ttf")),
                ..ConfigLayer::default()
            },
        ];

        for cli in cases {
            let result = MontageConfig::resolve(OutputFormat::Jpg, None, cli.clone());
            assert!(
                matches!(result, Err(MontageError::Config(_))),
                "應該被拒絕: {cli:?}"
            );
        }
    }

    #[test]
    fn test_empty_output_is_unset() {
        let cli = ConfigLayer {
            output: Some(PathBuf::new()),
            ..ConfigLayer::default()
        };
        let config = MontageConfig::resolve(OutputFormat::Jpg, None, cli).unwrap();
        assert!(config.output.is_none());
    }

    #[test]
    fn test_stdout_output() {
        let cli = ConfigLayer {
            output: Some(PathBuf::from("-")),
            ..ConfigLayer::default()
        };
        let config = MontageConfig::resolve(OutputFormat::Jpg, None, cli).unwrap();
        assert!(config.writes_to_stdout());
    }
}
