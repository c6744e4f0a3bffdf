//! 輸出路徑決定

use crate::config::OutputFormat;
use std::path::{Path, PathBuf};

/// 檔名的位元組上限
const MAX_FILENAME_BYTES: usize = 255;

/// 單一檔案的輸出目的地
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl std::fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdout => write!(f, "<stdout>"),
        }
    }
}

/// `output` 設定的解讀結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// 未指定：輸出到影片旁邊
    NextToSource,
    Stdout,
    /// 已存在的資料夾，或不存在且沒有副檔名的路徑
    Directory(PathBuf),
    File(PathBuf),
}

impl OutputMode {
    #[must_use]
    pub fn from_setting(output: Option<&Path>) -> Self {
        match output {
            None => Self::NextToSource,
            Some(path) if path == Path::new("-") => Self::Stdout,
            Some(path) if looks_like_directory(path) => Self::Directory(path.to_path_buf()),
            Some(path) => Self::File(path.to_path_buf()),
        }
    }
}

fn looks_like_directory(path: &Path) -> bool {
    if path.exists() {
        path.is_dir()
    } else {
        path.extension().is_none()
    }
}

fn file_stem(video: &Path) -> String {
    video
        .file_stem()
        .map_or_else(|| "video".to_string(), |s| s.to_string_lossy().to_string())
}

/// `<影片所在資料夾>/<檔名>_montage.<副檔名>`
#[must_use]
pub fn default_output_path(video: &Path, format: OutputFormat) -> PathBuf {
    let name = format!("{}_montage.{}", file_stem(video), format.extension());
    video.parent().map_or_else(|| PathBuf::from(&name), |dir| dir.join(&name))
}

/// 依影片相對於輸入根目錄的路徑產生不重複的檔名
///
/// `a/b/clip.mp4` 會變成 `a_b_clip_montage.jpg`；超過 255 bytes 時從最上層資料夾開始捨棄。
#[must_use]
pub fn unique_filename(video: &Path, input_root: &Path, format: OutputFormat) -> String {
    let suffix = format!("_montage.{}", format.extension());
    let stem = file_stem(video);

    let dirs: Vec<String> = video
        .strip_prefix(input_root)
        .ok()
        .and_then(Path::parent)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .filter(|part| !part.is_empty() && part != ".")
                .collect()
        })
        .unwrap_or_default();

    let build = |dirs: &[String], stem: &str| {
        if dirs.is_empty() {
            format!("{stem}{suffix}")
        } else {
            format!("{}_{stem}{suffix}", dirs.join("_"))
        }
    };

    let mut kept = dirs.as_slice();
    let mut name = build(kept, &stem);
    while name.len() > MAX_FILENAME_BYTES && !kept.is_empty() {
        kept = &kept[1..];
        name = build(kept, &stem);
    }

    if name.len() > MAX_FILENAME_BYTES {
        let available = MAX_FILENAME_BYTES.saturating_sub(suffix.len());
        name = build(&[], truncate_to_bytes(&stem, available));
    }
    name
}

fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// 決定單一影片的輸出目的地
///
/// `input_root` 為 `Some` 代表批次模式。批次模式不支援標準輸出與單一檔案路徑，
/// 兩者都改為輸出到影片旁邊（警告由呼叫端統一輸出一次）。
#[must_use]
pub fn resolve_output(
    mode: &OutputMode,
    video: &Path,
    input_root: Option<&Path>,
    format: OutputFormat,
) -> OutputTarget {
    match (mode, input_root) {
        (OutputMode::Stdout, None) => OutputTarget::Stdout,
        (OutputMode::File(path), None) => OutputTarget::File(path.clone()),
        (OutputMode::Directory(dir), None) => OutputTarget::File(dir.join(format!(
            "{}_montage.{}",
            file_stem(video),
            format.extension()
        ))),
        (OutputMode::Directory(dir), Some(root)) => {
            OutputTarget::File(dir.join(unique_filename(video, root, format)))
        }
        _ => OutputTarget::File(default_output_path(video, format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/v/a.mp4"), OutputFormat::Jpg),
            PathBuf::from("/v/a_montage.jpg")
        );
        assert_eq!(
            default_output_path(Path::new("/v/a.b.mkv"), OutputFormat::Gif),
            PathBuf::from("/v/a.b_montage.gif")
        );
    }

    #[test]
    fn test_unique_filename() {
        let root = Path::new("/in");
        assert_eq!(
            unique_filename(Path::new("/in/a/b/clip.mp4"), root, OutputFormat::Jpg),
            "a_b_clip_montage.jpg"
        );
        assert_eq!(
            unique_filename(Path::new("/in/clip.mp4"), root, OutputFormat::Gif),
            "clip_montage.gif"
        );
        // 不在根目錄下
        assert_eq!(
            unique_filename(Path::new("/other/x/clip.mp4"), root, OutputFormat::Jpg),
            "clip_montage.jpg"
        );
    }

    #[test]
    fn test_unique_filename_drops_leading_dirs() {
        let root = Path::new("/in");
        let long_a = "a".repeat(120);
        let long_b = "b".repeat(120);
        let video = root.join(&long_a).join(&long_b).join("clip.mp4");

        let name = unique_filename(&video, root, OutputFormat::Jpg);
        assert!(name.len() <= 255);
        assert_eq!(name, format!("{long_b}_clip_montage.jpg"));
    }

    #[test]
    fn test_unique_filename_truncates_stem() {
        let root = Path::new("/in");
        let stem = "影".repeat(100); // 300 bytes
        let video = root.join(format!("{stem}.mp4"));

        let name = unique_filename(&video, root, OutputFormat::Jpg);
        assert!(name.len() <= 255);
        assert!(name.ends_with("_montage.jpg"));
    }

    #[test]
    fn test_output_mode() {
        assert_eq!(OutputMode::from_setting(None), OutputMode::NextToSource);
        assert_eq!(OutputMode::from_setting(Some(Path::new("-"))), OutputMode::Stdout);
        assert_eq!(
            OutputMode::from_setting(Some(Path::new("/no/such/dir"))),
            OutputMode::Directory(PathBuf::from("/no/such/dir"))
        );
        assert_eq!(
            OutputMode::from_setting(Some(Path::new("/no/such/out.jpg"))),
            OutputMode::File(PathBuf::from("/no/such/out.jpg"))
        );

        let dir = tempfile::tempdir().unwrap();
        let with_dot = dir.path().join("shots.v1");
        std::fs::create_dir(&with_dot).unwrap();
        assert_eq!(
            OutputMode::from_setting(Some(&with_dot)),
            OutputMode::Directory(with_dot.clone())
        );
    }

    #[test]
    fn test_resolve_output() {
        let video = Path::new("/in/sub/clip.mp4");
        let root = Some(Path::new("/in"));
        let jpg = OutputFormat::Jpg;

        assert_eq!(
            resolve_output(&OutputMode::Stdout, video, None, jpg),
            OutputTarget::Stdout
        );
        assert_eq!(
            resolve_output(&OutputMode::Stdout, video, root, jpg),
            OutputTarget::File(PathBuf::from("/in/sub/clip_montage.jpg"))
        );
        assert_eq!(
            resolve_output(&OutputMode::File("/o/x.jpg".into()), video, root, jpg),
            OutputTarget::File(PathBuf::from("/in/sub/clip_montage.jpg"))
        );
        assert_eq!(
            resolve_output(&OutputMode::Directory("/o".into()), video, None, jpg),
            OutputTarget::File(PathBuf::from("/o/clip_montage.jpg"))
        );
        assert_eq!(
            resolve_output(&OutputMode::Directory("/o".into()), video, root, jpg),
            OutputTarget::File(PathBuf::from("/o/sub_clip_montage.jpg"))
        );
    }
}
