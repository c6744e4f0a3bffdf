use crate::config::FileTypeTable;
use crate::error::{MontageError, MontageResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 掃描資料夾中的影片檔案，依路徑排序
///
/// 預設只掃描第一層，`recursive` 為 true 時掃描所有子資料夾
pub fn scan_video_files(
    directory: &Path,
    file_type_table: &FileTypeTable,
    recursive: bool,
) -> MontageResult<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(MontageError::Input(format!(
            "路徑不是資料夾: {}",
            directory.display()
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut video_files: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| file_type_table.is_video_file(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    video_files.sort();
    Ok(video_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn table() -> FileTypeTable {
        FileTypeTable {
            video_file: vec![".mp4".to_string(), ".mkv".to_string()],
        }
    }

    #[test]
    fn test_scan_non_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp4"), b"x").unwrap();
        fs::write(dir.path().join("a.MKV"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.mp4"), b"x").unwrap();

        let files = scan_video_files(dir.path(), &table(), false).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.MKV", "b.mp4"]);
    }

    #[test]
    fn test_scan_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp4"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.mp4"), b"x").unwrap();

        let files = scan_video_files(dir.path(), &table(), true).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_scan_missing_directory() {
        let result = scan_video_files(Path::new("/definitely/not/here"), &table(), false);
        assert!(matches!(result, Err(MontageError::Input(_))));
    }
}
