use crate::error::{MontageError, MontageResult};
use std::path::Path;

pub fn validate_input_exists(path: &Path) -> MontageResult<()> {
    if !path.exists() {
        return Err(MontageError::Input(format!("路徑不存在: {}", path.display())));
    }
    Ok(())
}

pub fn ensure_directory_exists(path: &Path) -> MontageResult<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| {
            MontageError::Output(format!("無法建立資料夾 {}: {e}", path.display()))
        })?;
    }
    Ok(())
}
