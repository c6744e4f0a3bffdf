use thiserror::Error;

/// 預覽圖流程的錯誤分類
///
/// `Decode` 只在擷取階段內部使用，會被轉成佔位影格，不會往外傳遞。
/// 其餘錯誤都只中止目前這個檔案的處理。
#[derive(Debug, Error)]
pub enum MontageError {
    #[error("輸入錯誤: {0}")]
    Input(String),
    #[error("設定錯誤: {0}")]
    Config(String),
    #[error("解碼錯誤: {0}")]
    Decode(String),
    #[error("輸出錯誤: {0}")]
    Output(String),
    #[error("編碼錯誤: {0}")]
    Encoding(String),
}

impl MontageError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Config(_) => "config",
            Self::Decode(_) => "decode",
            Self::Output(_) => "output",
            Self::Encoding(_) => "encoding",
        }
    }
}

pub type MontageResult<T> = std::result::Result<T, MontageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(MontageError::Input("x".into()).kind(), "input");
        assert_eq!(MontageError::Encoding("x".into()).kind(), "encoding");
    }

    #[test]
    fn test_error_display() {
        let err = MontageError::Config("colors 超出範圍".into());
        assert_eq!(err.to_string(), "設定錯誤: colors 超出範圍");
    }
}
