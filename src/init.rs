use log::LevelFilter;

/// 初始化 logger
///
/// quiet 只輸出錯誤，verbose 輸出除錯訊息；`RUST_LOG` 優先於兩者
pub fn init_logger(quiet: bool, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env();

    // 測試中可能重複初始化
    let _ = builder.try_init();
}
