use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use log::{debug, error};
use std::process::ExitCode;
use video_montage::cli::Args;
use video_montage::component::MontageGenerator;
use video_montage::init;
use video_montage::signal::setup_shutdown_signal;

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{} {e:#}", style("錯誤:").red().bold());
            ExitCode::FAILURE
        }
    }
}

/// 回傳是否所有檔案都成功（跳過不算失敗）
fn run(args: &Args) -> Result<bool> {
    let file_layer = args.file_layer()?;

    // 設定檔中的 quiet / verbose 也要在驗證前生效
    let quiet = args.quiet || (!args.verbose && file_layer.as_ref().and_then(|l| l.quiet) == Some(true));
    let verbose = args.verbose || (!quiet && file_layer.as_ref().and_then(|l| l.verbose) == Some(true));
    init::init_logger(quiet, verbose);

    let config = args.resolve_config(file_layer)?;
    debug!("輸出格式: {:?}", config.format);

    let shutdown_signal = setup_shutdown_signal()?;
    let generator = MontageGenerator::new(config, shutdown_signal).context("無法初始化")?;
    let result = generator.run(args.input())?;

    Ok(!result.has_failures())
}
