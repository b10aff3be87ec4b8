//! caption-gan：按 JSON 配置执行数据下载、缓存与各训练阶段

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use caption_gan::train::{Config, TrainError, pipeline};

#[derive(Debug, Parser)]
#[command(name = "caption-gan", version, about = "图像风格化描述的 SeqGAN 训练")]
struct Cli {
    /// JSON 配置文件；缺省的字段取默认值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 打印默认配置后退出
    #[arg(long)]
    print_default_config: bool,
}

fn run(cli: &Cli) -> Result<(), TrainError> {
    if cli.print_default_config {
        println!("{}", Config::default().to_json_pretty()?);
        return Ok(());
    }
    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    pipeline::run(&config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("错误: {e}");
            ExitCode::FAILURE
        }
    }
}
