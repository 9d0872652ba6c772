use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use survey_extract::models::{load_converted_text, load_row_sheets};
use survey_extract::utils::logging;
use survey_extract::{Config, Extractor, LlmService, Strategy};

const USAGE: &str = "用法: survey-extract <文件> [generative|judge]";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let strategy = match args.next().as_deref() {
        Some("judge") => Strategy::Judge,
        Some("generative") => Strategy::Generative,
        Some(other) => bail!("未知策略 '{}'。{}", other, USAGE),
        // 行数据文件默认走 judge 路径
        None if path.extension().is_some_and(|ext| ext == "toml") => Strategy::Judge,
        None => Strategy::Generative,
    };

    let service = LlmService::new(&config);
    let extractor = Extractor::new(config, service).context("配置无效")?;

    let result = match strategy {
        Strategy::Generative => {
            let text = load_converted_text(&path)
                .await
                .with_context(|| format!("无法读取输入: {}", path.display()))?;
            extractor.run_generative(&text).await
        }
        Strategy::Judge => {
            let sheets = load_row_sheets(&path)
                .await
                .with_context(|| format!("无法读取行数据: {}", path.display()))?;
            extractor.run_judge(sheets).await
        }
    };

    logging::print_final_stats(&result);

    let json = serde_json::to_string_pretty(&result).context("结果序列化失败")?;
    println!("{}", json);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
