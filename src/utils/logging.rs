/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::models::run::{RunMetrics, RunResult, Strategy};

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 日志写到 stderr，stdout 留给结果 JSON。重复调用不会 panic。
pub fn init(verbose: bool) {
    let default_level = if verbose { "survey_extract=debug" } else { "survey_extract=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录运行启动信息
///
/// # 参数
/// - `strategy`: 抽取策略
/// - `scope_count`: scope 数量
/// - `max_concurrent`: 最大并发数
pub fn log_startup(strategy: Strategy, scope_count: usize, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 开始抽取 - 策略: {:?}", strategy);
    info!("📋 共 {} 个 scope", scope_count);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(result: &RunResult) {
    let metrics: &RunMetrics = &result.metrics;

    info!("\n{}", "=".repeat(60));
    info!("📊 抽取完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 题目: {}", metrics.extraction_count);
    info!(
        "📦 scope: {} (失败 {}, 截断 {}, 取消 {})",
        metrics.scope_count,
        metrics.failed_scope_count,
        metrics.truncated_scope_count,
        metrics.cancelled_scope_count
    );
    info!(
        "🔗 依赖: show {}, skip {}, 未解析 {}",
        metrics.show_dependency_count,
        metrics.skip_dependency_count,
        metrics.unresolved_dependency_count
    );
    if let Some(avg) = metrics.avg_confidence {
        info!(
            "🎯 平均置信度: {:.2}，低置信度 {} 道，未打分 {} 道",
            avg,
            metrics.low_confidence_count.unwrap_or(0),
            metrics.unjudged_count.unwrap_or(0)
        );
    }
    if let (Some(expected), Some(accuracy)) = (metrics.expected_count, metrics.accuracy) {
        info!("📐 期望 {} 道，准确率 {:.1}%", expected, accuracy * 100.0);
    }
    info!(
        "⏱ 总耗时 {} ms (LLM {} ms)",
        metrics.total_time_ms, metrics.llm_time_ms
    );
    for scope in result.failed_scopes() {
        warn!(
            "❌ {}: {}",
            scope.name,
            scope.error.as_deref().unwrap_or("未知错误")
        );
    }
    if let Some(error) = &result.error {
        warn!("❌ 运行失败: {}", error);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("问卷题目", 2), "问卷...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
