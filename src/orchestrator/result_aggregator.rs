//! 结果汇总 - 编排层
//!
//! 把所有 scope 的处理结果合成一个 `RunResult`：
//! - 按 scope 序号、再按 scope 内原顺序拼接题目，不按其他键排序
//! - scope 失败只记入统计，不影响其他 scope
//! - 只有在 scope 隔离之外出错时才把整次运行标为失败

use chrono::{DateTime, Utc};
use std::time::Instant;
use uuid::Uuid;

use crate::models::question::{DependencyAction, Question};
use crate::models::run::{RunMetrics, RunResult, ScopeReport, ScopeStatus, Strategy};
use crate::workflow::ScopeOutcome;

/// 结果汇总器，创建时开始计时
#[derive(Debug)]
pub struct ResultAggregator {
    strategy: Strategy,
    threshold: f64,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl ResultAggregator {
    pub fn new(strategy: Strategy, threshold: f64) -> Self {
        Self {
            strategy,
            threshold,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    /// 正常汇总，部分 scope 失败时依然 `success = true`
    pub fn aggregate(self, outcomes: Vec<ScopeOutcome>) -> RunResult {
        self.build(outcomes, None)
    }

    /// 运行级失败：保留已经产出的 scope 结果以便排查
    pub fn fail(self, error: impl ToString, outcomes: Vec<ScopeOutcome>) -> RunResult {
        self.build(outcomes, Some(error.to_string()))
    }

    fn build(self, mut outcomes: Vec<ScopeOutcome>, error: Option<String>) -> RunResult {
        outcomes.sort_by_key(|outcome| outcome.report.ordinal);

        let mut metrics = RunMetrics {
            scope_count: outcomes.len(),
            ..RunMetrics::default()
        };
        let mut questions: Vec<Question> = Vec::new();
        let mut expected = 0;
        let mut scopes: Vec<ScopeReport> = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            match outcome.report.status {
                ScopeStatus::Failed => metrics.failed_scope_count += 1,
                ScopeStatus::Truncated => metrics.truncated_scope_count += 1,
                ScopeStatus::Cancelled => metrics.cancelled_scope_count += 1,
                ScopeStatus::Succeeded => {}
            }
            metrics.llm_call_count += outcome.llm_calls;
            metrics.llm_time_ms += outcome.llm_time_ms;
            metrics.batch_call_count += outcome.batches.batch_calls;
            metrics.failed_batch_count += outcome.batches.failed_batches;
            metrics.mismatched_batch_count += outcome.batches.mismatched_batches;
            expected += outcome.expected_questions;

            scopes.push(outcome.report);
            questions.extend(outcome.questions);
        }

        metrics.extraction_count = questions.len();
        count_dependencies(&questions, &mut metrics);
        if self.strategy == Strategy::Judge {
            summarize_confidence(&questions, self.threshold, &mut metrics);
            metrics.expected_count = Some(expected);
            metrics.accuracy =
                (expected > 0).then(|| metrics.extraction_count as f64 / expected as f64);
        }
        metrics.total_time_ms = self.clock.elapsed().as_millis() as u64;

        RunResult {
            run_id: Uuid::new_v4().to_string(),
            strategy: self.strategy,
            started_at: self.started_at,
            success: error.is_none(),
            error,
            questions,
            scopes,
            metrics,
        }
    }
}

fn count_dependencies(questions: &[Question], metrics: &mut RunMetrics) {
    for edge in questions.iter().flat_map(|q| &q.dependencies) {
        match edge.action {
            DependencyAction::Show => metrics.show_dependency_count += 1,
            DependencyAction::Skip => metrics.skip_dependency_count += 1,
        }
        if !edge.target.is_resolved() {
            metrics.unresolved_dependency_count += 1;
        }
    }
}

fn summarize_confidence(questions: &[Question], threshold: f64, metrics: &mut RunMetrics) {
    let judged: Vec<f64> = questions
        .iter()
        .filter_map(|q| q.judgment.as_ref().map(|j| j.confidence))
        .collect();

    metrics.unjudged_count = Some(questions.len() - judged.len());
    metrics.low_confidence_count = Some(judged.iter().filter(|c| **c < threshold).count());
    metrics.avg_confidence = if judged.is_empty() {
        None
    } else {
        Some(judged.iter().sum::<f64>() / judged.len() as f64)
    };
}
