use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// 抽取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 文本 → LLM → 解析
    Generative,
    /// 表格行确定性分组 + LLM 打分
    Judge,
}

/// 单个 scope 的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    Succeeded,
    /// 响应被截断，但至少恢复了一条记录
    Truncated,
    Failed,
    /// 取消后未派发
    Cancelled,
}

/// 单个 scope 的报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub name: String,
    pub ordinal: usize,
    pub status: ScopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub question_count: usize,
    pub elapsed_ms: u64,
}

/// 运行级统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub extraction_count: usize,
    pub scope_count: usize,
    pub failed_scope_count: usize,
    pub truncated_scope_count: usize,
    pub cancelled_scope_count: usize,
    pub llm_call_count: usize,
    pub batch_call_count: usize,
    pub failed_batch_count: usize,
    /// 返回条数与请求条数不一致的打分批次
    #[serde(default)]
    pub mismatched_batch_count: usize,
    pub llm_time_ms: u64,
    pub total_time_ms: u64,
    pub show_dependency_count: usize,
    pub skip_dependency_count: usize,
    pub unresolved_dependency_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unjudged_count: Option<usize>,
    /// 期望题数：非空题目单元格的行数（judge 路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<usize>,
    /// extraction_count / expected_count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// 一次运行的完整结果
///
/// `success` 只表示聚合本身是否完成；部分 scope 失败时仍为 true，
/// 失败的 scope 记录在 `scopes` 里。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub strategy: Strategy,
    pub started_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub scopes: Vec<ScopeReport>,
    pub metrics: RunMetrics,
}

impl RunResult {
    pub fn failed_scopes(&self) -> impl Iterator<Item = &ScopeReport> {
        self.scopes
            .iter()
            .filter(|scope| scope.status == ScopeStatus::Failed)
    }
}
