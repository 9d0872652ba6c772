//! 外部调用接口
//!
//! 核心只通过这两个 trait 与 LLM 交互，自身不做任何 I/O。
//! 生产实现是 [`LlmService`](crate::services::LlmService)，测试用内存实现。

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::question::QuestionType;

/// 生成式抽取：输入 scope 名和文本，返回原始响应（可能被截断）
pub trait ExtractionClient: Send + Sync {
    fn extract(
        &self,
        scope_name: &str,
        scope_text: &str,
    ) -> impl Future<Output = AppResult<String>> + Send;
}

/// 打分：按顺序输入一批题目，按位置返回评估结果
pub trait ScoringClient: Send + Sync {
    fn score(&self, items: &[ScoringItem]) -> impl Future<Output = AppResult<Vec<Evaluation>>> + Send;
}

/// 提交给打分接口的一道题
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoringItem {
    /// 批内序号（从 1 开始）
    pub item: usize,
    pub question_text: String,
    pub question_type: QuestionType,
    pub answers: Vec<String>,
}

/// 打分接口返回的一条评估
///
/// 缺少 `confidence` 的评估不算打分，对应题目保持未打分。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub item: Option<usize>,
    #[serde(default)]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reason: String,
}

impl Evaluation {
    pub fn new(is_valid: bool, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            item: None,
            is_valid: Some(is_valid),
            confidence: Some(confidence),
            reason: reason.into(),
        }
    }
}
