//! 置信度分批打分 - 业务能力层（仅 judge 路径）
//!
//! 把一个 scope 的确定性题目按固定大小分批送去打分，
//! 结果按批内位置合并回题目。长度不一致或调用失败都不会中断运行，
//! 对不上的位置保持未打分（`judgment = None`）。

use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, ParseError};
use crate::models::question::{Judgment, Question};
use crate::services::clients::{Evaluation, ScoringClient, ScoringItem};

/// 一个 scope 的打分统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub batch_calls: usize,
    pub failed_batches: usize,
    /// 返回条数与请求条数不一致的批次
    pub mismatched_batches: usize,
    pub llm_time_ms: u64,
}

/// 分批打分器
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceBatcher {
    batch_size: usize,
    threshold: f64,
}

impl ConfidenceBatcher {
    pub fn new(batch_size: usize, threshold: f64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            threshold,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.judge_batch_size, config.confidence_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 各批次大小，例如 23 道题、批大小 10 → [10, 10, 3]
    pub fn batch_sizes(&self, total: usize) -> Vec<usize> {
        (0..total)
            .step_by(self.batch_size)
            .map(|start| self.batch_size.min(total - start))
            .collect()
    }

    /// 逐批打分并原地写入 `judgment`
    pub async fn score<C: ScoringClient>(
        &self,
        scope_name: &str,
        client: &C,
        questions: &mut [Question],
    ) -> BatchStats {
        let mut stats = BatchStats::default();
        let total_batches = questions.len().div_ceil(self.batch_size);

        for (batch_index, batch) in questions.chunks_mut(self.batch_size).enumerate() {
            let items: Vec<ScoringItem> = batch
                .iter()
                .enumerate()
                .map(|(i, question)| ScoringItem {
                    item: i + 1,
                    question_text: question.question_text.clone(),
                    question_type: question.question_type,
                    answers: question.answers.clone(),
                })
                .collect();

            debug!(
                "[Scope {}] 打分批次 {}/{}，{} 道题",
                scope_name,
                batch_index + 1,
                total_batches,
                items.len()
            );

            stats.batch_calls += 1;
            let started = Instant::now();
            let result = client.score(&items).await;
            stats.llm_time_ms += started.elapsed().as_millis() as u64;

            match result {
                Ok(evaluations) => {
                    if !merge_evaluations(batch, evaluations) {
                        stats.mismatched_batches += 1;
                        warn!(
                            "[Scope {}] ⚠️ 批次 {} 返回条数与请求不一致，未匹配的题目保持未打分",
                            scope_name,
                            batch_index + 1
                        );
                    }
                }
                Err(e) => {
                    stats.failed_batches += 1;
                    warn!(
                        "[Scope {}] ⚠️ 批次 {} 打分失败: {}",
                        scope_name,
                        batch_index + 1,
                        e
                    );
                }
            }
        }

        let low = questions
            .iter()
            .filter(|q| q.is_low_confidence(self.threshold))
            .count();
        info!(
            "[Scope {}] ✓ 打分完成: {} 批，失败 {} 批，低置信度 {} 道",
            scope_name, stats.batch_calls, stats.failed_batches, low
        );

        stats
    }
}

impl Default for ConfidenceBatcher {
    fn default() -> Self {
        Self::new(10, 0.7)
    }
}

/// 按位置合并评估，返回长度是否一致
///
/// 第 i 条评估对应批内第 i 道题；多出的评估忽略，缺少的位置不动。
/// 没有置信度的评估不产生 `judgment`。
pub fn merge_evaluations(batch: &mut [Question], evaluations: Vec<Evaluation>) -> bool {
    let matched = batch.len() == evaluations.len();
    for (question, evaluation) in batch.iter_mut().zip(evaluations) {
        question.judgment = judgment_from(evaluation);
    }
    matched
}

fn judgment_from(evaluation: Evaluation) -> Option<Judgment> {
    let confidence = evaluation.confidence?;
    Some(Judgment {
        // 只给了置信度时视为有效题目
        is_valid: evaluation.is_valid.unwrap_or(true),
        confidence: clamp_confidence(confidence),
        reason: evaluation.reason,
    })
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Deserialize)]
struct EvaluationReply {
    #[serde(default)]
    evaluations: Vec<Evaluation>,
}

/// 解析打分回复
///
/// 回复里可能夹杂说明文字或代码块，取第一个 `{` 到最后一个 `}` 之间的内容。
pub fn parse_evaluations(reply: &str) -> AppResult<Vec<Evaluation>> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };
    let parsed: EvaluationReply = serde_json::from_str(json)
        .map_err(|source| ParseError::InvalidJudgeJson { source })?;
    Ok(parsed.evaluations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::question::{QuestionId, QuestionType};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn question(n: usize) -> Question {
        Question {
            question_id: QuestionId::fresh(),
            question_text: format!("Question {}", n),
            question_type: QuestionType::OpenEnded,
            answers: Vec::new(),
            help_text: None,
            conditional_inputs: BTreeMap::new(),
            dependencies: Vec::new(),
            sheet_name: "S".to_string(),
            row_index: Some(n as u32),
            judgment: None,
        }
    }

    /// 第 2 批少返回一条
    struct ShortSecondBatch {
        calls: AtomicUsize,
    }

    impl ScoringClient for ShortSecondBatch {
        async fn score(&self, items: &[ScoringItem]) -> AppResult<Vec<Evaluation>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let keep = if call == 2 { items.len() - 1 } else { items.len() };
            Ok(items
                .iter()
                .take(keep)
                .map(|item| Evaluation::new(true, 0.5 + item.item as f64 / 100.0, "ok"))
                .collect())
        }
    }

    struct AlwaysFails;

    impl ScoringClient for AlwaysFails {
        async fn score(&self, _items: &[ScoringItem]) -> AppResult<Vec<Evaluation>> {
            Err(AppError::Other("rate limited".to_string()))
        }
    }

    #[test]
    fn test_batch_sizes() {
        let batcher = ConfidenceBatcher::new(10, 0.7);
        assert_eq!(batcher.batch_sizes(23), vec![10, 10, 3]);
        assert_eq!(batcher.batch_sizes(20), vec![10, 10]);
        assert!(batcher.batch_sizes(0).is_empty());
    }

    #[tokio::test]
    async fn test_short_batch_leaves_trailing_question_unjudged() {
        let mut questions: Vec<Question> = (1..=23).map(question).collect();
        let client = ShortSecondBatch {
            calls: AtomicUsize::new(0),
        };
        let stats = ConfidenceBatcher::new(10, 0.7)
            .score("S", &client, &mut questions)
            .await;

        assert_eq!(stats.batch_calls, 3);
        assert_eq!(stats.failed_batches, 0);
        assert_eq!(stats.mismatched_batches, 1);
        assert!(questions[10].judgment.is_some());
        assert!(questions[18].judgment.is_some());
        assert!(questions[19].judgment.is_none());
        assert!(questions[20].judgment.is_some());
        assert_eq!(questions.iter().filter(|q| q.judgment.is_none()).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_call_leaves_batch_unjudged() {
        let mut questions: Vec<Question> = (1..=4).map(question).collect();
        let stats = ConfidenceBatcher::new(3, 0.7)
            .score("S", &AlwaysFails, &mut questions)
            .await;

        assert_eq!(stats.batch_calls, 2);
        assert_eq!(stats.failed_batches, 2);
        assert!(questions.iter().all(|q| q.judgment.is_none()));
    }

    #[test]
    fn test_merge_clamps_and_ignores_extra() {
        let mut batch = vec![question(1)];
        let matched = merge_evaluations(
            &mut batch,
            vec![Evaluation::new(false, 1.7, "odd"), Evaluation::new(true, 0.9, "x")],
        );

        assert!(!matched);
        let judgment = batch[0].judgment.as_ref().unwrap();
        assert_eq!(judgment.confidence, 1.0);
        assert!(!judgment.is_valid);
        assert!(!batch[0].is_low_confidence(0.7));
    }

    #[test]
    fn test_parse_evaluations_from_wrapped_reply() {
        let reply = r#"Here you go:
```json
{"evaluations": [
  {"item": 1, "is_valid": true, "confidence": 0.92, "reason": "clear"},
  {"item": 2, "is_valid": false, "confidence": 0.31, "reason": "fragment"}
]}
```"#;
        let evaluations = parse_evaluations(reply).unwrap();
        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[1].item, Some(2));
        assert_eq!(evaluations[1].is_valid, Some(false));
        assert!(parse_evaluations("no json here").is_err());
    }

    #[test]
    fn test_evaluation_without_confidence_stays_unjudged() {
        let evaluations = parse_evaluations(
            r#"{"evaluations":[{"item":1,"reason":"?"},{"item":2,"confidence":0.8}]}"#,
        )
        .unwrap();
        let mut batch = vec![question(1), question(2)];

        assert!(merge_evaluations(&mut batch, evaluations));
        assert!(batch[0].judgment.is_none());
        assert!(!batch[0].is_low_confidence(0.7));
        let judgment = batch[1].judgment.as_ref().unwrap();
        assert!(judgment.is_valid);
        assert_eq!(judgment.confidence, 0.8);
    }
}
