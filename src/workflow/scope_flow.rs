//! Scope 处理流程 - 流程层
//!
//! 核心职责：定义"一个 scope"的完整处理流程，并在这里兜住所有 scope 级错误
//!
//! 生成式路径：
//! 1. 调用抽取接口
//! 2. 解析响应（两种文法、截断恢复）
//! 3. 追问检测 → 标识分配 → 依赖解析
//!
//! judge 路径：
//! 1. 行分组
//! 2. 追问检测 → 标识分配 → 依赖解析
//! 3. 分批打分

use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::question::{Question, QuestionCandidate};
use crate::models::run::{ScopeReport, ScopeStatus};
use crate::models::scope::Scope;
use crate::services::{
    apply_heuristic, BatchStats, ConfidenceBatcher, DependencyHeuristic, ExtractionClient,
    FollowUpDetector, ResponseParser, RowGrouper, ScoringClient,
};
use crate::utils::logging::truncate_text;
use crate::workflow::scope_ctx::ScopeCtx;

/// 单个 scope 的处理结果
#[derive(Debug, Clone)]
pub struct ScopeOutcome {
    pub report: ScopeReport,
    pub questions: Vec<Question>,
    /// 抽取调用次数（生成式路径）
    pub llm_calls: usize,
    pub llm_time_ms: u64,
    /// 打分统计（judge 路径）
    pub batches: BatchStats,
    /// 非空题目单元格的行数（judge 路径）
    pub expected_questions: usize,
}

impl ScopeOutcome {
    fn new(scope: &Scope, status: ScopeStatus) -> Self {
        Self::with_status(&scope.name, scope.ordinal, status)
    }

    fn with_status(name: &str, ordinal: usize, status: ScopeStatus) -> Self {
        Self {
            report: ScopeReport {
                name: name.to_string(),
                ordinal,
                status,
                error: None,
                question_count: 0,
                elapsed_ms: 0,
            },
            questions: Vec::new(),
            llm_calls: 0,
            llm_time_ms: 0,
            batches: BatchStats::default(),
            expected_questions: 0,
        }
    }

    /// 未派发的 scope
    pub fn cancelled(scope: &Scope) -> Self {
        Self::new(scope, ScopeStatus::Cancelled)
    }

    /// scope 级失败：零题目，附带错误信息
    pub fn failed(scope: &Scope, error: impl ToString) -> Self {
        Self::failed_at(&scope.name, scope.ordinal, error)
    }

    /// scope 本身已经移交出去（例如任务 panic）时按名字和序号记失败
    pub fn failed_at(name: &str, ordinal: usize, error: impl ToString) -> Self {
        let mut outcome = Self::with_status(name, ordinal, ScopeStatus::Failed);
        outcome.report.error = Some(error.to_string());
        outcome
    }

    fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.report.question_count = questions.len();
        self.questions = questions;
        self
    }
}

/// Scope 处理流程
///
/// - 编排一个 scope 的完整处理
/// - 所有错误在这里转换成状态，不向外传播
/// - 只依赖业务能力（services）
pub struct ScopeFlow {
    parser: ResponseParser,
    heuristic: Box<dyn DependencyHeuristic>,
    batcher: ConfidenceBatcher,
    verbose_logging: bool,
}

impl ScopeFlow {
    /// 创建新的 scope 处理流程
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            parser: ResponseParser::new(),
            heuristic: Box::new(FollowUpDetector::new()?),
            batcher: ConfidenceBatcher::from_config(config),
            verbose_logging: config.verbose_logging,
        })
    }

    /// 替换依赖推断策略
    pub fn with_heuristic(mut self, heuristic: Box<dyn DependencyHeuristic>) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn batcher(&self) -> &ConfidenceBatcher {
        &self.batcher
    }

    /// 生成式路径处理一个 scope
    pub async fn run_generative<C: ExtractionClient>(
        &self,
        client: &C,
        scope: &Scope,
    ) -> ScopeOutcome {
        let started = Instant::now();
        let mut outcome = self.generative(client, scope, ScopeCtx::for_scope(scope)).await;
        outcome.report.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn generative<C: ExtractionClient>(
        &self,
        client: &C,
        scope: &Scope,
        mut ctx: ScopeCtx,
    ) -> ScopeOutcome {
        let Some(text) = scope.text() else {
            return ScopeOutcome::failed(scope, "scope 没有文本内容");
        };

        info!("{} 🚀 调用抽取接口 ({} 字符)", ctx, text.chars().count());

        let call_started = Instant::now();
        let response = client.extract(&scope.name, text).await;
        let llm_time_ms = call_started.elapsed().as_millis() as u64;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                error!("{} ⚠️ 抽取调用失败: {}", ctx, e);
                let mut outcome = ScopeOutcome::failed(scope, e);
                outcome.llm_calls = 1;
                outcome.llm_time_ms = llm_time_ms;
                return outcome;
            }
        };

        if self.verbose_logging {
            info!("{} 响应预览: {}", ctx, truncate_text(&response, 120));
        }

        let parsed = self.parser.parse(&scope.name, &response);
        if let Some(failure) = parsed.failure {
            warn!("{} ⚠️ 响应无法解析: {}", ctx, failure);
            let mut outcome = ScopeOutcome::failed(scope, failure);
            outcome.llm_calls = 1;
            outcome.llm_time_ms = llm_time_ms;
            return outcome;
        }

        let status = if parsed.truncated {
            ScopeStatus::Truncated
        } else {
            ScopeStatus::Succeeded
        };
        let questions = self.finish(&mut ctx, parsed.candidates);
        info!("{} ✓ 抽取完成，{} 道题 ({:?})", ctx, questions.len(), status);

        let mut outcome = ScopeOutcome::new(scope, status).with_questions(questions);
        outcome.llm_calls = 1;
        outcome.llm_time_ms = llm_time_ms;
        outcome
    }

    /// judge 路径处理一个 scope
    pub async fn run_judge<S: ScoringClient>(&self, client: &S, scope: &Scope) -> ScopeOutcome {
        let started = Instant::now();
        let mut ctx = ScopeCtx::for_scope(scope);

        let Some(rows) = scope.rows() else {
            let mut outcome = ScopeOutcome::failed(scope, "scope 没有行数据");
            outcome.report.elapsed_ms = started.elapsed().as_millis() as u64;
            return outcome;
        };

        let expected = rows.iter().filter(|row| row.question_cell().is_some()).count();
        let candidates = RowGrouper::new(scope.limits).group(rows);
        info!("{} 📦 {} 行分组为 {} 道题", ctx, rows.len(), candidates.len());

        let mut questions = self.finish(&mut ctx, candidates);
        let batches = self.batcher.score(&scope.name, client, &mut questions).await;

        let mut outcome = ScopeOutcome::new(scope, ScopeStatus::Succeeded).with_questions(questions);
        outcome.llm_time_ms = batches.llm_time_ms;
        outcome.batches = batches;
        outcome.expected_questions = expected;
        outcome.report.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    /// 追问检测 + 两遍标识处理
    fn finish(&self, ctx: &mut ScopeCtx, mut candidates: Vec<QuestionCandidate>) -> Vec<Question> {
        let added = apply_heuristic(self.heuristic.as_ref(), &mut candidates);
        if added > 0 {
            info!("{} 追问检测补充了 {} 条依赖", ctx, added);
        }
        ctx.resolve(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::scope::{GroupingLimits, ScopeSource, SheetRow};
    use crate::services::{Evaluation, ScoringItem};

    struct Canned(&'static str);

    impl ExtractionClient for Canned {
        async fn extract(&self, _scope_name: &str, _scope_text: &str) -> AppResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    impl ExtractionClient for Down {
        async fn extract(&self, _scope_name: &str, _scope_text: &str) -> AppResult<String> {
            Err(AppError::Other("connection reset".to_string()))
        }
    }

    struct Confident;

    impl ScoringClient for Confident {
        async fn score(&self, items: &[ScoringItem]) -> AppResult<Vec<Evaluation>> {
            Ok(items.iter().map(|_| Evaluation::new(true, 0.9, "ok")).collect())
        }
    }

    fn text_scope(text: &str) -> Scope {
        Scope {
            name: "General".to_string(),
            ordinal: 0,
            source: ScopeSource::Text(text.to_string()),
            limits: GroupingLimits::default(),
        }
    }

    fn flow() -> ScopeFlow {
        ScopeFlow::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_generative_scope_with_follow_up() {
        let response = r#"<questions>
<q type="yes_no" row="4"><text>Do you have a policy?</text><answers><option>Yes</option><option>No</option></answers></q>
<q type="open_ended" row="5"><text>If not, please explain.</text></q>
</questions>"#;
        let outcome = flow()
            .run_generative(&Canned(response), &text_scope("rows"))
            .await;

        assert_eq!(outcome.report.status, ScopeStatus::Succeeded);
        assert_eq!(outcome.report.question_count, 2);
        assert_eq!(outcome.llm_calls, 1);
        let edge = &outcome.questions[1].dependencies[0];
        assert!(edge.target.is_resolved());
        assert_eq!(edge.answer_value.as_deref(), Some("No"));
    }

    #[tokio::test]
    async fn test_call_failure_is_a_scope_failure() {
        let outcome = flow().run_generative(&Down, &text_scope("rows")).await;

        assert_eq!(outcome.report.status, ScopeStatus::Failed);
        assert!(outcome.questions.is_empty());
        assert!(outcome.report.error.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_unparseable_response_is_a_scope_failure() {
        let outcome = flow()
            .run_generative(&Canned("I could not find any questions."), &text_scope("rows"))
            .await;
        assert_eq!(outcome.report.status, ScopeStatus::Failed);
        assert_eq!(outcome.report.question_count, 0);
    }

    #[tokio::test]
    async fn test_judge_scope_groups_and_scores() {
        let scope = Scope {
            name: "Supplier".to_string(),
            ordinal: 1,
            source: ScopeSource::Rows(vec![
                SheetRow::new(2, "Company name", ""),
                SheetRow::new(3, "Certified?", "Yes"),
                SheetRow::new(4, "", "No"),
            ]),
            limits: GroupingLimits::default(),
        };
        let outcome = flow().run_judge(&Confident, &scope).await;

        assert_eq!(outcome.report.status, ScopeStatus::Succeeded);
        assert_eq!(outcome.questions.len(), 2);
        assert_eq!(outcome.batches.batch_calls, 1);
        assert!(outcome.questions.iter().all(|q| q.judgment.is_some()));
        assert_eq!(outcome.questions[1].answers, vec!["Yes", "No"]);
    }
}
