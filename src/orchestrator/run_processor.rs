//! 运行处理器 - 编排层
//!
//! ## 职责
//!
//! 一次抽取运行的入口：分块、派发、汇总。
//!
//! ## 核心功能
//!
//! 1. **分块**：`ScopeChunker` 把输入切成独立 scope
//! 2. **并发控制**：使用 Semaphore 限制同时进行的外部调用
//! 3. **取消**：`CancelFlag` 置位后不再派发新的 scope
//! 4. **汇总**：按 scope 序号重新排列，交给 `ResultAggregator`
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个 scope 的细节，委托 `ScopeFlow`
//! - **失败隔离**：任务 panic 也只记为该 scope 失败
//! - **不可变共享**：scope 之间不共享任何可变状态

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::run::{RunResult, ScopeStatus, Strategy};
use crate::models::scope::{Scope, SheetRows};
use crate::orchestrator::result_aggregator::ResultAggregator;
use crate::services::{ExtractionClient, ScopeChunker, ScoringClient};
use crate::utils::logging::log_startup;
use crate::workflow::{ScopeFlow, ScopeOutcome};

/// 取消标记，可在任意任务中克隆和置位
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 抽取运行器
pub struct Extractor<C> {
    config: Config,
    flow: Arc<ScopeFlow>,
    client: Arc<C>,
    cancel: CancelFlag,
}

impl<C> Extractor<C> {
    /// 校验配置并创建运行器
    pub fn new(config: Config, client: C) -> AppResult<Self> {
        config.validate()?;
        let flow = ScopeFlow::new(&config)?;
        Ok(Self {
            config,
            flow: Arc::new(flow),
            client: Arc::new(client),
            cancel: CancelFlag::new(),
        })
    }

    /// 替换 scope 流程（例如换一个依赖推断策略）
    pub fn with_flow(mut self, flow: ScopeFlow) -> Self {
        self.flow = Arc::new(flow);
        self
    }

    /// 使用外部提供的取消标记
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn aggregator(&self, strategy: Strategy) -> ResultAggregator {
        ResultAggregator::new(strategy, self.flow.batcher().threshold())
    }

    /// 并发处理所有 scope，结果顺序与完成顺序无关
    async fn dispatch<F, Fut>(&self, scopes: Vec<Scope>, run: F) -> Vec<ScopeOutcome>
    where
        F: Fn(Arc<ScopeFlow>, Arc<C>, Scope) -> Fut,
        Fut: Future<Output = ScopeOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scopes));
        let mut outcomes = Vec::with_capacity(scopes.len());
        let mut dispatched = Vec::new();
        let mut handles = Vec::new();

        for scope in scopes {
            if self.cancel.is_cancelled() {
                outcomes.push(ScopeOutcome::cancelled(&scope));
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    outcomes.push(ScopeOutcome::failed(&scope, e));
                    continue;
                }
            };

            // 等待许可期间可能已被取消
            if self.cancel.is_cancelled() {
                drop(permit);
                outcomes.push(ScopeOutcome::cancelled(&scope));
                continue;
            }

            let name = scope.name.clone();
            let ordinal = scope.ordinal;
            let task = run(self.flow.clone(), self.client.clone(), scope);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                task.await
            });
            dispatched.push((name, ordinal));
            handles.push(handle);
        }

        // 等待所有任务完成
        let joined = join_all(handles).await;
        for ((name, ordinal), result) in dispatched.into_iter().zip(joined) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("[Scope {}] ❌ 任务执行失败: {}", name, e);
                    outcomes.push(ScopeOutcome::failed_at(&name, ordinal, e));
                }
            }
        }

        let cancelled = outcomes
            .iter()
            .filter(|o| o.report.status == ScopeStatus::Cancelled)
            .count();
        if cancelled > 0 {
            warn!("⚠️ 运行已取消，{} 个 scope 未派发", cancelled);
        }

        outcomes
    }
}

impl<C: ExtractionClient + 'static> Extractor<C> {
    /// 生成式路径：文本 → 分块 → 抽取 → 解析 → 汇总
    pub async fn run_generative(&self, text: &str) -> RunResult {
        let aggregator = self.aggregator(Strategy::Generative);

        let chunker = match ScopeChunker::from_config(&self.config) {
            Ok(chunker) => chunker,
            Err(e) => {
                error!("❌ 分块失败: {}", e);
                return aggregator.fail(e, Vec::new());
            }
        };

        let scopes = chunker.chunk_text(text);
        log_startup(Strategy::Generative, scopes.len(), self.config.max_concurrent_scopes);

        let outcomes = self
            .dispatch(scopes, |flow, client, scope| async move {
                flow.run_generative(client.as_ref(), &scope).await
            })
            .await;

        let result = aggregator.aggregate(outcomes);
        info!(
            "✓ 生成式抽取完成: {} 道题，{} 个 scope 失败",
            result.metrics.extraction_count, result.metrics.failed_scope_count
        );
        result
    }
}

impl<C: ScoringClient + 'static> Extractor<C> {
    /// judge 路径：行数据 → 分组 → 标识/依赖 → 分批打分 → 汇总
    pub async fn run_judge(&self, sheets: Vec<SheetRows>) -> RunResult {
        let aggregator = self.aggregator(Strategy::Judge);

        let chunker = match ScopeChunker::from_config(&self.config) {
            Ok(chunker) => chunker,
            Err(e) => {
                error!("❌ 分块失败: {}", e);
                return aggregator.fail(e, Vec::new());
            }
        };

        let scopes = chunker.chunk_rows(sheets);
        log_startup(Strategy::Judge, scopes.len(), self.config.max_concurrent_scopes);

        let outcomes = self
            .dispatch(scopes, |flow, client, scope| async move {
                flow.run_judge(client.as_ref(), &scope).await
            })
            .await;

        let result = aggregator.aggregate(outcomes);
        info!(
            "✓ judge 抽取完成: {} 道题，{} 个批次失败",
            result.metrics.extraction_count, result.metrics.failed_batch_count
        );
        result
    }
}
