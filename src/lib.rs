//! # Survey Extract
//!
//! 把问卷表格的抽取结果整理成带稳定标识、依赖已解析的题目图
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 纯数据：题目、scope、运行结果
//! - `models/loaders` - 从磁盘加载行数据和转换后的文本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个组件只做一件事
//! - `ScopeChunker` - 切分 scope
//! - `ResponseParser` - 解析两种文法的响应（含截断恢复）
//! - `RowGrouper` - 确定性行分组
//! - `FollowUpDetector` - 追问依赖推断
//! - `IdentityAssigner` / `DependencyResolver` - 两遍标识与依赖解析
//! - `ConfidenceBatcher` - 分批打分
//! - `LlmService` - 外部调用的 async-openai 实现
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个 scope"的完整处理流程
//! - `ScopeCtx` - 上下文封装（scope 名 + 序号 + 引用映射）
//! - `ScopeFlow` - 流程编排，兜住所有 scope 级错误
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_processor` - 并发派发、取消
//! - `orchestrator/result_aggregator` - 按序汇总、统计
//!
//! ## 模块结构

pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Question, RunResult, Strategy};
pub use orchestrator::{CancelFlag, Extractor, ResultAggregator};
pub use services::{ExtractionClient, LlmService, ScoringClient};
pub use workflow::{ScopeCtx, ScopeFlow};
