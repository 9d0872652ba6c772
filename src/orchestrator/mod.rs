//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的调度和汇总，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_processor` - 运行处理器
//! - 分块（ScopeChunker）
//! - 控制并发数量（Semaphore）
//! - 取消（CancelFlag）
//! - 捕获任务 panic，记为 scope 失败
//!
//! ### `result_aggregator` - 结果汇总
//! - 按 scope 序号重排
//! - 计算运行级统计
//! - 唯一决定运行成功 / 失败的地方
//!
//! ## 层次关系
//!
//! ```text
//! run_processor (处理 Vec<Scope>)
//!     ↓
//! workflow::ScopeFlow (处理单个 Scope)
//!     ↓
//! services (能力层：parse / group / resolve / score / llm)
//!     ↓
//! result_aggregator (Vec<ScopeOutcome> → RunResult)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：run_processor 管派发，result_aggregator 管汇总
//! 2. **失败隔离**：scope 级错误在 workflow 层就转成状态
//! 3. **向下依赖**：编排层 → workflow → services → models
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod result_aggregator;
pub mod run_processor;

// 重新导出主要类型
pub use result_aggregator::ResultAggregator;
pub use run_processor::{CancelFlag, Extractor};
