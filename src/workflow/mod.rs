pub mod scope_ctx;
pub mod scope_flow;

pub use scope_ctx::ScopeCtx;
pub use scope_flow::{ScopeFlow, ScopeOutcome};
