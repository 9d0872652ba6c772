//! Scope 处理上下文
//!
//! 封装"我正在处理第几个 scope"以及它的引用映射。
//! 映射只在第一遍和第二遍之间存在，解析完成后随上下文一起丢弃。

use std::fmt::Display;

use crate::models::question::{Question, QuestionCandidate};
use crate::models::scope::Scope;
use crate::services::{DependencyResolver, IdentityAssigner, RefMap};

/// Scope 处理上下文
#[derive(Debug, Clone)]
pub struct ScopeCtx {
    /// scope 名（sheet 名或批次名）
    pub scope_name: String,

    /// scope 序号（决定最终输出顺序）
    pub ordinal: usize,

    /// 引用 → 标识 映射，第一遍之后才有内容
    refs: RefMap,
}

impl ScopeCtx {
    /// 创建新的 scope 上下文
    pub fn new(scope_name: String, ordinal: usize) -> Self {
        Self {
            scope_name,
            ordinal,
            refs: RefMap::default(),
        }
    }

    pub fn for_scope(scope: &Scope) -> Self {
        Self::new(scope.name.clone(), scope.ordinal)
    }

    /// 两遍处理：先分配标识，再解析依赖，最后丢弃映射
    pub fn resolve(&mut self, candidates: Vec<QuestionCandidate>) -> Vec<Question> {
        let (pending, refs) = IdentityAssigner::assign(candidates);
        self.refs = refs;
        let questions = DependencyResolver::resolve(&self.scope_name, pending, &self.refs);
        self.refs = RefMap::default();
        questions
    }

    /// 当前映射里的引用数（解析完成后为 0）
    pub fn live_refs(&self) -> usize {
        self.refs.len()
    }
}

impl Display for ScopeCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Scope #{} {}]", self.ordinal + 1, self.scope_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{DependencyAction, EdgeTarget, LocalRef, RawDependency};

    #[test]
    fn test_forward_reference_resolves_within_scope() {
        let candidates = vec![
            QuestionCandidate::new(LocalRef::Row(3), "If yes, which?").with_dependency(
                RawDependency::new(LocalRef::Row(4), Some("Yes".to_string()), DependencyAction::Show),
            ),
            QuestionCandidate::new(LocalRef::Row(4), "Do you export?"),
        ];
        let mut ctx = ScopeCtx::new("Trade".to_string(), 0);
        let questions = ctx.resolve(candidates);

        assert_eq!(
            questions[0].dependencies[0].target,
            EdgeTarget::Resolved {
                question_id: questions[1].question_id
            }
        );
        assert_eq!(ctx.live_refs(), 0);
    }

    #[test]
    fn test_display() {
        let ctx = ScopeCtx::new("Energy".to_string(), 2);
        assert_eq!(ctx.to_string(), "[Scope #3 Energy]");
    }
}
