//! 依赖解析（第二遍）
//!
//! 纯函数：用第一遍得到的映射把原始引用换成目标标识。
//! 找不到的引用保留原值并标记为未解析，不丢弃。

use tracing::debug;

use crate::models::question::{DependencyEdge, EdgeTarget, Question, QuestionId, RawDependency};
use crate::services::identity_assigner::{PendingQuestion, RefMap};

pub struct DependencyResolver;

impl DependencyResolver {
    /// 生成最终题目，顺序与输入一致
    pub fn resolve(scope_name: &str, pending: Vec<PendingQuestion>, refs: &RefMap) -> Vec<Question> {
        pending
            .into_iter()
            .map(|PendingQuestion { id, candidate }| {
                let dependencies = candidate
                    .dependencies
                    .iter()
                    .map(|raw| Self::edge(scope_name, id, raw, refs))
                    .collect();

                Question {
                    question_id: id,
                    question_text: candidate.text,
                    question_type: candidate.question_type,
                    answers: candidate.answers,
                    help_text: candidate.help_text,
                    conditional_inputs: candidate.conditional_inputs,
                    dependencies,
                    sheet_name: scope_name.to_string(),
                    row_index: candidate.row_index,
                    judgment: None,
                }
            })
            .collect()
    }

    fn edge(
        scope_name: &str,
        source: QuestionId,
        raw: &RawDependency,
        refs: &RefMap,
    ) -> DependencyEdge {
        let target = match refs.get(&raw.target) {
            Some(question_id) => EdgeTarget::Resolved { question_id },
            None => {
                debug!("[Scope {}] 未解析的依赖引用: {}", scope_name, raw.target);
                EdgeTarget::Unresolved {
                    raw_ref: raw.target.to_string(),
                }
            }
        };

        DependencyEdge {
            source,
            target,
            answer_value: raw.answer_value.clone(),
            action: raw.action,
            condition_type: raw.condition_type.clone(),
            original_text: raw.original_text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{DependencyAction, LocalRef, QuestionCandidate};
    use crate::services::identity_assigner::IdentityAssigner;
    use pretty_assertions::assert_eq;

    fn scope_s() -> Vec<QuestionCandidate> {
        (1..=5)
            .map(|n| {
                let candidate = QuestionCandidate::new(LocalRef::Row(n), format!("Question {}", n));
                if n == 3 {
                    candidate.with_dependency(RawDependency::new(
                        LocalRef::Row(2),
                        Some("No".to_string()),
                        DependencyAction::Show,
                    ))
                } else {
                    candidate
                }
            })
            .collect()
    }

    #[test]
    fn test_dependency_resolves_to_target_id() {
        let (pending, refs) = IdentityAssigner::assign(scope_s());
        let target_id = pending[1].id;
        let questions = DependencyResolver::resolve("S", pending, &refs);

        let edge = &questions[2].dependencies[0];
        assert_eq!(edge.target, EdgeTarget::Resolved { question_id: target_id });
        assert_eq!(edge.source, questions[2].question_id);
        assert_eq!(edge.answer_value.as_deref(), Some("No"));
        assert_eq!(edge.action, DependencyAction::Show);
        assert_eq!(edge.condition_type, "equals");
        assert_eq!(questions[2].sheet_name, "S");
    }

    #[test]
    fn test_missing_target_stays_unresolved() {
        let mut candidates = scope_s();
        candidates.remove(1);
        let (pending, refs) = IdentityAssigner::assign(candidates);
        let questions = DependencyResolver::resolve("S", pending, &refs);

        assert_eq!(questions.len(), 4);
        assert_eq!(
            questions[1].dependencies[0].target,
            EdgeTarget::Unresolved {
                raw_ref: "2".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let (pending, mut refs) = IdentityAssigner::assign(scope_s());
        refs.remove(&LocalRef::Row(5));

        let first = DependencyResolver::resolve("S", pending.clone(), &refs);
        let second = DependencyResolver::resolve("S", pending, &refs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_label_targets_never_resolve() {
        let candidate = QuestionCandidate::new(LocalRef::Seq(1), "Q").with_dependency(
            RawDependency::new(LocalRef::Label("q-x".to_string()), None, DependencyAction::Skip),
        );
        let (pending, refs) = IdentityAssigner::assign(vec![candidate]);
        let questions = DependencyResolver::resolve("S", pending, &refs);

        assert!(!questions[0].dependencies[0].target.is_resolved());
        assert_eq!(questions[0].dependencies[0].action, DependencyAction::Skip);
    }
}
