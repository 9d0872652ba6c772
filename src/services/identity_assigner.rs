//! 标识分配（第一遍）
//!
//! 给 scope 内每个候选分配一个新的全局唯一标识，
//! 同时建立 scope 内引用 → 标识 的映射。这一遍不碰任何依赖。

use std::collections::HashMap;

use crate::models::question::{LocalRef, QuestionCandidate, QuestionId};

/// scope 内引用到标识的映射，只在单个 scope 内有效
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefMap {
    entries: HashMap<LocalRef, QuestionId>,
}

impl RefMap {
    pub fn get(&self, local_ref: &LocalRef) -> Option<QuestionId> {
        self.entries.get(local_ref).copied()
    }

    pub fn insert(&mut self, local_ref: LocalRef, id: QuestionId) {
        self.entries.insert(local_ref, id);
    }

    pub fn remove(&mut self, local_ref: &LocalRef) -> Option<QuestionId> {
        self.entries.remove(local_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 已分配标识、尚未解析依赖的题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub id: QuestionId,
    pub candidate: QuestionCandidate,
}

pub struct IdentityAssigner;

impl IdentityAssigner {
    /// 遍历一次，按原顺序返回题目和映射
    ///
    /// 同一引用重复出现时，映射保留第一次出现的标识。
    pub fn assign(candidates: Vec<QuestionCandidate>) -> (Vec<PendingQuestion>, RefMap) {
        let mut refs = RefMap::default();
        let pending = candidates
            .into_iter()
            .map(|candidate| {
                let id = QuestionId::fresh();
                if refs.get(&candidate.local_ref).is_none() {
                    refs.insert(candidate.local_ref.clone(), id);
                }
                PendingQuestion { id, candidate }
            })
            .collect();
        (pending, refs)
    }
}
