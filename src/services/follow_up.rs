//! 追问检测 - 业务能力层
//!
//! 题干以"如果没有…""请说明…"之类的措辞开头时，推断它是上一题的追问，
//! 补一条指向上一题的依赖。只追加依赖，不改题干、不删题目。

use regex::Regex;
use tracing::debug;

use crate::error::{AppResult, ConfigError};
use crate::models::question::{DependencyAction, QuestionCandidate, RawDependency};

/// 默认触发短语
pub const DEFAULT_TRIGGERS: &[&str] = &[
    "if not",
    "if no",
    "if you can not",
    "if you cannot",
    "if you can't",
    "please explain",
    "please specify",
    "please describe",
    "please detail",
    "if applicable",
    "if other",
];

/// 匹配必须在题干前多少个字符内开始
const EARLY_WINDOW: usize = 40;

/// 追问被触发时默认的期望答案
const DEFAULT_ANSWER: &str = "No";

/// 依赖推断策略
///
/// 返回 `(候选下标, 依赖)`，由调用方追加到对应候选上。
pub trait DependencyHeuristic: Send + Sync {
    fn propose(&self, candidates: &[QuestionCandidate]) -> Vec<(usize, RawDependency)>;
}

/// 基于触发短语的追问检测器
#[derive(Debug, Clone)]
pub struct FollowUpDetector {
    triggers: Regex,
}

impl FollowUpDetector {
    pub fn new() -> AppResult<Self> {
        Self::with_triggers(DEFAULT_TRIGGERS)
    }

    /// 自定义触发短语（按字面匹配，大小写不敏感）
    pub fn with_triggers(phrases: &[&str]) -> AppResult<Self> {
        let alternatives: Vec<String> = phrases.iter().map(|p| regex::escape(p.trim())).collect();
        let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
        let triggers = Regex::new(&pattern)
            .map_err(|source| ConfigError::InvalidTriggerPattern { pattern, source })?;
        Ok(Self { triggers })
    }

    /// 题干开头附近出现的触发短语
    fn trigger_in<'t>(&self, text: &'t str) -> Option<&'t str> {
        let found = self.triggers.find(text.trim_start())?;
        let prefix_chars = text.trim_start()[..found.start()].chars().count();
        (prefix_chars < EARLY_WINDOW).then(|| found.as_str())
    }
}

impl DependencyHeuristic for FollowUpDetector {
    fn propose(&self, candidates: &[QuestionCandidate]) -> Vec<(usize, RawDependency)> {
        let mut proposals = Vec::new();
        for (index, pair) in candidates.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let Some(phrase) = self.trigger_in(&current.text) else {
                continue;
            };
            if current.depends_on(&previous.local_ref) {
                continue;
            }

            let mut dependency = RawDependency::new(
                previous.local_ref.clone(),
                Some(DEFAULT_ANSWER.to_string()),
                DependencyAction::Show,
            );
            dependency.original_text = Some(phrase.to_string());
            proposals.push((index + 1, dependency));
        }
        proposals
    }
}

/// 把策略的推断结果追加到候选上，返回追加条数
pub fn apply_heuristic(
    heuristic: &dyn DependencyHeuristic,
    candidates: &mut [QuestionCandidate],
) -> usize {
    let proposals = heuristic.propose(candidates);
    let count = proposals.len();
    for (index, dependency) in proposals {
        if let Some(candidate) = candidates.get_mut(index) {
            debug!("追问依赖: {} -> {}", candidate.local_ref, dependency.target);
            candidate.dependencies.push(dependency);
        }
    }
    count
}
