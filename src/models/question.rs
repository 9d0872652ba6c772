use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::services::lexicon;

/// 题目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    OpenEnded,
    SingleChoice,
    MultipleChoice,
    YesNo,
    Numeric,
    Integer,
    Decimal,
    GroupedQuestion,
}

impl QuestionType {
    /// 输出 schema 中使用的类型标签
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::OpenEnded => "open_ended",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::YesNo => "yes_no",
            QuestionType::Numeric => "numeric",
            QuestionType::Integer => "integer",
            QuestionType::Decimal => "decimal",
            QuestionType::GroupedQuestion => "grouped_question",
        }
    }

    /// 从类型字符串解析，未知类型按 open_ended 处理
    pub fn from_tag(tag: &str) -> Self {
        lexicon::question_type(tag).unwrap_or_default()
    }

    /// 是否需要从题干里解析内联选项
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::YesNo
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 依赖动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyAction {
    #[default]
    Show,
    Skip,
}

impl DependencyAction {
    /// 解析 `action` 属性，缺省或未知值视为 show
    pub fn from_attr(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("skip") {
            DependencyAction::Skip
        } else {
            DependencyAction::Show
        }
    }
}

/// scope 内引用：行号、序号，或无法识别的原始标签
///
/// 只在所属 scope 内有意义。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocalRef {
    Row(u32),
    Seq(u32),
    Label(String),
}

impl LocalRef {
    /// 解析依赖里写的目标引用：数字按行号，其余保留为标签
    pub fn parse_target(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<u32>() {
            Ok(row) => LocalRef::Row(row),
            Err(_) => LocalRef::Label(raw.to_string()),
        }
    }

    pub fn row(&self) -> Option<u32> {
        match self {
            LocalRef::Row(row) => Some(*row),
            _ => None,
        }
    }
}

impl fmt::Display for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalRef::Row(n) | LocalRef::Seq(n) => write!(f, "{}", n),
            LocalRef::Label(label) => f.write_str(label),
        }
    }
}

/// 尚未解析的依赖
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDependency {
    pub target: LocalRef,
    pub answer_value: Option<String>,
    pub action: DependencyAction,
    pub condition_type: String,
    pub original_text: Option<String>,
}

impl RawDependency {
    pub fn new(target: LocalRef, answer_value: Option<String>, action: DependencyAction) -> Self {
        Self {
            target,
            answer_value,
            action,
            condition_type: "equals".to_string(),
            original_text: None,
        }
    }
}

/// 分配标识之前的题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCandidate {
    pub local_ref: LocalRef,
    /// 来源行号（生成式路径可能没有）
    pub row_index: Option<u32>,
    pub text: String,
    pub help_text: Option<String>,
    pub question_type: QuestionType,
    pub answers: Vec<String>,
    pub conditional_inputs: BTreeMap<String, String>,
    pub dependencies: Vec<RawDependency>,
}

impl QuestionCandidate {
    pub fn new(local_ref: LocalRef, text: impl Into<String>) -> Self {
        Self {
            row_index: local_ref.row(),
            local_ref,
            text: text.into(),
            help_text: None,
            question_type: QuestionType::OpenEnded,
            answers: Vec::new(),
            conditional_inputs: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_type(mut self, question_type: QuestionType) -> Self {
        self.question_type = question_type;
        self
    }

    pub fn with_answers(mut self, answers: Vec<String>) -> Self {
        self.answers = answers;
        self
    }

    pub fn with_dependency(mut self, dependency: RawDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// 是否已经依赖某个目标
    pub fn depends_on(&self, target: &LocalRef) -> bool {
        self.dependencies.iter().any(|dep| &dep.target == target)
    }
}

/// 稳定的题目标识（一次运行内唯一，不复用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(Uuid);

impl QuestionId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 依赖指向
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EdgeTarget {
    Resolved { question_id: QuestionId },
    /// 目标不在本 scope 的映射里，保留原始引用
    Unresolved { raw_ref: String },
}

impl EdgeTarget {
    pub fn is_resolved(&self) -> bool {
        matches!(self, EdgeTarget::Resolved { .. })
    }
}

/// 解析后的依赖边
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: QuestionId,
    pub target: EdgeTarget,
    pub answer_value: Option<String>,
    pub action: DependencyAction,
    pub condition_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

/// 打分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub is_valid: bool,
    pub confidence: f64,
    pub reason: String,
}

/// 最终输出的题目记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub answers: Vec<String>,
    pub help_text: Option<String>,
    #[serde(default)]
    pub conditional_inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEdge>,
    pub sheet_name: String,
    pub row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
}

impl Question {
    /// 已打分且低于阈值
    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.judgment
            .as_ref()
            .is_some_and(|judgment| judgment.confidence < threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_type_tags() {
        assert_eq!(QuestionType::from_tag("single_choice"), QuestionType::SingleChoice);
        assert_eq!(QuestionType::from_tag("YesNo"), QuestionType::YesNo);
        assert_eq!(QuestionType::from_tag("matrix"), QuestionType::OpenEnded);
        assert!(QuestionType::YesNo.is_choice());
        assert!(!QuestionType::Numeric.is_choice());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(LocalRef::parse_target(" 12 "), LocalRef::Row(12));
        assert_eq!(
            LocalRef::parse_target("q-7"),
            LocalRef::Label("q-7".to_string())
        );
        assert_eq!(LocalRef::Row(2).to_string(), "2");
    }

    #[test]
    fn test_edge_target_serializes_with_status_tag() {
        let edge = EdgeTarget::Unresolved {
            raw_ref: "2".to_string(),
        };
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["status"], "unresolved");
        assert_eq!(json["raw_ref"], "2");
    }
}
