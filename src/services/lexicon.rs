//! 静态词表
//!
//! 类型标签、是/否选项、多选提示词

use phf::{phf_map, phf_set};

use crate::models::question::QuestionType;

static QUESTION_TYPES: phf::Map<&'static str, QuestionType> = phf_map! {
    "open_ended" => QuestionType::OpenEnded,
    "open" => QuestionType::OpenEnded,
    "text" => QuestionType::OpenEnded,
    "single_choice" => QuestionType::SingleChoice,
    "single" => QuestionType::SingleChoice,
    "multiple_choice" => QuestionType::MultipleChoice,
    "multiple" => QuestionType::MultipleChoice,
    "multi" => QuestionType::MultipleChoice,
    "yes_no" => QuestionType::YesNo,
    "yesno" => QuestionType::YesNo,
    "numeric" => QuestionType::Numeric,
    "number" => QuestionType::Numeric,
    "integer" => QuestionType::Integer,
    "decimal" => QuestionType::Decimal,
    "grouped_question" => QuestionType::GroupedQuestion,
    "grouped" => QuestionType::GroupedQuestion,
};

/// 是/否选项对（小写）
static YES_NO_PAIRS: &[(&str, &str)] = &[("yes", "no"), ("true", "false"), ("y", "n")];

static MULTI_SELECT_HINTS: phf::Set<&'static str> = phf_set! {
    "select all",
    "all that apply",
    "check all",
    "tick all",
    "multiple answers",
};

/// 查找类型标签，大小写、空格、连字符不敏感
pub fn question_type(tag: &str) -> Option<QuestionType> {
    let key = tag.trim().to_lowercase().replace([' ', '-'], "_");
    QUESTION_TYPES.get(key.as_str()).copied()
}

/// 恰好两个选项且构成是/否对
pub fn is_yes_no_pair(answers: &[String]) -> bool {
    let [first, second] = answers else {
        return false;
    };
    let first = first.trim().to_lowercase();
    let second = second.trim().to_lowercase();
    YES_NO_PAIRS.iter().any(|(yes, no)| {
        (first == *yes && second == *no) || (first == *no && second == *yes)
    })
}

/// 题干中是否出现多选措辞
pub fn has_multi_select_hint(text: &str) -> bool {
    let lowered = text.to_lowercase();
    MULTI_SELECT_HINTS.iter().any(|hint| lowered.contains(hint))
}
