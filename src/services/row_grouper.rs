//! 行分组服务 - 业务能力层（仅确定性路径）
//!
//! 把一个 scope 内"题目行 + 若干续行"合并成一道多选项题目。
//!
//! - 题目列非空的行开始一道新题
//! - 题目列为空、答案列非空的行是续行，答案追加为选项
//! - 连续全空行最多容忍 `gap_tolerance` 行
//! - 从题目行向后最多扫描 `max_lookahead` 行
//!
//! 结果只取决于行内容和这两个参数。

use crate::models::question::{LocalRef, QuestionCandidate, QuestionType};
use crate::models::scope::{GroupingLimits, SheetRow};
use crate::services::lexicon;

/// 行分组器
#[derive(Debug, Clone, Copy)]
pub struct RowGrouper {
    limits: GroupingLimits,
}

impl RowGrouper {
    pub fn new(limits: GroupingLimits) -> Self {
        Self { limits }
    }

    /// 扫描行并分组
    pub fn group(&self, rows: &[SheetRow]) -> Vec<QuestionCandidate> {
        let mut candidates = Vec::new();
        let mut seen_rows: Vec<u32> = Vec::new();
        let mut index = 0;

        while index < rows.len() {
            let row = &rows[index];

            let (text, mut answers, continues) = if let Some(question) = row.question_cell() {
                (question, split_answer_cell(row.answer_cell()), true)
            } else if let Some(answer) = row.answer_cell() {
                // 前面没有可挂靠的题目，单独成题
                (answer, Vec::new(), false)
            } else {
                index += 1;
                continue;
            };

            let mut next = index + 1;
            if continues {
                let mut gap = 0;
                while next < rows.len() && next - index <= self.limits.max_lookahead {
                    let follower = &rows[next];
                    if follower.question_cell().is_some() {
                        break;
                    }
                    match follower.answer_cell() {
                        Some(answer) => {
                            answers.push(answer.to_string());
                            gap = 0;
                        }
                        None => {
                            gap += 1;
                            if gap > self.limits.gap_tolerance {
                                break;
                            }
                        }
                    }
                    next += 1;
                }
            }

            let local_ref = if seen_rows.contains(&row.row_index) {
                LocalRef::Seq(candidates.len() as u32 + 1)
            } else {
                seen_rows.push(row.row_index);
                LocalRef::Row(row.row_index)
            };

            let question_type = infer_type(text, &answers, row.type_cell());
            let mut candidate = QuestionCandidate::new(local_ref, text)
                .with_type(question_type)
                .with_answers(answers);
            candidate.row_index = Some(row.row_index);
            candidates.push(candidate);

            index = next;
        }

        candidates
    }
}

impl Default for RowGrouper {
    fn default() -> Self {
        Self::new(GroupingLimits::default())
    }
}

/// 题目行自带的答案单元格：优先按 `|` 拆，其次按换行拆
fn split_answer_cell(cell: Option<&str>) -> Vec<String> {
    let Some(cell) = cell else {
        return Vec::new();
    };
    let parts: Vec<&str> = if cell.contains('|') {
        cell.split('|').collect()
    } else {
        cell.lines().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// 类型推断：类型列 > 是/否对 > 多选措辞 > 单选
///
/// 只要有类型列就以它为准，无法识别的类型值按 open_ended 处理。
fn infer_type(text: &str, answers: &[String], type_hint: Option<&str>) -> QuestionType {
    if let Some(tag) = type_hint {
        return QuestionType::from_tag(tag);
    }
    if answers.is_empty() {
        QuestionType::OpenEnded
    } else if lexicon::is_yes_no_pair(answers) {
        QuestionType::YesNo
    } else if answers.len() >= 2 && lexicon::has_multi_select_hint(text) {
        QuestionType::MultipleChoice
    } else {
        QuestionType::SingleChoice
    }
}
