use serde::{Deserialize, Serialize};

/// 表格中的一行（确定性路径的输入）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SheetRow {
    pub row_index: u32,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    /// 类型列（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

impl SheetRow {
    pub fn new(row_index: u32, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            row_index,
            question: question.into(),
            answer: answer.into(),
            type_hint: None,
        }
    }

    /// 题目单元格（空白和 `-` 视为空）
    pub fn question_cell(&self) -> Option<&str> {
        non_empty_cell(&self.question)
    }

    /// 答案单元格（空白和 `-` 视为空）
    pub fn answer_cell(&self) -> Option<&str> {
        non_empty_cell(&self.answer)
    }

    /// 类型单元格（空白和 `-` 视为没有）
    pub fn type_cell(&self) -> Option<&str> {
        self.type_hint.as_deref().and_then(non_empty_cell)
    }

    pub fn is_blank(&self) -> bool {
        self.question_cell().is_none() && self.answer_cell().is_none()
    }
}

fn non_empty_cell(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value)
    }
}

/// 一个 sheet 的全部行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRows {
    pub sheet_name: String,
    #[serde(default)]
    pub rows: Vec<SheetRow>,
}

/// 行分组参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingLimits {
    /// 允许的连续空行数
    pub gap_tolerance: usize,
    /// 从题目行向后最多扫描的行数
    pub max_lookahead: usize,
}

impl Default for GroupingLimits {
    fn default() -> Self {
        Self {
            gap_tolerance: 5,
            max_lookahead: 30,
        }
    }
}

/// scope 的原始内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSource {
    /// 转换后的文本（生成式路径）
    Text(String),
    /// 表格行（确定性路径）
    Rows(Vec<SheetRow>),
}

/// 独立处理单元（一个 sheet 或一个批次）
///
/// 由 `ScopeChunker` 创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: String,
    pub ordinal: usize,
    pub source: ScopeSource,
    pub limits: GroupingLimits,
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        match &self.source {
            ScopeSource::Text(text) => text.trim().is_empty(),
            ScopeSource::Rows(rows) => rows.iter().all(SheetRow::is_blank),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.source {
            ScopeSource::Text(text) => Some(text),
            ScopeSource::Rows(_) => None,
        }
    }

    pub fn rows(&self) -> Option<&[SheetRow]> {
        match &self.source {
            ScopeSource::Rows(rows) => Some(rows),
            ScopeSource::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_cells_count_as_empty() {
        let row = SheetRow::new(4, " - ", "-");
        assert!(row.is_blank());

        let row = SheetRow::new(5, "", "Option B");
        assert_eq!(row.question_cell(), None);
        assert_eq!(row.answer_cell(), Some("Option B"));
    }
}
