use crate::error::{AppError, AppResult, FileError};
use crate::models::scope::SheetRows;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 行数据文件的顶层结构
///
/// ```toml
/// [[sheets]]
/// sheet_name = "Supplier"
///
/// [[sheets.rows]]
/// row_index = 2
/// question = "Do you have a code of conduct?"
/// answer = "Yes|No"
/// ```
#[derive(Debug, Deserialize)]
struct RowFile {
    #[serde(default)]
    sheets: Vec<SheetRows>,
}

/// 从 TOML 文件加载确定性路径的行数据
pub async fn load_row_sheets(path: &Path) -> AppResult<Vec<SheetRows>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    let sheets = parse_row_sheets(&content).map_err(|source| FileError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(
        "成功加载 {} 个 sheet，共 {} 行: {}",
        sheets.len(),
        sheets.iter().map(|s| s.rows.len()).sum::<usize>(),
        path.display()
    );

    Ok(sheets)
}

/// 解析行数据 TOML 文本
pub fn parse_row_sheets(content: &str) -> Result<Vec<SheetRows>, toml::de::Error> {
    let file: RowFile = toml::from_str(content)?;
    Ok(file.sheets)
}

/// 读取已转换好的文本（生成式路径的输入）
pub async fn load_converted_text(path: &Path) -> AppResult<String> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

    tracing::info!("已读取 {} 个字符: {}", content.chars().count(), path.display());

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row_sheets() {
        let content = r#"
[[sheets]]
sheet_name = "Supplier"

[[sheets.rows]]
row_index = 2
question = "Do you have a code of conduct?"
answer = "Yes|No"

[[sheets.rows]]
row_index = 3
answer = "Maybe"
type_hint = "single"
"#;
        let sheets = parse_row_sheets(content).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].sheet_name, "Supplier");
        assert_eq!(sheets[0].rows.len(), 2);
        assert_eq!(sheets[0].rows[1].question, "");
        assert_eq!(sheets[0].rows[1].type_hint.as_deref(), Some("single"));
    }

    #[test]
    fn test_parse_row_sheets_rejects_bad_toml() {
        assert!(parse_row_sheets("[[sheets]\nsheet_name = ").is_err());
    }
}
