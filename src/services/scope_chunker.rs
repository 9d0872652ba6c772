//! Scope 分块服务 - 业务能力层
//!
//! 把转换后的整份文本按 sheet 标题切成互相独立的 scope，
//! 每个 scope 单独调用、单独失败。纯函数，无副作用。

use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppResult, ChunkError};
use crate::models::scope::{GroupingLimits, Scope, ScopeSource, SheetRows};

/// Scope 分块器
pub struct ScopeChunker {
    boundary: Regex,
    default_name: String,
    limits: GroupingLimits,
    max_rows_per_scope: usize,
}

impl ScopeChunker {
    /// 创建分块器，分界正则无效时报错
    pub fn new(
        boundary_pattern: &str,
        default_name: impl Into<String>,
        limits: GroupingLimits,
        max_rows_per_scope: usize,
    ) -> AppResult<Self> {
        let boundary =
            Regex::new(boundary_pattern).map_err(|source| ChunkError::InvalidBoundaryPattern {
                pattern: boundary_pattern.to_string(),
                source,
            })?;

        Ok(Self {
            boundary,
            default_name: default_name.into(),
            limits,
            max_rows_per_scope: max_rows_per_scope.max(1),
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            &config.scope_boundary_pattern,
            config.default_scope_name.clone(),
            GroupingLimits {
                gap_tolerance: config.gap_tolerance,
                max_lookahead: config.max_lookahead,
            },
            config.max_rows_per_scope,
        )
    }

    /// 按分界行切分文本
    ///
    /// 分界行本身不属于任何 scope；第一个分界之前的非空内容归入默认名 scope；
    /// 内容为空的 scope 直接丢弃。
    pub fn chunk_text(&self, text: &str) -> Vec<Scope> {
        let mut sections: Vec<(String, Vec<&str>)> = vec![(self.default_name.clone(), Vec::new())];

        for line in text.lines() {
            if let Some(name) = self.boundary_name(line) {
                sections.push((name, Vec::new()));
            } else if let Some((_, lines)) = sections.last_mut() {
                lines.push(line);
            }
        }

        let mut scopes = Vec::new();
        for (name, lines) in sections {
            for (batch_name, content) in self.split_table(&name, &lines) {
                let scope = Scope {
                    name: batch_name,
                    ordinal: scopes.len(),
                    source: ScopeSource::Text(content),
                    limits: self.limits,
                };
                if scope.is_empty() {
                    debug!("丢弃空 scope: {}", scope.name);
                    continue;
                }
                scopes.push(scope);
            }
        }

        debug!("文本切分为 {} 个 scope", scopes.len());
        scopes
    }

    /// 每个 sheet 的行数据成为一个 scope，没有任何非空单元格的 sheet 丢弃
    pub fn chunk_rows(&self, sheets: Vec<SheetRows>) -> Vec<Scope> {
        let mut scopes = Vec::new();
        for sheet in sheets {
            let scope = Scope {
                name: sheet.sheet_name,
                ordinal: scopes.len(),
                source: ScopeSource::Rows(sheet.rows),
                limits: self.limits,
            };
            if scope.is_empty() {
                debug!("丢弃空 sheet: {}", scope.name);
                continue;
            }
            scopes.push(scope);
        }
        scopes
    }

    fn boundary_name(&self, line: &str) -> Option<String> {
        let captures = self.boundary.captures(line)?;
        let name = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            Some(self.default_name.clone())
        } else {
            Some(name)
        }
    }

    /// 超过行数上限的 markdown 表格拆成多个批次，每批重复表头
    fn split_table(&self, name: &str, lines: &[&str]) -> Vec<(String, String)> {
        let whole = || vec![(name.to_string(), lines.join("\n"))];

        let Some(header_at) = find_table_header(lines) else {
            return whole();
        };
        let data_rows: Vec<&str> = lines[header_at + 2..]
            .iter()
            .copied()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if data_rows.len() <= self.max_rows_per_scope {
            return whole();
        }

        let prefix = &lines[..header_at];
        let header = &lines[header_at..header_at + 2];
        let chunks: Vec<&[&str]> = data_rows.chunks(self.max_rows_per_scope).collect();
        let total = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(index, rows)| {
                let mut content: Vec<&str> = Vec::new();
                if index == 0 {
                    content.extend_from_slice(prefix);
                }
                content.extend_from_slice(header);
                content.extend_from_slice(rows);
                (format!("{} [{}/{}]", name, index + 1, total), content.join("\n"))
            })
            .collect()
    }
}

/// 找到表头行：以 `|` 开头且下一行是分隔行
fn find_table_header(lines: &[&str]) -> Option<usize> {
    lines.windows(2).position(|pair| {
        pair[0].trim_start().starts_with('|') && is_separator_row(pair[1])
    })
}

fn is_separator_row(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('|')
        && line.contains("---")
        && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}
