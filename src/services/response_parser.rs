//! 响应解析服务 - 业务能力层
//!
//! 把一个 scope 的 LLM 原始响应解析成未解析引用的题目列表。
//!
//! ## 两种文法
//!
//! - **Rich**：`<q>` 下有 `<text>` / `<help_text>` / `<answers>` / `<dependencies>` 等子元素
//! - **Legacy**：`<q>` 的文本就是题干，选项以 `(A|B|C)` 内联在题干末尾
//!
//! 先探测文法，再按对应规则解析。
//!
//! ## 截断恢复
//!
//! 响应可能因输出长度限制被截断：容器没有闭合时补上闭合标签再解析，
//! 截断点之前完整的记录保留，截断点上不完整的记录丢弃。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::models::question::{
    DependencyAction, LocalRef, QuestionCandidate, QuestionType, RawDependency,
};

const CONTAINER_OPEN: &str = "<questions";
const CONTAINER_CLOSE: &str = "</questions>";
const RICH_MARKERS: [&str; 4] = ["<text>", "<help_text", "<answers", "<dependencies"];

/// 响应文法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// 带子元素的结构化记录
    Rich,
    /// 选项内联在题干中
    Legacy,
}

impl Grammar {
    /// 探测容器内是否出现 rich 子元素
    pub fn detect(xml: &str) -> Self {
        if RICH_MARKERS.iter().any(|marker| xml.contains(marker)) {
            Grammar::Rich
        } else {
            Grammar::Legacy
        }
    }
}

/// 单个 scope 的解析结果
#[derive(Debug)]
pub struct ParseOutcome {
    pub candidates: Vec<QuestionCandidate>,
    pub grammar: Option<Grammar>,
    /// 响应被截断或中途结构损坏，只保留了之前的完整记录
    pub truncated: bool,
    /// 整体失败（没有容器，或损坏且没有恢复出任何记录）
    pub failure: Option<ParseError>,
}

impl ParseOutcome {
    fn failed(error: ParseError) -> Self {
        Self {
            candidates: Vec::new(),
            grammar: None,
            truncated: false,
            failure: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// 响应解析器（无状态）
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析一个 scope 的响应，不会向外抛错
    pub fn parse(&self, scope_name: &str, response: &str) -> ParseOutcome {
        let Some(start) = response.find(CONTAINER_OPEN) else {
            warn!("[Scope {}] ⚠️ 响应中没有 <questions> 容器", scope_name);
            return ParseOutcome::failed(ParseError::NoContainer {
                container: "questions",
            });
        };

        let (xml, closed) = match response.rfind(CONTAINER_CLOSE) {
            Some(end) if end > start => (
                response[start..end + CONTAINER_CLOSE.len()].to_string(),
                true,
            ),
            _ => {
                warn!("[Scope {}] ⚠️ 容器未闭合，尝试补全后恢复", scope_name);
                (format!("{}{}", &response[start..], CONTAINER_CLOSE), false)
            }
        };

        let grammar = Grammar::detect(&xml);
        debug!("[Scope {}] 文法: {:?}", scope_name, grammar);

        let scan = scan_records(&xml, grammar);
        let truncated = !closed || scan.error.is_some();

        if let Some((position, message)) = &scan.error {
            warn!(
                "[Scope {}] ⚠️ 解析在位置 {} 中断 ({})，保留 {} 条完整记录",
                scope_name,
                position,
                message,
                scan.candidates.len()
            );
        }

        if truncated && scan.candidates.is_empty() {
            let (position, message) = scan
                .error
                .unwrap_or_else(|| (xml.len() as u64, "截断前没有完整记录".to_string()));
            return ParseOutcome::failed(ParseError::Malformed { position, message });
        }

        debug!(
            "[Scope {}] 解析出 {} 条记录",
            scope_name,
            scan.candidates.len()
        );

        ParseOutcome {
            candidates: scan.candidates,
            grammar: Some(grammar),
            truncated,
            failure: None,
        }
    }
}

// ========== 记录扫描 ==========

struct Scan {
    candidates: Vec<QuestionCandidate>,
    error: Option<(u64, String)>,
}

/// 当前所在的子元素
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Text,
    HelpText,
    Option,
    Input { answer: String },
}

/// 正在构建的一条记录，只有遇到 `</q>` 才会产出
#[derive(Debug, Default)]
struct RecordBuilder {
    type_attr: Option<String>,
    row_attr: Option<String>,
    inline_text: String,
    text: Option<String>,
    help_text: Option<String>,
    answers: Vec<String>,
    conditional_inputs: BTreeMap<String, String>,
    dependencies: Vec<RawDependency>,
    field: Option<Field>,
    /// 字段内部嵌套的未知元素层数（如 `<b>`）
    nested: usize,
    buffer: String,
}

impl RecordBuilder {
    fn open(start: &BytesStart) -> Self {
        Self {
            type_attr: attr(start, b"type"),
            row_attr: attr(start, b"row"),
            ..Self::default()
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.field.is_some() {
            self.buffer.push_str(text);
        } else {
            self.inline_text.push_str(text);
        }
    }

    fn enter(&mut self, start: &BytesStart) {
        if self.field.is_some() {
            self.nested += 1;
            return;
        }
        let field = match start.name().as_ref() {
            b"text" => Some(Field::Text),
            b"help_text" => Some(Field::HelpText),
            b"option" => Some(Field::Option),
            b"input" => Some(Field::Input {
                answer: attr(start, b"answer").unwrap_or_default(),
            }),
            b"depends_on" => {
                self.dependencies.push(dependency_from(start));
                None
            }
            _ => None,
        };
        if field.is_some() {
            self.field = field;
            self.buffer.clear();
        }
    }

    fn leave(&mut self) {
        if self.nested > 0 {
            self.nested -= 1;
            return;
        }
        let Some(field) = self.field.take() else {
            return;
        };
        let value = self.buffer.trim().to_string();
        self.buffer.clear();

        match field {
            Field::Text => self.text = Some(value),
            Field::HelpText => self.help_text = Some(value).filter(|v| !v.is_empty()),
            Field::Option => {
                if !value.is_empty() {
                    self.answers.push(value);
                }
            }
            Field::Input { answer } => {
                let answer = answer.trim().to_string();
                if !answer.is_empty() && !value.is_empty() {
                    self.conditional_inputs.insert(answer, value);
                }
            }
        }
    }

    fn finish(
        self,
        grammar: Grammar,
        position: u32,
        seen_rows: &mut Vec<u32>,
    ) -> Option<QuestionCandidate> {
        let question_type = self
            .type_attr
            .as_deref()
            .map(QuestionType::from_tag)
            .unwrap_or_default();

        match grammar {
            Grammar::Legacy => {
                let mut text = self.inline_text.trim().to_string();
                let mut answers = Vec::new();
                if question_type.is_choice() {
                    if let Some((open, options)) = inline_options(&text) {
                        text = text[..open].trim().to_string();
                        answers = options;
                    }
                }
                if text.is_empty() {
                    return None;
                }
                Some(
                    QuestionCandidate::new(LocalRef::Seq(position), text)
                        .with_type(question_type)
                        .with_answers(answers),
                )
            }
            Grammar::Rich => {
                let text = self.text.filter(|t| !t.is_empty())?;
                let row = self
                    .row_attr
                    .as_deref()
                    .and_then(|r| r.trim().parse::<u32>().ok());
                let local_ref = match row {
                    Some(row) if !seen_rows.contains(&row) => {
                        seen_rows.push(row);
                        LocalRef::Row(row)
                    }
                    _ => LocalRef::Seq(position),
                };

                let mut candidate = QuestionCandidate::new(local_ref, text)
                    .with_type(question_type)
                    .with_answers(self.answers);
                candidate.row_index = row;
                candidate.help_text = self.help_text;
                candidate.conditional_inputs = self.conditional_inputs;
                candidate.dependencies = self.dependencies;
                Some(candidate)
            }
        }
    }
}

fn scan_records(xml: &str, grammar: Grammar) -> Scan {
    // 不裁剪文本事件，混合内容之间的空格由字段结束时统一处理
    let mut reader = Reader::from_str(xml);

    let mut candidates = Vec::new();
    let mut seen_rows = Vec::new();
    let mut record: Option<RecordBuilder> = None;
    let mut position: u32 = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if let Some(builder) = record.as_mut() {
                    builder.enter(&start);
                } else if start.name().as_ref() == b"q" {
                    record = Some(RecordBuilder::open(&start));
                }
            }
            Ok(Event::Empty(start)) => {
                if let Some(builder) = record.as_mut() {
                    if start.name().as_ref() == b"depends_on" {
                        builder.dependencies.push(dependency_from(&start));
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(builder) = record.as_mut() {
                    let value = text
                        .unescape()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    builder.push_text(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(builder) = record.as_mut() {
                    builder.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(end)) => match end.name().as_ref() {
                b"q" => {
                    if let Some(builder) = record.take() {
                        position += 1;
                        if let Some(candidate) = builder.finish(grammar, position, &mut seen_rows)
                        {
                            candidates.push(candidate);
                        }
                    }
                }
                b"questions" => break,
                _ => {
                    if let Some(builder) = record.as_mut() {
                        builder.leave();
                    }
                }
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Scan {
                    candidates,
                    error: Some((reader.buffer_position(), e.to_string())),
                };
            }
        }
    }

    Scan {
        candidates,
        error: None,
    }
}

/// 读取属性值，转义失败时退回原始字节
fn attr(start: &BytesStart, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

fn dependency_from(start: &BytesStart) -> RawDependency {
    let target = attr(start, b"question_row")
        .filter(|v| !v.trim().is_empty())
        .or_else(|| attr(start, b"question_id"))
        .unwrap_or_default();

    RawDependency {
        target: LocalRef::parse_target(&target),
        answer_value: attr(start, b"answer_value"),
        action: attr(start, b"action")
            .map(|a| DependencyAction::from_attr(&a))
            .unwrap_or_default(),
        condition_type: attr(start, b"condition_type")
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "equals".to_string()),
        original_text: attr(start, b"original_text"),
    }
}

/// 从题干最后一组括号里读出 `|` 分隔的选项，同时返回左括号位置
fn inline_options(text: &str) -> Option<(usize, Vec<String>)> {
    let (open, close) = (text.rfind('(')?, text.rfind(')')?);
    if open >= close {
        return None;
    }
    let inner = &text[open + 1..close];
    if !inner.contains('|') {
        return None;
    }
    let options: Vec<String> = inner
        .split('|')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();
    (!options.is_empty()).then_some((open, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RICH: &str = r#"Here you go:
<questions>
  <q type="single_choice" row="2" sheet="Sheet1">
    <text>What is your industry?</text>
    <help_text>Please select one</help_text>
    <answers><option>Manufacturing</option><option>Services</option></answers>
    <dependencies></dependencies>
  </q>
  <q type="yes_no" row="5" sheet="Sheet1">
    <text>Do you have sustainability certifications?</text>
    <help_text></help_text>
    <answers><option>Yes</option><option>No</option></answers>
    <conditional_inputs><input answer="Yes">please provide detail</input><input answer="">ignored</input></conditional_inputs>
    <dependencies><depends_on question_row="2" answer_value="Services" action="skip"/></dependencies>
  </q>
</questions>
trailing chatter"#;

    #[test]
    fn test_detect_grammar() {
        assert_eq!(Grammar::detect(RICH), Grammar::Rich);
        assert_eq!(
            Grammar::detect(r#"<questions><q type="yes_no">Ok? (Yes|No)</q></questions>"#),
            Grammar::Legacy
        );
    }

    #[test]
    fn test_parse_rich_records() {
        let outcome = ResponseParser::new().parse("S", RICH);
        assert!(!outcome.is_failed());
        assert!(!outcome.truncated);
        assert_eq!(outcome.grammar, Some(Grammar::Rich));
        assert_eq!(outcome.candidates.len(), 2);

        let first = &outcome.candidates[0];
        assert_eq!(first.local_ref, LocalRef::Row(2));
        assert_eq!(first.row_index, Some(2));
        assert_eq!(first.question_type, QuestionType::SingleChoice);
        assert_eq!(first.answers, vec!["Manufacturing", "Services"]);
        assert_eq!(first.help_text.as_deref(), Some("Please select one"));
        assert!(first.dependencies.is_empty());

        let second = &outcome.candidates[1];
        assert_eq!(second.help_text, None);
        assert_eq!(second.conditional_inputs.len(), 1);
        assert_eq!(
            second.conditional_inputs.get("Yes").map(String::as_str),
            Some("please provide detail")
        );
        assert_eq!(second.dependencies.len(), 1);
        let dep = &second.dependencies[0];
        assert_eq!(dep.target, LocalRef::Row(2));
        assert_eq!(dep.answer_value.as_deref(), Some("Services"));
        assert_eq!(dep.action, DependencyAction::Skip);
        assert_eq!(dep.condition_type, "equals");
    }

    #[test]
    fn test_parse_legacy_inline_options() {
        let response = r#"<questions>
  <q type="single_choice">Which region? (North | South|East)</q>
  <q type="open_ended">Describe your process (optional|short)</q>
  <q type="weird">Anything else?</q>
</questions>"#;
        let outcome = ResponseParser::new().parse("S", response);
        assert_eq!(outcome.grammar, Some(Grammar::Legacy));
        assert_eq!(outcome.candidates.len(), 3);

        assert_eq!(outcome.candidates[0].answers, vec!["North", "South", "East"]);
        assert_eq!(outcome.candidates[0].text, "Which region?");
        assert_eq!(outcome.candidates[0].local_ref, LocalRef::Seq(1));
        assert_eq!(outcome.candidates[0].row_index, None);
        // 非选择题不解析括号
        assert!(outcome.candidates[1].answers.is_empty());
        assert_eq!(outcome.candidates[1].text, "Describe your process (optional|short)");
        assert_eq!(outcome.candidates[2].question_type, QuestionType::OpenEnded);
    }

    #[test]
    fn test_legacy_yes_no_drops_option_group_from_text() {
        let outcome = ResponseParser::new().parse(
            "S",
            r#"<questions><q type="yes_no">Do you export? (Yes|No)</q></questions>"#,
        );
        assert_eq!(outcome.candidates[0].text, "Do you export?");
        assert_eq!(outcome.candidates[0].answers, vec!["Yes", "No"]);
    }

    #[test]
    fn test_rich_text_keeps_inline_markup_content() {
        let response = r#"<questions>
  <q type="open_ended" row="2"><text>Do you <b>export</b> goods?</text><help_text>See <i>annex</i> B</help_text></q>
</questions>"#;
        let outcome = ResponseParser::new().parse("S", response);
        let candidate = &outcome.candidates[0];
        assert_eq!(candidate.text, "Do you export goods?");
        assert_eq!(candidate.help_text.as_deref(), Some("See annex B"));
    }

    #[test]
    fn test_truncated_response_keeps_complete_records_only() {
        let response = r#"<questions>
  <q type="open_ended" row="2"><text>First?</text><answers></answers></q>
  <q type="open_ended" row="3"><text>Second?</text></q>
  <q type="yes_no" row="4"><text>Third is cut"#;
        let outcome = ResponseParser::new().parse("S", response);
        assert!(!outcome.is_failed());
        assert!(outcome.truncated);
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[1].text, "Second?");
    }

    #[test]
    fn test_truncated_inside_attribute() {
        let response = r#"<questions><q type="open_ended" row="2"><text>Only</text></q><q type="yes_"#;
        let outcome = ResponseParser::new().parse("S", response);
        assert!(!outcome.is_failed());
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn test_truncated_without_any_record_fails() {
        let outcome =
            ResponseParser::new().parse("S", r#"<questions><q type="open_ended"><text>cut"#);
        assert!(outcome.is_failed());
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_missing_container_fails() {
        let outcome = ResponseParser::new().parse("S", "I could not find any questions.");
        assert!(matches!(
            outcome.failure,
            Some(ParseError::NoContainer { .. })
        ));
    }

    #[test]
    fn test_empty_container_is_not_a_failure() {
        let outcome = ResponseParser::new().parse("S", "<questions></questions>");
        assert!(!outcome.is_failed());
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_duplicate_and_missing_rows_fall_back_to_sequence() {
        let response = r#"<questions>
  <q row="7"><text>A</text></q>
  <q row="7"><text>B</text></q>
  <q><text>C</text></q>
</questions>"#;
        let outcome = ResponseParser::new().parse("S", response);
        let refs: Vec<LocalRef> = outcome
            .candidates
            .iter()
            .map(|c| c.local_ref.clone())
            .collect();
        assert_eq!(
            refs,
            vec![LocalRef::Row(7), LocalRef::Seq(2), LocalRef::Seq(3)]
        );
        assert_eq!(outcome.candidates[1].row_index, Some(7));
    }

    #[test]
    fn test_rich_record_without_text_is_skipped() {
        let response = r#"<questions>
  <q row="2"><help_text>orphan</help_text></q>
  <q row="3"><text>Kept</text></q>
</questions>"#;
        let outcome = ResponseParser::new().parse("S", response);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].text, "Kept");
    }

    #[test]
    fn test_non_numeric_dependency_target_is_label() {
        let response = r#"<questions>
  <q row="2"><text>A</text><dependencies><depends_on question_id="abc" action="show"/></dependencies></q>
</questions>"#;
        let outcome = ResponseParser::new().parse("S", response);
        assert_eq!(
            outcome.candidates[0].dependencies[0].target,
            LocalRef::Label("abc".to_string())
        );
    }
}
