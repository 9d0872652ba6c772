//! LLM 服务 - 业务能力层
//!
//! 外部调用的生产实现：生成式抽取和批量打分，不关心流程。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! 不做重试：调用失败原样返回，由调用方按 scope 失败处理。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::services::clients::{Evaluation, ExtractionClient, ScoringClient, ScoringItem};
use crate::services::confidence_batcher::parse_evaluations;

/// 单次调用使用的模型参数
#[derive(Debug, Clone)]
struct CallProfile {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

/// LLM 服务
///
/// 职责：
/// - 按 scope 调用抽取模型，返回原始文本
/// - 按批调用打分模型，返回解析后的评估
/// - 不解析题目，不分配标识
pub struct LlmService {
    client: Client<OpenAIConfig>,
    extraction: CallProfile,
    judge: CallProfile,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            extraction: CallProfile {
                model: config.llm_model_name.clone(),
                max_tokens: config.llm_max_tokens,
                temperature: config.llm_temperature,
            },
            judge: CallProfile {
                model: config.judge_model_name.clone(),
                max_tokens: config.judge_max_tokens,
                temperature: config.judge_temperature,
            },
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 返回
    /// LLM 的响应内容（去掉首尾空白）
    async fn send_to_llm(
        &self,
        profile: &CallProfile,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", profile.model);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(AppError::llm_request_failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(AppError::llm_request_failed)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&profile.model)
            .messages(messages)
            .temperature(profile.temperature)
            .max_tokens(profile.max_tokens)
            .build()
            .map_err(AppError::llm_request_failed)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&profile.model, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: profile.model.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

impl ExtractionClient for LlmService {
    async fn extract(&self, scope_name: &str, scope_text: &str) -> AppResult<String> {
        let prompt = build_extraction_prompt(scope_name, scope_text);
        self.send_to_llm(&self.extraction, &prompt, Some(EXTRACTION_SYSTEM_MESSAGE))
            .await
    }
}

impl ScoringClient for LlmService {
    async fn score(&self, items: &[ScoringItem]) -> AppResult<Vec<Evaluation>> {
        let prompt = build_scoring_prompt(items);
        let reply = self.send_to_llm(&self.judge, &prompt, None).await?;
        parse_evaluations(&reply)
    }
}

const EXTRACTION_SYSTEM_MESSAGE: &str =
    "You extract survey questions from spreadsheet content and answer only with XML.";

/// 抽取 prompt（富语法）
fn build_extraction_prompt(scope_name: &str, scope_text: &str) -> String {
    format!(
        r#"Extract ALL questions from the survey sheet "{sheet}".

EXTRACTION RULES
- Extract every question fully: interrogative sentences, imperative requests for information, and table rows asking for input.
- Answer options (including Yes/No) go into <answers>, one <option> each, in the order they appear.
- single_choice allows one option, multiple_choice allows several, yes_no only Yes or No,
  open_ended has no options, grouped_question has subquestions ("Main question: Subquestion").
  numeric, integer and decimal are for number inputs.
- When an option opens a follow-up prompt, add <input answer="OPTION">prompt</input> under <conditional_inputs>.
- When a question is only shown for a certain answer of another question, add
  <depends_on question_row="ROW" answer_value="ANSWER" action="show"/> under <dependencies>.
  Use action="skip" when that answer skips the question.
- Use the spreadsheet row number for row and question_row.

CONTENT:
{content}

OUTPUT FORMAT:
<questions>
  <q type="single_choice" row="12" sheet="{sheet}">
    <text>Question text</text>
    <help_text>Optional guidance</help_text>
    <answers><option>Option A</option><option>Option B</option></answers>
    <conditional_inputs><input answer="Option B">Please specify</input></conditional_inputs>
    <dependencies><depends_on question_row="11" answer_value="Yes" action="show" condition_type="equals" original_text="If yes"/></dependencies>
  </q>
</questions>

Omit empty elements. Return ONLY the XML."#,
        sheet = scope_name,
        content = scope_text
    )
}

/// 打分 prompt，要求按序号返回 JSON
fn build_scoring_prompt(items: &[ScoringItem]) -> String {
    let mut listing = String::new();
    for item in items {
        listing.push_str(&format!("{}. {}", item.item, item.question_text));
        if !item.answers.is_empty() {
            listing.push_str(&format!(" Answers: {}", item.answers.join(", ")));
        }
        listing.push('\n');
    }

    format!(
        r#"You are a question quality validator. For each item below, assess:
1. Is this a valid survey question? (not a comment, instruction, or header)
2. How confident are you that this is a properly formatted question? (0.0-1.0)

Items to evaluate:
{listing}
Respond in JSON format:
{{
  "evaluations": [
    {{"item": 1, "is_valid": true, "confidence": 0.95, "reason": "Clear question with options"}},
    {{"item": 2, "is_valid": false, "confidence": 0.2, "reason": "This is a section header, not a question"}}
  ]
}}

Evaluate ALL {count} items in order. Return ONLY the JSON."#,
        listing = listing,
        count = items.len()
    )
}
