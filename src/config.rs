use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的 scope 数量（外部 LLM 限流的透传值）
    pub max_concurrent_scopes: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    // --- 打分（judge）配置 ---
    pub judge_model_name: String,
    pub judge_max_tokens: u32,
    pub judge_temperature: f32,
    /// 每批送去打分的题目数
    pub judge_batch_size: usize,
    /// 低置信度阈值
    pub confidence_threshold: f64,
    // --- 分组 / 分块 ---
    /// 一道题内允许的连续空行数
    pub gap_tolerance: usize,
    /// 从题目行向后最多扫描的行数
    pub max_lookahead: usize,
    /// 单个 scope 最多包含的表格数据行
    pub max_rows_per_scope: usize,
    /// sheet 分界正则（按行匹配，第一个捕获组为 sheet 名）
    pub scope_boundary_pattern: String,
    /// 没有分界时使用的默认 scope 名
    pub default_scope_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_scopes: 4,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_max_tokens: 24576,
            llm_temperature: 0.1,
            judge_model_name: "gpt-4o-mini".to_string(),
            judge_max_tokens: 1024,
            judge_temperature: 0.0,
            judge_batch_size: 10,
            confidence_threshold: 0.7,
            gap_tolerance: 5,
            max_lookahead: 30,
            max_rows_per_scope: 100,
            scope_boundary_pattern: r"^##\s+(.+?)\s*$".to_string(),
            default_scope_name: "Sheet1".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_scopes: std::env::var("MAX_CONCURRENT_SCOPES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_scopes),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_tokens),
            llm_temperature: default.llm_temperature,
            judge_model_name: std::env::var("JUDGE_MODEL_NAME").unwrap_or(default.judge_model_name),
            judge_max_tokens: default.judge_max_tokens,
            judge_temperature: default.judge_temperature,
            judge_batch_size: std::env::var("JUDGE_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.judge_batch_size),
            confidence_threshold: std::env::var("CONFIDENCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.confidence_threshold),
            gap_tolerance: std::env::var("GAP_TOLERANCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gap_tolerance),
            max_lookahead: std::env::var("MAX_LOOKAHEAD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_lookahead),
            max_rows_per_scope: std::env::var("MAX_ROWS_PER_SCOPE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_rows_per_scope),
            scope_boundary_pattern: std::env::var("SCOPE_BOUNDARY_PATTERN").unwrap_or(default.scope_boundary_pattern),
            default_scope_name: std::env::var("DEFAULT_SCOPE_NAME").unwrap_or(default.default_scope_name),
        }
    }

    /// 检查数值配置是否可用
    pub fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_scopes == 0 {
            return Err(invalid("max_concurrent_scopes", self.max_concurrent_scopes, "必须大于 0"));
        }
        if self.judge_batch_size == 0 {
            return Err(invalid("judge_batch_size", self.judge_batch_size, "必须大于 0"));
        }
        if self.max_rows_per_scope == 0 {
            return Err(invalid("max_rows_per_scope", self.max_rows_per_scope, "必须大于 0"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("confidence_threshold", self.confidence_threshold, "必须在 [0, 1] 之间"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> crate::error::AppError {
    ConfigError::InvalidValue {
        field,
        value: value.to_string(),
        reason,
    }
    .into()
}
