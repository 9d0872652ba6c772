use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 调用错误（生成式抽取 / 打分）
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 响应解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 分块错误
    #[error("分块错误: {0}")]
    Chunk(#[from] ChunkError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求构建失败
    #[error("LLM请求构建失败: {source}")]
    RequestBuildFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 响应解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    /// 找不到外层容器
    #[error("响应中没有找到 <{container}> 容器")]
    NoContainer { container: &'static str },
    /// 容器内结构损坏且没有可恢复的记录
    #[error("响应结构损坏 (位置: {position}): {message}")]
    Malformed { position: u64, message: String },
    /// 打分响应不是合法 JSON
    #[error("打分响应解析失败: {source}")]
    InvalidJudgeJson {
        #[source]
        source: serde_json::Error,
    },
}

/// 分块错误
#[derive(Debug, Error)]
pub enum ChunkError {
    /// 分界正则无法编译
    #[error("分界正则 '{pattern}' 无效: {source}")]
    InvalidBoundaryPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值超出允许范围
    #[error("配置项 {field} 的值 {value} 无效: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    /// 触发短语无法编译成正则
    #[error("触发短语正则 '{pattern}' 无效: {source}")]
    InvalidTriggerPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM请求构建错误
    pub fn llm_request_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Llm(LlmError::RequestBuildFailed {
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
