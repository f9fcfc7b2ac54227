use serde::{Deserialize, Serialize};

use crate::utils::md5_hex;

/// 源码中一次出现的位置
///
/// 行号从 1 开始；列号按字符计数、从 0 开始，`end_column` 为开区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPosition {
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl TokenPosition {
    pub fn new(start_line: usize, end_line: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            start_line,
            end_line,
            start_column,
            end_column,
        }
    }
}

impl std::fmt::Display for TokenPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// 可翻译词条
///
/// 与 Paratranz 的 JSON 词条格式一一对应：
/// - 提取时：`translation` 为空
/// - 应用时：`translation` 为要写回源码的文本
///
/// 词条的真正身份是 [`hash_id`](Self::hash_id)（`original + context` 的 MD5），
/// `key` 只是便于阅读的别名。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationToken {
    /// 显示用键：`{prefix}_{index}`
    #[serde(default)]
    pub key: String,
    /// 原文
    #[serde(default)]
    pub original: String,
    /// 译文
    #[serde(default)]
    pub translation: String,
    /// 所在语句的完整文本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// 节点类型标签（仅供参考）
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// 该指纹在文件中的所有出现位置
    #[serde(skip)]
    pub nodes: Vec<TokenPosition>,
}

impl TranslationToken {
    /// 创建新的词条（key 由哈希索引稍后分配）
    pub fn new(original: impl Into<String>, context: Option<String>) -> Self {
        Self {
            original: original.into(),
            context,
            ..Default::default()
        }
    }

    /// 设置类型标签
    pub fn with_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// 内容指纹：MD5(original + context)
    pub fn hash_id(&self) -> String {
        let context = self.context.as_deref().unwrap_or_default();
        md5_hex(&format!("{}{}", self.original, context))
    }

    /// 设置显示用键
    pub fn set_key(&mut self, prefix: &str, index: u64) {
        self.key = format!("{}_{}", prefix, index);
    }

    /// 是否带有可应用的译文（非空白且与原文不同）
    pub fn has_translation(&self) -> bool {
        !self.translation.trim().is_empty() && self.translation != self.original
    }
}
