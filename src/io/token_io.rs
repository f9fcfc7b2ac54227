//! 词条文件 IO 实现

use std::path::Path;

use super::traits::{TokenFileReader, TokenFileWriter};
use crate::token::TranslationToken;
use crate::utils::Result;

/// 默认的词条文件读写器（缩进格式的 JSON）
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTokenFileIo;

impl TokenFileReader for DefaultTokenFileIo {
    fn read(&self, path: &Path) -> Result<Vec<TranslationToken>> {
        let json = std::fs::read_to_string(path)?;
        let json = json.strip_prefix('\u{feff}').unwrap_or(&json);
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(json)?)
    }
}

impl TokenFileWriter for DefaultTokenFileIo {
    fn write(&self, tokens: &[TranslationToken], path: &Path) -> Result<()> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(tokens)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
