//! IO 抽象层 - trait 定义

use std::path::Path;

use crate::token::TranslationToken;
use crate::utils::Result;

/// 词条文件读取 trait
///
/// # 职责
/// - 读取提取结果或 Paratranz 导出的 JSON 词条数组
/// - 未知字段（`stage`、`id` 等）忽略
pub trait TokenFileReader {
    /// 读取词条文件
    ///
    /// # 参数
    /// * `path` - JSON 文件路径
    fn read(&self, path: &Path) -> Result<Vec<TranslationToken>>;
}

/// 词条文件写入 trait
///
/// # 职责
/// - 将词条序列化为 JSON 并写入文件系统，必要时创建父目录
pub trait TokenFileWriter {
    /// 写入词条文件
    ///
    /// # 参数
    /// * `tokens` - 要写入的词条
    /// * `path` - 目标文件路径
    fn write(&self, tokens: &[TranslationToken], path: &Path) -> Result<()>;
}
