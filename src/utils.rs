use thiserror::Error;
use std::fmt::Write as _;
use std::path::Path;

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum GdError {
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GdError>;

/// 资源路径前缀，这类字符串是标识符而不是界面文本
const PATH_PREFIXES: &[&str] = &["res://", "user://"];

/// 字符串验证：空白字符串与资源路径不可翻译
pub fn is_translatable_text(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    !PATH_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

/// 计算字符串的 MD5 指纹（大写十六进制）
pub fn md5_hex(input: &str) -> String {
    let digest = md5::compute(input.as_bytes());
    let mut hex = String::with_capacity(32);
    for b in digest.iter() {
        let _ = write!(hex, "{b:02X}");
    }
    hex
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<std::path::PathBuf> {
    if !file_path.exists() {
        return Err(GdError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "原文件不存在",
        )));
    }

    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let extension = file_path
        .extension()
        .map(|ext| format!("{}.{}.bak", ext.to_string_lossy(), timestamp))
        .unwrap_or_else(|| format!("{}.bak", timestamp));
    let backup_path = file_path.with_extension(extension);

    std::fs::copy(file_path, &backup_path)?;

    Ok(backup_path)
}

/// 统一换行符并去掉 UTF-8 BOM
pub fn normalize_source(content: &str) -> String {
    content
        .strip_prefix('\u{feff}')
        .unwrap_or(content)
        .replace("\r\n", "\n")
}
