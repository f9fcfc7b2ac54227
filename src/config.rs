use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::hash_index::DEFAULT_INDEX_FILE_NAME;
use crate::utils::{GdError, Result};

/// 提取/写回配置
///
/// 可以从 JSON 文件加载，缺省字段使用默认值：
///
/// ```json
/// {
///   "fallback_scripts": ["LoadGameScreen", "ModsMenu"],
///   "discarded_functions": ["_legacy_dialog"],
///   "parallel": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// 使用回退模式（按函数切分）处理的脚本，按文件名（不含扩展名）匹配
    pub fallback_scripts: Vec<String>,
    /// 完全跳过的脚本，按文件名（不含扩展名）匹配
    pub skipped_scripts: Vec<String>,
    /// 回退模式下整段丢弃的函数名
    pub discarded_functions: Vec<String>,
    /// 哈希索引文件路径
    pub index_file: PathBuf,
    /// 是否按文件并行处理
    pub parallel: bool,
    /// 扫描时跳过的目录名
    pub exclude_dirs: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fallback_scripts: vec!["LoadGameScreen".to_string(), "ModsMenu".to_string()],
            skipped_scripts: Vec::new(),
            discarded_functions: Vec::new(),
            index_file: PathBuf::from(DEFAULT_INDEX_FILE_NAME),
            parallel: false,
            exclude_dirs: vec![".godot".to_string(), ".import".to_string(), ".git".to_string()],
        }
    }
}

impl ExtractorConfig {
    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        log::debug!("已加载配置: {}", path.display());
        Ok(config)
    }

    /// 保存为 JSON 文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_file.as_os_str().is_empty() {
            return Err(GdError::Config("index_file 不能为空".to_string()));
        }
        if let Some(name) = self.fallback_scripts.iter().find(|n| self.skipped_scripts.contains(n)) {
            return Err(GdError::Config(format!(
                "脚本 {} 同时出现在 fallback_scripts 与 skipped_scripts 中",
                name
            )));
        }
        Ok(())
    }

    /// 该脚本是否使用回退模式
    pub fn is_fallback(&self, stem: &str) -> bool {
        self.fallback_scripts.iter().any(|s| s == stem)
    }

    /// 该脚本是否跳过
    pub fn is_skipped(&self, stem: &str) -> bool {
        self.skipped_scripts.iter().any(|s| s == stem)
    }

    /// 该目录是否不参与扫描
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }
}
