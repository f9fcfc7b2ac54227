use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::HashIndex;
use crate::utils::Result;
use crate::SUPPORTED_EXTENSIONS;

/// 默认的索引文件名
pub const DEFAULT_INDEX_FILE_NAME: &str = "hash_index.json";

/// 全部源文件的哈希索引集合
///
/// 进程启动时 [`load`](Self::load) 一次，提取过程中被各文件共享，
/// 进程结束时 [`save`](Self::save) 一次；它是唯一跨运行保留的状态。
///
/// # 使用示例
/// ```rust,ignore
/// let store = HashIndexFile::load("hash_index.json")?;
/// let index = store.get("Scenes/Intro.gd");
/// let key = index.get_hash_index(&token.hash_id());
/// store.save()?;
/// ```
#[derive(Debug)]
pub struct HashIndexFile {
    path: PathBuf,
    files: RwLock<BTreeMap<String, Arc<HashIndex>>>,
}

impl HashIndexFile {
    /// 创建空的索引集合（不读取磁盘）
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// 从磁盘加载；文件不存在时返回空集合
    ///
    /// 加载后会调用 [`prune`](Self::prune) 丢弃不合法的条目。
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            log::info!("哈希索引文件不存在，将新建: {}", path.display());
            return Ok(Self::new(path));
        }

        let json = std::fs::read_to_string(&path)?;
        let files: BTreeMap<String, HashIndex> = if json.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_json::from_str(&json)?
        };

        let store = Self {
            path,
            files: RwLock::new(files.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()),
        };
        let removed = store.prune();
        if removed > 0 {
            log::info!("已丢弃 {} 个无效的哈希索引条目", removed);
        }
        Ok(store)
    }

    /// 写回磁盘
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = {
            let files = self.files.read();
            let view: BTreeMap<&str, &HashIndex> =
                files.iter().map(|(k, v)| (k.as_str(), &**v)).collect();
            serde_json::to_string_pretty(&view)?
        };
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// 获取文件的索引，不存在时创建
    pub fn get(&self, relative_path: &str) -> Arc<HashIndex> {
        let key = normalize_key(relative_path);
        if let Some(index) = self.files.read().get(&key) {
            return Arc::clone(index);
        }
        let mut files = self.files.write();
        Arc::clone(files.entry(key).or_default())
    }

    /// 丢弃工作区之外或扩展名不受支持的条目，返回丢弃数量
    pub fn prune(&self) -> usize {
        let mut files = self.files.write();
        let before = files.len();
        files.retain(|key, _| is_valid_entry(key));
        before - files.len()
    }

    /// 清空所有文件本次运行的位置记录
    pub fn clear_positions(&self) {
        for index in self.files.read().values() {
            index.clear_position();
        }
    }

    /// 已记录的文件数量
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有已记录的相对路径
    pub fn keys(&self) -> Vec<String> {
        self.files.read().keys().cloned().collect()
    }

    /// 索引文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 统一使用 `/` 作为路径分隔符
fn normalize_key(relative_path: &str) -> String {
    relative_path.replace('\\', "/")
}

/// 条目必须是工作区内的相对路径，且扩展名受支持
fn is_valid_entry(key: &str) -> bool {
    let path = Path::new(key);
    let inside_tree = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if key.is_empty() || !inside_tree {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}
