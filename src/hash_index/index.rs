use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::token::{TokenPosition, TranslationToken};

/// 单个文件的哈希索引
///
/// # 不变量
/// - 指纹一旦分配了索引，该映射永不改变
/// - 计数器只增不减，旧条目不会被压缩
///
/// 内部使用互斥锁，多个提取线程可以同时查询/插入，结果等价于顺序执行。
#[derive(Debug, Default)]
pub struct HashIndex {
    state: Mutex<HashIndexState>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct HashIndexState {
    /// 下一个待分配的索引
    #[serde(default)]
    counter: u64,
    /// 指纹 -> 索引
    #[serde(default)]
    indexes: BTreeMap<String, u64>,
    /// 本次运行中各指纹出现的位置（不持久化）
    #[serde(skip)]
    positions: HashMap<String, Vec<TokenPosition>>,
}

impl HashIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指纹对应的索引，不存在时分配新索引
    pub fn get_hash_index(&self, hash_id: &str) -> u64 {
        let mut state = self.state.lock();
        if let Some(&index) = state.indexes.get(hash_id) {
            return index;
        }
        let index = state.counter;
        state.counter += 1;
        state.indexes.insert(hash_id.to_string(), index);
        index
    }

    /// 记录词条的出现位置并返回其索引
    pub fn get_token_hash_index(&self, token: &TranslationToken) -> u64 {
        let hash_id = token.hash_id();
        {
            let mut state = self.state.lock();
            state
                .positions
                .entry(hash_id.clone())
                .or_default()
                .extend(token.nodes.iter().copied());
        }
        self.get_hash_index(&hash_id)
    }

    /// 只读查询
    pub fn lookup(&self, hash_id: &str) -> Option<u64> {
        self.state.lock().indexes.get(hash_id).copied()
    }

    /// 本次运行记录的位置
    pub fn positions(&self, hash_id: &str) -> Vec<TokenPosition> {
        self.state
            .lock()
            .positions
            .get(hash_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 清空本次运行的位置记录（不影响指纹映射）
    pub fn clear_position(&self) {
        self.state.lock().positions.clear();
    }

    /// 当前计数器值
    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    /// 已分配的指纹数量
    pub fn len(&self) -> usize {
        self.state.lock().indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for HashIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.state.lock().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HashIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut state = HashIndexState::deserialize(deserializer)?;
        // 防止损坏的文件让计数器回退到已分配的索引
        let next = state.indexes.values().max().map(|max| max + 1).unwrap_or(0);
        state.counter = state.counter.max(next);
        Ok(Self {
            state: Mutex::new(state),
        })
    }
}
