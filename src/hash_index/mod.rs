//! 哈希索引模块
//!
//! 负责把词条指纹映射为稳定的小整数，并按源文件持久化，
//! 使重新提取时未改动的字符串保持相同的键。

mod file;
mod index;

pub use file::{HashIndexFile, DEFAULT_INDEX_FILE_NAME};
pub use index::HashIndex;
