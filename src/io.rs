//! IO 抽象层模块
//!
//! 词条 JSON 文件的读写接口与默认实现，便于测试时替换为内存实现。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use gd_extractor::io::{DefaultTokenFileIo, TokenFileReader};
//!
//! let tokens = DefaultTokenFileIo.read(Path::new("Intro.json"))?;
//! ```
pub mod traits;
pub mod token_io;

// === 导出 trait 定义 ===
pub use traits::{TokenFileReader, TokenFileWriter};

// === 导出默认实现 ===
pub use token_io::DefaultTokenFileIo;
