pub mod call_rules;
pub mod config;
pub mod gdscript;
pub mod hash_index;
pub mod io;
#[cfg(feature = "paratranz")]
pub mod paratranz;
pub mod project;
pub mod scene;
pub mod script;
pub mod token;
pub mod utils;

// 重新导出主要结构
pub use call_rules::{CallRouter, DefaultCallRouter};
pub use config::ExtractorConfig;
pub use hash_index::{HashIndex, HashIndexFile};
pub use project::{package_archive, BatchReport, FileError, Project, TranslateOutput};
pub use scene::SceneFile;
pub use script::{ScriptFile, TranslateReport};
pub use token::{TokenPosition, TranslationToken};
pub use utils::{is_translatable_text, GdError, Result};

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["gd", "tscn"];
