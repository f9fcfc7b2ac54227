//! GDScript 脚本的提取与写回
//!
//! - 结构化模式：解析整个文件，按规则遍历语法树提取词条，写回时按位置替换并重新解析
//! - 回退模式：按函数声明切分后逐段解析提取，写回时做原始文本替换

mod fallback;
mod translate;
mod walker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::call_rules::{CallRouter, DefaultCallRouter};
use crate::gdscript::{parse_script, parse_with_lines, LineIndex, SyntaxTree};
use crate::hash_index::HashIndex;
use crate::token::TranslationToken;
use crate::utils::{normalize_source, GdError, Result};

pub use translate::{AppliedChange, SkippedChange, TranslateReport};
use walker::{Collector, Site};

#[derive(Debug)]
enum ScriptBody {
    Tree(SyntaxTree),
    Raw(String),
}

/// 一个已解析的 GDScript 文件
///
/// # 使用示例
/// ```rust,ignore
/// let index = store.get("Scenes/Intro.gd");
/// let mut script = ScriptFile::parse("Scenes/Intro.gd", &content, "Intro", index)?;
/// let tokens = script.tokens().to_vec();
/// let report = script.translate(&translated)?;
/// if report.changed {
///     std::fs::write(path, script.render())?;
/// }
/// ```
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
    prefix: String,
    body: ScriptBody,
    tokens: Vec<TranslationToken>,
    /// 与 `tokens` 一一对应的出现位置
    sites: Vec<Vec<Site>>,
    chunk_errors: Vec<GdError>,
}

impl ScriptFile {
    /// 结构化解析并提取词条
    ///
    /// # 参数
    /// - `path`: 文件路径（仅用于日志）
    /// - `content`: 文件内容
    /// - `prefix`: 键前缀，通常为文件名（不含扩展名）
    /// - `index`: 该文件的哈希索引
    pub fn parse(
        path: impl Into<PathBuf>,
        content: &str,
        prefix: &str,
        index: Arc<HashIndex>,
    ) -> Result<Self> {
        let router = DefaultCallRouter::from_embedded_data()?;
        Self::parse_with_router(path, content, prefix, index, &router)
    }

    /// 使用指定的调用规则解析
    pub fn parse_with_router(
        path: impl Into<PathBuf>,
        content: &str,
        prefix: &str,
        index: Arc<HashIndex>,
        router: &dyn CallRouter,
    ) -> Result<Self> {
        let source = normalize_source(content);
        let tree = parse_script(&source)?;
        let mut collector = Collector::default();
        walker::collect(&tree, router, &mut collector);
        Ok(Self::assemble(path.into(), prefix, &index, ScriptBody::Tree(tree), collector, Vec::new()))
    }

    /// 回退模式：按函数切分后逐段提取
    ///
    /// 名字在 `discarded_functions` 中的函数整段跳过；
    /// 单段解析失败只记录到 [`chunk_errors`](Self::chunk_errors)。
    pub fn parse_fallback(
        path: impl Into<PathBuf>,
        content: &str,
        prefix: &str,
        index: Arc<HashIndex>,
        discarded_functions: &[String],
    ) -> Result<Self> {
        let router = DefaultCallRouter::from_embedded_data()?;
        Self::parse_fallback_with_router(path, content, prefix, index, discarded_functions, &router)
    }

    pub fn parse_fallback_with_router(
        path: impl Into<PathBuf>,
        content: &str,
        prefix: &str,
        index: Arc<HashIndex>,
        discarded_functions: &[String],
        router: &dyn CallRouter,
    ) -> Result<Self> {
        let path = path.into();
        let source: Arc<str> = Arc::from(normalize_source(content));
        let lines = Arc::new(LineIndex::new(&source));

        let mut collector = Collector::default();
        let mut chunk_errors = Vec::new();
        for chunk in fallback::split_functions(&source) {
            let name = chunk.name.as_deref().unwrap_or("<head>");
            if discarded_functions.iter().any(|f| f == name) {
                log::debug!("{}: 跳过函数 {}", path.display(), name);
                continue;
            }
            if source[chunk.range.clone()].trim().is_empty() {
                continue;
            }

            match parse_with_lines(Arc::clone(&source), chunk.range.clone(), Some(Arc::clone(&lines))) {
                Ok(tree) => walker::collect(&tree, router, &mut collector),
                Err(e) => {
                    log::warn!("{}: 函数 {} 解析失败: {}", path.display(), name, e);
                    chunk_errors.push(e);
                }
            }
        }
        log::debug!("{}: 回退模式提取 {} 个词条", path.display(), collector.len());

        let body = ScriptBody::Raw(source.to_string());
        Ok(Self::assemble(path, prefix, &index, body, collector, chunk_errors))
    }

    fn assemble(
        path: PathBuf,
        prefix: &str,
        index: &HashIndex,
        body: ScriptBody,
        collector: Collector,
        chunk_errors: Vec<GdError>,
    ) -> Self {
        let (mut tokens, sites) = collector.finish();
        for token in &mut tokens {
            let i = index.get_token_hash_index(token);
            token.set_key(prefix, i);
        }
        Self {
            path,
            prefix: prefix.to_string(),
            body,
            tokens,
            sites,
            chunk_errors,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 提取出的词条（按首次出现的顺序）
    pub fn tokens(&self) -> &[TranslationToken] {
        &self.tokens
    }

    pub fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// 是否为回退模式
    pub fn is_fallback(&self) -> bool {
        matches!(self.body, ScriptBody::Raw(_))
    }

    /// 回退模式下解析失败的函数段
    pub fn chunk_errors(&self) -> &[GdError] {
        &self.chunk_errors
    }

    /// 当前源码
    pub fn render(&self) -> &str {
        match &self.body {
            ScriptBody::Tree(tree) => tree.source(),
            ScriptBody::Raw(content) => content,
        }
    }
}
