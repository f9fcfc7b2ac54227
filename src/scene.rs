//! TSCN 场景文件的文本提取
//!
//! 逐行匹配 `text = "..."` 与 `hint_tooltip = "..."`，只提取不写回。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::hash_index::HashIndex;
use crate::token::{TokenPosition, TranslationToken};
use crate::utils::{is_translatable_text, normalize_source};

/// 属性赋值行（不锚定行首，`bbcode_text` 同样会被匹配）
static TEXT_PROPERTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\s*(text|hint_tooltip)\s*=\s*"(.*)""#).unwrap());

/// 一个已扫描的 TSCN 文件
#[derive(Debug, Clone)]
pub struct SceneFile {
    path: PathBuf,
    tokens: Vec<TranslationToken>,
}

impl SceneFile {
    /// 扫描场景文件并提取词条
    ///
    /// 每个词条的原文是引号内的值，上下文是整行文本；
    /// 位置为值在该行中的列区间。空白值与资源路径不提取。
    pub fn parse(path: impl Into<PathBuf>, content: &str, prefix: &str, index: Arc<HashIndex>) -> Self {
        let path = path.into();
        let content = normalize_source(content);

        let mut tokens: Vec<TranslationToken> = Vec::new();
        let mut by_hash: HashMap<String, usize> = HashMap::new();
        for (line_no, line) in content.lines().enumerate() {
            let Some(value) = TEXT_PROPERTY.captures(line).and_then(|c| c.get(2)) else {
                continue;
            };
            if !is_translatable_text(value.as_str()) {
                continue;
            }

            let position = TokenPosition::new(
                line_no + 1,
                line_no + 1,
                line[..value.start()].chars().count(),
                line[..value.end()].chars().count(),
            );
            let token = TranslationToken::new(value.as_str(), Some(line.to_string()));
            let hash_id = token.hash_id();
            match by_hash.get(&hash_id) {
                Some(&i) => tokens[i].nodes.push(position),
                None => {
                    let mut token = token;
                    token.nodes.push(position);
                    by_hash.insert(hash_id, tokens.len());
                    tokens.push(token);
                }
            }
        }

        for token in &mut tokens {
            let i = index.get_token_hash_index(token);
            token.set_key(prefix, i);
        }
        log::debug!("{}: 提取 {} 个场景词条", path.display(), tokens.len());

        Self { path, tokens }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tokens(&self) -> &[TranslationToken] {
        &self.tokens
    }

    pub fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(content: &str) -> SceneFile {
        SceneFile::parse("Menu.tscn", content, "Menu", Arc::new(HashIndex::new()))
    }

    #[test]
    fn test_text_property() {
        let scene = scan("[node name=\"Start\" type=\"Button\"]\ntext = \"Press Start\"\n");
        assert_eq!(scene.tokens().len(), 1);

        let token = &scene.tokens()[0];
        assert_eq!(token.original, "Press Start");
        assert_eq!(token.context.as_deref(), Some("text = \"Press Start\""));
        assert_eq!(token.key, "Menu_0");
        assert_eq!(token.nodes, vec![TokenPosition::new(2, 2, 8, 19)]);
    }

    #[test]
    fn test_tooltip_and_case_insensitive() {
        let scene = scan("hint_tooltip = \"Opens the menu\"\nTEXT=\"Shout\"\nbbcode_text = \"[b]Bold[/b]\"\n");
        let originals: Vec<_> = scene.tokens().iter().map(|t| t.original.as_str()).collect();
        assert_eq!(originals, vec!["Opens the menu", "Shout", "[b]Bold[/b]"]);
    }

    #[test]
    fn test_blank_and_unrelated_lines() {
        let scene = scan("text = \"\"\nname = \"Title\"\ntext = \"res://icon.png\"\nrect_size = Vector2( 10, 10 )\n");
        assert!(!scene.has_tokens());
    }

    #[test]
    fn test_identical_lines_collapse() {
        let scene = scan("text = \"OK\"\n\ntext = \"OK\"\n");
        assert_eq!(scene.tokens().len(), 1);
        assert_eq!(scene.tokens()[0].nodes.len(), 2);
        assert_eq!(scene.tokens()[0].nodes[1].start_line, 3);
    }

    #[test]
    fn test_columns_count_characters() {
        let scene = scan("  text = \"开始游戏\"\n");
        assert_eq!(scene.tokens()[0].nodes[0], TokenPosition::new(1, 1, 10, 14));
    }
}
