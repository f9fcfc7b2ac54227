use std::collections::HashMap;
use std::ops::Range;

use super::translate::{AppliedChange, SkippedChange, TranslateReport};
use super::walker::UnitKind;
use super::{ScriptBody, ScriptFile};
use crate::token::TranslationToken;

/// 按函数声明切出的一段源码
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    /// 字节区间（以整个文件为基准）
    pub range: Range<usize>,
    /// 函数名；第一个函数之前的部分为 `None`
    pub name: Option<String>,
}

/// 把源码按 `func` / `static func` 开头的行切分
///
/// 从最后一行向前扫描，每遇到函数声明行就切出一段；
/// 第一个函数之前的内容（类成员、变量等）单独成段。
pub(crate) fn split_functions(source: &str) -> Vec<Chunk> {
    let mut line_starts = vec![0];
    line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
    if line_starts.last() == Some(&source.len()) {
        line_starts.pop();
    }

    let mut chunks = Vec::new();
    let mut end = source.len();
    for &start in line_starts.iter().rev() {
        let line = source[start..].lines().next().unwrap_or_default();
        if let Some(name) = function_name(line) {
            chunks.push(Chunk {
                range: start..end,
                name: Some(name),
            });
            end = start;
        }
    }
    if end > 0 {
        chunks.push(Chunk {
            range: 0..end,
            name: None,
        });
    }
    chunks.reverse();
    chunks
}

/// 函数声明行的函数名
fn function_name(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = trimmed
        .strip_prefix("static func ")
        .or_else(|| trimmed.strip_prefix("func "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    Some(name)
}

impl ScriptFile {
    /// 原始文本替换
    ///
    /// 字面量：把带引号的原文替换为带引号的译文；
    /// 整体单元：把原文整体替换为译文。所有相同的出现位置都会被替换。
    pub(super) fn translate_raw(
        &mut self,
        lookup: &HashMap<String, &TranslationToken>,
        report: &mut TranslateReport,
    ) {
        let ScriptBody::Raw(content) = &mut self.body else {
            return;
        };

        for (ti, token) in self.tokens.iter_mut().enumerate() {
            let Some(incoming) = lookup.get(&token.hash_id()) else {
                continue;
            };
            let Some(site) = self.sites[ti].first() else {
                continue;
            };

            let (from, to) = match &site.unit {
                UnitKind::Literal(info) => (info.wrap(&token.original), info.wrap(&incoming.translation)),
                UnitKind::Expression | UnitKind::Statement => {
                    (token.original.clone(), incoming.translation.clone())
                }
            };
            if !content.contains(&from) {
                report.skipped.push(SkippedChange {
                    key: token.key.clone(),
                    reason: "源码中找不到原文".to_string(),
                });
                continue;
            }

            *content = content.replace(&from, &to);
            token.translation = incoming.translation.clone();
            report.applied.push(AppliedChange {
                key: token.key.clone(),
                original: from,
                translation: to,
                position: token.nodes.first().copied(),
            });
        }
    }
}
