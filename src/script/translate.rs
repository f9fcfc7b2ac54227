use std::collections::HashMap;

use super::walker::{Site, UnitKind};
use super::{ScriptBody, ScriptFile};
use crate::gdscript::{parse_expression, parse_statement, Edit, NodeKind, Span, SyntaxTree};
use crate::token::{TokenPosition, TranslationToken};
use crate::utils::Result;

/// 一次写回的结果
#[derive(Debug, Clone, Default)]
pub struct TranslateReport {
    /// 是否至少成功替换了一处
    pub changed: bool,
    pub applied: Vec<AppliedChange>,
    pub skipped: Vec<SkippedChange>,
}

/// 成功替换的一处
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub key: String,
    /// 替换前的源码文本
    pub original: String,
    /// 替换后的源码文本
    pub translation: String,
    pub position: Option<TokenPosition>,
}

/// 被跳过的一处及原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChange {
    pub key: String,
    pub reason: String,
}

/// 计划中的一次替换
struct Planned {
    token: usize,
    site: usize,
    edit: Edit,
    old_text: String,
    value: String,
    position: TokenPosition,
}

impl ScriptFile {
    /// 把译文写回源码
    ///
    /// 译文按指纹（`original + context` 的 MD5）匹配，`key` 不参与匹配。
    /// 译文为空白或与原文相同的词条直接忽略；单处替换失败只记入
    /// [`TranslateReport::skipped`]，不影响其他词条。
    pub fn translate(&mut self, translations: &[TranslationToken]) -> Result<TranslateReport> {
        let mut report = TranslateReport::default();
        if self.tokens.is_empty() {
            return Ok(report);
        }

        let lookup: HashMap<String, &TranslationToken> = translations
            .iter()
            .filter(|t| t.has_translation())
            .map(|t| (t.hash_id(), t))
            .collect();
        if lookup.is_empty() {
            return Ok(report);
        }

        if matches!(self.body, ScriptBody::Tree(_)) {
            self.translate_tree(&lookup, &mut report)?;
        } else {
            self.translate_raw(&lookup, &mut report);
        }

        report.changed = !report.applied.is_empty();
        if report.changed {
            log::debug!(
                "{}: 已替换 {} 处，跳过 {} 处",
                self.path.display(),
                report.applied.len(),
                report.skipped.len()
            );
        }
        Ok(report)
    }

    fn translate_tree(
        &mut self,
        lookup: &HashMap<String, &TranslationToken>,
        report: &mut TranslateReport,
    ) -> Result<()> {
        let ScriptBody::Tree(tree) = &self.body else {
            return Ok(());
        };

        let mut planned = Vec::new();
        for (ti, token) in self.tokens.iter().enumerate() {
            let Some(incoming) = lookup.get(&token.hash_id()) else {
                continue;
            };
            for (si, site) in self.sites[ti].iter().enumerate() {
                match plan_edit(tree, site, &token.original, &incoming.translation) {
                    Ok(Some((edit, value))) => planned.push(Planned {
                        token: ti,
                        site: si,
                        old_text: tree.source()[site.span.start..site.span.end].to_string(),
                        position: tree.position(site.span),
                        edit,
                        value,
                    }),
                    Ok(None) => {}
                    Err(reason) => report.skipped.push(SkippedChange {
                        key: token.key.clone(),
                        reason,
                    }),
                }
            }
        }
        if planned.is_empty() {
            return Ok(());
        }

        let edits: Vec<Edit> = planned.iter().map(|p| p.edit.clone()).collect();
        let (new_tree, accepted) = match tree.replace_spans(&edits) {
            Ok(new_tree) => (new_tree, (0..planned.len()).collect()),
            Err(e) => {
                log::warn!("{}: 整体替换后无法解析，改为逐条替换: {}", self.path.display(), e);
                apply_one_by_one(tree, &planned, &self.tokens, report)
            }
        };

        let applied_edits: Vec<&Edit> = accepted.iter().map(|&i| &planned[i].edit).collect();
        for sites in &mut self.sites {
            for site in sites.iter_mut() {
                site.span = remap_span(site.span, &applied_edits);
            }
        }

        for &i in &accepted {
            let p = &planned[i];
            let token = &mut self.tokens[p.token];
            token.translation = p.value.clone();
            report.applied.push(AppliedChange {
                key: token.key.clone(),
                original: p.old_text.clone(),
                translation: p.edit.text.clone(),
                position: Some(p.position),
            });
            log::trace!("{} 第 {} 处 -> {}", token.key, p.site, p.edit.text);
        }

        self.body = ScriptBody::Tree(new_tree);
        Ok(())
    }
}

/// 校验并生成单处替换，返回 `(替换, 写回词条的译文)`
///
/// - 当前文本必须仍与原文一致
/// - 字面量用原来的前缀和引号重新包裹后必须解析为单个字符串字面量
/// - 表达式必须能解析为表达式，语句必须解析为与原文同类的单条语句
/// - 替换后文本不变时返回 `None`
fn plan_edit(
    tree: &SyntaxTree,
    site: &Site,
    original: &str,
    translation: &str,
) -> std::result::Result<Option<(Edit, String)>, String> {
    let source = tree.source();
    let current = source
        .get(site.span.start..site.span.end)
        .ok_or_else(|| "位置超出源码范围".to_string())?;

    let (text, value) = match &site.unit {
        UnitKind::Literal(info) => {
            let open = info.prefix.len() + info.delimiter.len();
            let content = current
                .get(open..current.len().saturating_sub(info.delimiter.len()))
                .unwrap_or_default();
            if content != original {
                return Err("源码与原文不一致".to_string());
            }
            let text = info.wrap(translation);
            let parsed = parse_expression(&text).map_err(|e| format!("译文无法解析: {}", e))?;
            let is_literal = parsed
                .children(parsed.root())
                .first()
                .is_some_and(|&node| matches!(parsed.kind(node), NodeKind::StringLiteral(_)));
            if !is_literal {
                return Err("译文不是单个字符串字面量".to_string());
            }
            (text, translation.to_string())
        }
        UnitKind::Expression => {
            if current != original {
                return Err("源码与原文不一致".to_string());
            }
            parse_expression(translation).map_err(|e| format!("译文无法解析为表达式: {}", e))?;
            (translation.to_string(), translation.to_string())
        }
        UnitKind::Statement => {
            if current != original {
                return Err("源码与原文不一致".to_string());
            }
            let parsed =
                parse_statement(translation).map_err(|e| format!("译文无法解析为语句: {}", e))?;
            let expected = tree
                .all_nodes()
                .find(|&node| tree.span(node) == site.span && tree.kind(node).is_statement())
                .map(|node| tree.kind(node));
            let actual = parsed.children(parsed.root()).first().map(|&node| parsed.kind(node));
            if let (Some(expected), Some(actual)) = (expected, actual) {
                if std::mem::discriminant(expected) != std::mem::discriminant(actual) {
                    return Err(format!(
                        "译文语句类型与原文不一致: {} -> {}",
                        expected.label(),
                        actual.label()
                    ));
                }
            }
            (translation.to_string(), translation.to_string())
        }
    };

    if text == current {
        return Ok(None);
    }
    Ok(Some((
        Edit {
            span: site.span,
            text,
        },
        value,
    )))
}

/// 从后往前逐条替换，前面的区间不受影响；无法解析的替换被跳过
fn apply_one_by_one(
    tree: &SyntaxTree,
    planned: &[Planned],
    tokens: &[TranslationToken],
    report: &mut TranslateReport,
) -> (SyntaxTree, Vec<usize>) {
    let mut order: Vec<usize> = (0..planned.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(planned[i].edit.span.start));

    let mut current = tree.clone();
    let mut accepted = Vec::new();
    for i in order {
        match current.replace_spans(std::slice::from_ref(&planned[i].edit)) {
            Ok(next) => {
                current = next;
                accepted.push(i);
            }
            Err(e) => report.skipped.push(SkippedChange {
                key: tokens[planned[i].token].key.clone(),
                reason: format!("替换后源码无法解析: {}", e),
            }),
        }
    }
    accepted.sort_unstable();
    (current, accepted)
}

/// 计算替换之后原区间的新位置
fn remap_span(span: Span, edits: &[&Edit]) -> Span {
    let delta = |pos: usize| -> isize {
        edits
            .iter()
            .filter(|e| e.span.end <= pos)
            .map(|e| e.text.len() as isize - e.span.len() as isize)
            .sum()
    };
    if let Some(edit) = edits.iter().find(|e| e.span == span) {
        let start = (span.start as isize + delta(span.start)) as usize;
        return Span::new(start, start + edit.text.len());
    }
    Span::new(
        (span.start as isize + delta(span.start)) as usize,
        (span.end as isize + delta(span.end)) as usize,
    )
}
