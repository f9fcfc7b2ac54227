use std::collections::HashMap;

use crate::call_rules::CallRouter;
use crate::gdscript::{NodeId, NodeKind, Span, StringInfo, SyntaxTree};
use crate::token::{TokenPosition, TranslationToken};
use crate::utils::is_translatable_text;

/// 词条在源码中对应的单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitKind {
    /// 单个字符串字面量，原文为引号内的内容
    Literal(StringInfo),
    /// 整个表达式（if/elif 条件、调用实参）
    Expression,
    /// 整条语句
    Statement,
}

/// 词条的一个出现位置，`span` 为整个单元（字面量含引号）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Site {
    pub span: Span,
    pub unit: UnitKind,
}

/// 按指纹去重收集词条
#[derive(Debug, Default)]
pub(crate) struct Collector {
    tokens: Vec<TranslationToken>,
    sites: Vec<Vec<Site>>,
    by_hash: HashMap<String, usize>,
}

impl Collector {
    fn push(&mut self, mut token: TranslationToken, site: Site, position: TokenPosition) {
        let hash_id = token.hash_id();
        if let Some(&i) = self.by_hash.get(&hash_id) {
            self.tokens[i].nodes.push(position);
            self.sites[i].push(site);
            return;
        }
        token.nodes.push(position);
        self.by_hash.insert(hash_id, self.tokens.len());
        self.tokens.push(token);
        self.sites.push(vec![site]);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn finish(self) -> (Vec<TranslationToken>, Vec<Vec<Site>>) {
        (self.tokens, self.sites)
    }
}

/// 遍历语法树，把可翻译的单元加入 `out`
///
/// 只检查三类语句：if/elif 条件、表达式语句（含 return）、变量初始化；
/// 赋值语句只在目标不是属性时作为整体提取，其余语句一律忽略。
pub(crate) fn collect(tree: &SyntaxTree, router: &dyn CallRouter, out: &mut Collector) {
    let walker = Walker { tree, router };
    for id in tree.all_nodes() {
        match tree.kind(id) {
            NodeKind::If => {
                for &branch in tree.children(id) {
                    if let Some(condition) = tree.condition(branch) {
                        if tree.has_string_node(condition) {
                            walker.classify_guard(branch, condition, out);
                        }
                    }
                }
            }
            NodeKind::ExprStmt | NodeKind::Return | NodeKind::VarDecl { .. } => {
                if tree.has_string_node(id) {
                    walker.classify_statement(id, out);
                }
            }
            NodeKind::Assign { .. } => {
                let target_is_attribute = tree
                    .children(id)
                    .first()
                    .is_some_and(|&target| matches!(tree.kind(target), NodeKind::Attribute { .. }));
                if !target_is_attribute && tree.has_string_node(id) {
                    walker.emit_whole(id, UnitKind::Statement, None, out);
                }
            }
            _ => {}
        }
    }
}

struct Walker<'t> {
    tree: &'t SyntaxTree,
    router: &'t dyn CallRouter,
}

impl Walker<'_> {
    fn classify_statement(&self, stmt: NodeId, out: &mut Collector) {
        let tree = self.tree;
        let Some(top) = tree.statement_expression(stmt) else {
            return;
        };
        let context = tree.text(stmt);

        match (tree.kind(stmt), tree.kind(top)) {
            // return 字面量：整条语句
            (NodeKind::Return, NodeKind::StringLiteral(_)) => {
                self.emit_whole(stmt, UnitKind::Statement, None, out)
            }
            // return 字典/数组：逐个字面量
            (NodeKind::Return, NodeKind::Dictionary | NodeKind::Array) => {
                self.emit_literals(top, context, out)
            }
            (NodeKind::Return, _) => self.emit_whole(stmt, UnitKind::Statement, None, out),

            (NodeKind::ExprStmt | NodeKind::VarDecl { .. }, NodeKind::Call) => {
                self.classify_call(top, context, out)
            }
            (NodeKind::ExprStmt | NodeKind::VarDecl { .. }, NodeKind::Binary { .. }) => {
                self.emit_whole(stmt, UnitKind::Statement, None, out)
            }
            (NodeKind::ExprStmt, _) => self.emit_whole(stmt, UnitKind::Statement, None, out),
            _ => self.emit_literals(top, context, out),
        }
    }

    /// if/elif 条件；上下文是分支头 `if <条件>`
    fn classify_guard(&self, branch: NodeId, condition: NodeId, out: &mut Collector) {
        let tree = self.tree;
        let header = &tree.source()[tree.span(branch).start..tree.span(condition).end];
        match tree.kind(condition) {
            NodeKind::Binary { .. } => {
                self.emit_whole(condition, UnitKind::Expression, Some(header), out)
            }
            NodeKind::Call => self.classify_call(condition, header, out),
            _ => self.emit_literals(condition, header, out),
        }
    }

    /// 调用表达式：按规则表跳过实参，其余实参逐个处理
    fn classify_call(&self, call: NodeId, context: &str, out: &mut Collector) {
        let tree = self.tree;
        let callee = tree.callee_name(call).unwrap_or_default();
        if self.router.is_denied(callee) {
            return;
        }

        // `tr("Hi").to_upper()` 这类链式调用的字面量在被调用者一侧
        if let Some(&callee_expr) = tree.children(call).first() {
            self.emit_literals(callee_expr, context, out);
        }

        let args = tree.call_arguments(call);
        for (i, &arg) in args.iter().enumerate() {
            if self.router.skipped_arg(callee, i, args.len()) || !tree.has_string_node(arg) {
                continue;
            }
            match tree.kind(arg) {
                NodeKind::StringLiteral(_) => self.emit_literal(arg, context, out),
                NodeKind::Binary { .. } => {
                    self.emit_whole(arg, UnitKind::Expression, Some(context), out)
                }
                NodeKind::Call => self.classify_call(arg, context, out),
                _ => self.emit_literals(arg, context, out),
            }
        }
    }

    fn emit_literals(&self, expr: NodeId, context: &str, out: &mut Collector) {
        for literal in self.tree.string_nodes(expr) {
            self.emit_literal(literal, context, out);
        }
    }

    fn emit_literal(&self, literal: NodeId, context: &str, out: &mut Collector) {
        let tree = self.tree;
        let (NodeKind::StringLiteral(info), Some(content_span)) =
            (tree.kind(literal), tree.string_content_span(literal))
        else {
            return;
        };
        if !self.is_translatable_literal(literal) {
            return;
        }

        let content = &tree.source()[content_span.start..content_span.end];
        let token = TranslationToken::new(content, Some(context.to_string()))
            .with_type(tree.kind(literal).label());
        let site = Site {
            span: tree.span(literal),
            unit: UnitKind::Literal(info.clone()),
        };
        out.push(token, site, tree.position(content_span));
    }

    /// 整体提取；单元内至少要有一个本身可翻译的字面量
    ///
    /// 整条语句没有上下文，语句内的表达式以所在语句为上下文。
    fn emit_whole(&self, unit: NodeId, kind: UnitKind, context: Option<&str>, out: &mut Collector) {
        let tree = self.tree;
        let has_text = tree
            .string_nodes(unit)
            .into_iter()
            .any(|literal| self.is_translatable_literal(literal));
        if !has_text {
            return;
        }

        let token = TranslationToken::new(tree.text(unit), context.map(str::to_string))
            .with_type(tree.kind(unit).label());
        let site = Site {
            span: tree.span(unit),
            unit: kind,
        };
        out.push(token, site, tree.position(tree.span(unit)));
    }

    /// 字面量本身是否为界面文本
    ///
    /// 排除：空白与资源路径、`&"StringName"` / `^"NodePath"`、字典键、
    /// 下标表达式，以及规则表要求跳过的调用实参。
    fn is_translatable_literal(&self, literal: NodeId) -> bool {
        let tree = self.tree;
        let NodeKind::StringLiteral(info) = tree.kind(literal) else {
            return false;
        };
        if matches!(info.prefix.as_str(), "&" | "^") {
            return false;
        }
        if !tree.string_content(literal).is_some_and(is_translatable_text) {
            return false;
        }

        if let Some(parent) = tree.parent(literal) {
            let children = tree.children(parent);
            match tree.kind(parent) {
                NodeKind::Pair if children.first() == Some(&literal) => return false,
                NodeKind::Index if children.get(1) == Some(&literal) => return false,
                _ => {}
            }
        }

        !self.inside_skipped_argument(literal)
    }

    fn inside_skipped_argument(&self, node: NodeId) -> bool {
        let tree = self.tree;
        let mut child = node;
        while let Some(parent) = tree.parent(child) {
            if matches!(tree.kind(parent), NodeKind::Call) {
                let args = tree.call_arguments(parent);
                if let Some(i) = args.iter().position(|&arg| arg == child) {
                    let callee = tree.callee_name(parent).unwrap_or_default();
                    if self.router.skipped_arg(callee, i, args.len()) {
                        return true;
                    }
                }
            }
            child = parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_rules::DefaultCallRouter;
    use crate::gdscript::parse_script;

    fn extract(source: &str) -> Vec<TranslationToken> {
        let tree = parse_script(source).unwrap();
        let router = DefaultCallRouter::from_embedded_data().unwrap();
        let mut out = Collector::default();
        collect(&tree, &router, &mut out);
        out.finish().0
    }

    fn originals(source: &str) -> Vec<String> {
        extract(source).into_iter().map(|t| t.original).collect()
    }

    #[test]
    fn test_call_arguments_become_literal_tokens() {
        let tokens = extract("func f():\n\tsaynn(\"Hello there\", 2)\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].original, "Hello there");
        assert_eq!(tokens[0].context.as_deref(), Some("saynn(\"Hello there\", 2)"));
        assert_eq!(tokens[0].nodes, vec![TokenPosition::new(2, 2, 8, 19)]);
    }

    #[test]
    fn test_denied_calls_produce_nothing() {
        assert!(originals("func f():\n\tget_node(\"Foo\")\n\tvar s = preload(\"Scene.tscn\")\n\tif has(\"x\"):\n\t\tpass\n").is_empty());
        assert!(originals("func f():\n\treturn get_node(\"Foo\")\n").is_empty());
        assert!(originals("var c = Color(\"ff0000\")\n").is_empty());
    }

    #[test]
    fn test_connect_skips_leading_arguments() {
        assert!(originals("func f():\n\tconnect(\"signal\", self, \"method\", [1, 2])\n").is_empty());
        assert_eq!(
            originals("func f():\n\tbutton.connect(\"pressed\", self, \"_on\", [\"Bye\"])\n"),
            vec!["Bye"]
        );
        assert_eq!(originals("func f():\n\temit_signal(\"said\", \"Hi\")\n"), vec!["Hi"]);
    }

    #[test]
    fn test_binary_argument_is_whole_expression() {
        let tokens = extract("func f():\n\tsay(\"Hi \" + name + \"!\")\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].original, "\"Hi \" + name + \"!\"");
        assert_eq!(tokens[0].context.as_deref(), Some("say(\"Hi \" + name + \"!\")"));
    }

    #[test]
    fn test_same_expression_in_two_statements() {
        let tokens = extract("func f():\n\tsay(\"Hi \" + name)\n\tshout(\"Hi \" + name)\n");
        let contexts: Vec<_> = tokens.iter().map(|t| t.context.as_deref()).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            contexts,
            vec![Some("say(\"Hi \" + name)"), Some("shout(\"Hi \" + name)")]
        );
        assert_ne!(tokens[0].hash_id(), tokens[1].hash_id());
    }

    #[test]
    fn test_whole_statement_has_no_context() {
        let tokens = extract("func f():\n\tmsg = \"Hi \" + who\n\treturn \"Done\"\n");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| t.context.is_none()));
    }

    #[test]
    fn test_return_shapes() {
        assert_eq!(
            originals("func f():\n\treturn RNG.pick([\"A\",\"B\"])\n"),
            vec!["return RNG.pick([\"A\",\"B\"])"]
        );
        assert_eq!(originals("func f():\n\treturn \"Done\"\n"), vec!["return \"Done\""]);
        assert_eq!(
            originals("func f():\n\treturn {\"name\": \"Bob\", \"id\": \"res://x.gd\"}\n"),
            vec!["Bob"]
        );
        assert!(originals("func f():\n\treturn \"res://a.png\"\n").is_empty());
    }

    #[test]
    fn test_var_initializers() {
        assert_eq!(originals("var title = \"Hello\"\n"), vec!["Hello"]);
        assert_eq!(originals("var msg = \"Hi \" + who\n"), vec!["var msg = \"Hi \" + who"]);
        assert_eq!(
            originals("var d = {\"key\": \"Value\", \"empty\": \"\", \"icon\": \"user://i.png\"}\n"),
            vec!["Value"]
        );
        // const 不参与提取
        assert!(originals("const NAME = \"Hello\"\n").is_empty());
    }

    #[test]
    fn test_guards() {
        let tokens = extract("func f():\n\tif mood == \"happy\":\n\t\tpass\n\telif check(\"Brave\"):\n\t\tpass\n");
        let originals: Vec<_> = tokens.iter().map(|t| t.original.as_str()).collect();
        assert_eq!(originals, vec!["mood == \"happy\"", "Brave"]);
        assert_eq!(tokens[0].context.as_deref(), Some("if mood == \"happy\""));
        assert_eq!(tokens[1].context.as_deref(), Some("elif check(\"Brave\")"));
    }

    #[test]
    fn test_subscripts_and_node_paths_are_skipped() {
        assert!(originals("func f():\n\tvar x = data[\"key\"]\n").is_empty());
        assert!(originals("func f():\n\tvar l = $\"UI/Label\"\n").is_empty());
        assert!(originals("func f():\n\tvar n = &\"name\"\n").is_empty());
    }

    #[test]
    fn test_assignments() {
        assert!(originals("func f():\n\tself.text = \"Hello\"\n\tlabel.text = \"Hi\"\n").is_empty());
        assert_eq!(originals("func f():\n\tmsg = \"Hello\"\n"), vec!["msg = \"Hello\""]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let tokens = extract("func a():\n\tsay(\"Hello\")\nfunc b():\n\tsay(\"Hello\")\n\tsay(\"Hello!\")\n");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].nodes.len(), 2);
        assert_eq!(tokens[0].nodes[1].start_line, 4);
    }

    #[test]
    fn test_chained_call_on_literal() {
        assert_eq!(originals("func f():\n\tsay(tr(\"Hi\").to_upper())\n"), vec!["Hi"]);
    }

    #[test]
    fn test_other_statements_ignored() {
        let source = "func f():\n\tfor s in [\"a\", \"b\"]:\n\t\tpass\n\twhile x != \"y\":\n\t\tpass\n\tmatch m:\n\t\t\"k\":\n\t\t\tpass\n";
        assert!(originals(source).is_empty());
    }
}
