use std::ops::Range;
use std::sync::Arc;

use super::lexer::{tokenize, Token, TokenKind};
use super::syntax::{BranchKind, LineIndex, Node, NodeId, NodeKind, Span, SyntaxTree};
use crate::utils::{GdError, Result};

/// 修饰 `var` / `func` 的关键字（Godot 3）
const MODIFIERS: &[&str] = &[
    "export", "onready", "static", "remote", "master", "puppet", "slave", "sync", "remotesync",
    "mastersync", "puppetsync",
];

/// 不能出现在表达式开头的关键字
const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "match", "return", "var", "const", "pass", "break",
    "continue", "and", "or", "in", "class", "extends", "signal", "enum",
];

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "&=", "|=", "^=", "<<=", ">>=",
];

/// 解析完整脚本
pub fn parse_script(source: &str) -> Result<SyntaxTree> {
    parse_range(source, 0..source.len())
}

/// 解析源码中的一段（用于按函数切分的回退模式）
///
/// 节点区间与行列号都以整个文件为基准。
pub fn parse_range(source: &str, range: Range<usize>) -> Result<SyntaxTree> {
    parse_shared(Arc::from(source), range)
}

pub(crate) fn parse_shared(source: Arc<str>, range: Range<usize>) -> Result<SyntaxTree> {
    parse_with_lines(source, range, None)
}

pub(crate) fn parse_with_lines(
    source: Arc<str>,
    range: Range<usize>,
    lines: Option<Arc<LineIndex>>,
) -> Result<SyntaxTree> {
    let lines = lines.unwrap_or_else(|| Arc::new(LineIndex::new(&source)));
    let tokens = tokenize(&source, range.clone())?;
    let mut parser = Parser::new(&source, tokens, Arc::clone(&lines));
    let items = parser.parse_block_items(false)?;
    let root = parser.add(NodeKind::Script, Span::new(range.start, range.end), items);
    let nodes = parser.nodes;
    Ok(SyntaxTree::from_parts(source, range, nodes, root, Some(lines)))
}

/// 把文本解析为单个表达式；根节点的唯一子节点即该表达式
pub fn parse_expression(text: &str) -> Result<SyntaxTree> {
    let source: Arc<str> = Arc::from(text);
    let lines = Arc::new(LineIndex::new(text));
    let tokens = tokenize(text, 0..text.len())?;
    let mut parser = Parser::new(&source, tokens, Arc::clone(&lines));
    parser.skip_newlines();
    let expr = parser.parse_expr()?;
    parser.skip_newlines();
    if !parser.at(|k| matches!(k, TokenKind::Eof | TokenKind::Dedent)) {
        return Err(parser.unexpected("表达式之后"));
    }
    let root = parser.add(NodeKind::Script, Span::new(0, text.len()), vec![expr]);
    let nodes = parser.nodes;
    Ok(SyntaxTree::from_parts(source, 0..text.len(), nodes, root, Some(lines)))
}

/// 把文本解析为单条语句；根节点的唯一子节点即该语句
pub fn parse_statement(text: &str) -> Result<SyntaxTree> {
    let tree = parse_script(text)?;
    match tree.children(tree.root()).len() {
        1 => Ok(tree),
        count => Err(GdError::Parse {
            line: 1,
            column: 0,
            message: format!("期望单条语句，实际为 {} 条", count),
        }),
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    last_end: usize,
    nodes: Vec<Node>,
    lines: Arc<LineIndex>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>, lines: Arc<LineIndex>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            last_end: 0,
            nodes: Vec::new(),
            lines,
        }
    }

    // ---- 节点构建 ----

    fn add(&mut self, kind: NodeKind, span: Span, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in &children {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            children,
        });
        id
    }

    fn span_of(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.last_end.max(start))
    }

    // ---- 词法单元访问 ----

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn at(&self, f: impl Fn(&TokenKind) -> bool) -> bool {
        f(&self.peek().kind)
    }

    fn text(&self, token: &Token) -> &'a str {
        &self.source[token.span.start..token.span.end]
    }

    fn is_op(&self, op: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Op && self.text(token) == op
    }

    fn is_ident(&self, word: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Ident && self.text(token) == word
    }

    fn is_ident_at(&self, offset: usize, word: &str) -> bool {
        let token = self.peek_at(offset);
        token.kind == TokenKind::Ident && self.text(token) == word
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        ) {
            self.last_end = token.span.end;
        }
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn expect_op(&mut self, op: &str) -> Result<Token> {
        if self.is_op(op) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("期望 `{}`", op)))
        }
    }

    fn expect_ident(&mut self) -> Result<Token> {
        if self.at(|k| *k == TokenKind::Ident) {
            Ok(self.advance())
        } else {
            Err(self.unexpected("期望标识符"))
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(|k| *k == TokenKind::Newline) || self.is_op(";") {
            self.advance();
        }
    }

    fn at_statement_end(&self) -> bool {
        self.at(|k| matches!(k, TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent)) || self.is_op(";")
    }

    fn expect_statement_end(&self) -> Result<()> {
        if self.at_statement_end() {
            Ok(())
        } else {
            Err(self.unexpected("语句之后"))
        }
    }

    /// 跳过到语句结尾（不消费结尾的换行）
    fn skip_to_statement_end(&mut self) {
        while !self.at_statement_end() {
            self.advance();
        }
    }

    /// 跳过到深度为 0 的 `:`（不消费 `:`）
    fn skip_to_colon(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            if self.at(|k| matches!(k, TokenKind::Newline | TokenKind::Eof)) {
                return Err(self.unexpected("期望 `:`"));
            }
            if depth == 0 && self.is_op(":") {
                return Ok(());
            }
            let token = self.advance();
            if token.kind == TokenKind::Op {
                match self.text(&token) {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
        }
    }

    /// 跳过成对的括号（当前位于开括号）
    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        loop {
            if self.at(|k| *k == TokenKind::Eof) {
                return;
            }
            let token = self.advance();
            if token.kind == TokenKind::Op {
                match self.text(&token) {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn unexpected(&self, context: &str) -> GdError {
        let token = self.peek();
        let (line, column) = self.lines.line_col(token.span.start);
        let found = match token.kind {
            TokenKind::Newline => "换行".to_string(),
            TokenKind::Indent => "缩进".to_string(),
            TokenKind::Dedent => "反缩进".to_string(),
            TokenKind::Eof => "文件结尾".to_string(),
            _ => format!("`{}`", self.text(token)),
        };
        GdError::Parse {
            line,
            column,
            message: format!("{}: 意外的 {}", context, found),
        }
    }

    // ---- 语句 ----

    /// 解析语句序列；`in_block` 为真时在匹配的反缩进处结束
    fn parse_block_items(&mut self, in_block: bool) -> Result<Vec<NodeId>> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Dedent => {
                    self.advance();
                    if in_block {
                        break;
                    }
                }
                TokenKind::Indent => {
                    // 多余的缩进：作为嵌套块并入当前序列
                    self.advance();
                    let nested = self.parse_block_items(true)?;
                    items.extend(nested);
                }
                _ => items.push(self.parse_statement()?),
            }
        }
        Ok(items)
    }

    /// 冒号之后的语句体：换行 + 缩进块，或同一行的简单语句
    fn parse_suite(&mut self) -> Result<Vec<NodeId>> {
        if self.at(|k| *k == TokenKind::Newline) {
            self.advance();
            if self.at(|k| *k == TokenKind::Indent) {
                self.advance();
                return self.parse_block_items(true);
            }
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        loop {
            items.push(self.parse_statement()?);
            if self.is_op(";") {
                self.advance();
                if !self.at_statement_end() {
                    continue;
                }
            }
            break;
        }
        if self.at(|k| *k == TokenKind::Newline) {
            self.advance();
        }
        Ok(items)
    }

    fn parse_statement(&mut self) -> Result<NodeId> {
        let start = self.peek().span.start;

        while self.is_op("@") {
            self.advance();
            self.expect_ident()?;
            if self.is_op("(") {
                self.skip_balanced();
            }
            self.skip_newlines_between_annotations();
            if self.at_statement_end() {
                return Ok(self.add(NodeKind::Keyword, self.span_from(start), Vec::new()));
            }
        }

        let word = match self.peek().kind {
            TokenKind::Ident => self.text(self.peek()),
            _ => "",
        };

        match word {
            "extends" | "class_name" | "signal" | "enum" | "const" => {
                let kind = match word {
                    "extends" => NodeKind::Extends,
                    "class_name" => NodeKind::ClassName,
                    "signal" => NodeKind::Signal,
                    "enum" => NodeKind::Enum,
                    _ => NodeKind::Const,
                };
                self.skip_to_statement_end();
                Ok(self.add(kind, self.span_from(start), Vec::new()))
            }
            "pass" | "break" | "continue" | "tool" | "breakpoint" => {
                self.advance();
                self.expect_statement_end()?;
                Ok(self.add(NodeKind::Keyword, self.span_from(start), Vec::new()))
            }
            w if MODIFIERS.contains(&w) => {
                while self.at(|k| *k == TokenKind::Ident) && MODIFIERS.contains(&self.text(self.peek())) {
                    self.advance();
                    if self.is_op("(") {
                        self.skip_balanced();
                    }
                }
                if self.is_ident("var") {
                    self.parse_var(start)
                } else if self.is_ident("func") {
                    self.parse_func(start)
                } else if self.is_ident("const") {
                    self.skip_to_statement_end();
                    Ok(self.add(NodeKind::Const, self.span_from(start), Vec::new()))
                } else {
                    Err(self.unexpected("修饰符之后"))
                }
            }
            "var" => self.parse_var(start),
            "func" => self.parse_func(start),
            "class" => self.parse_class(start),
            "if" => self.parse_if(start),
            "for" => self.parse_for(start),
            "while" => self.parse_while(start),
            "match" => self.parse_match(start),
            "return" => {
                self.advance();
                let children = if self.at_statement_end() {
                    Vec::new()
                } else {
                    vec![self.parse_expr()?]
                };
                self.expect_statement_end()?;
                Ok(self.add(NodeKind::Return, self.span_from(start), children))
            }
            "elif" | "else" => Err(self.unexpected("缺少对应的 if")),
            _ => self.parse_expression_statement(start),
        }
    }

    /// Godot 4 注解可以独占一行
    fn skip_newlines_between_annotations(&mut self) {
        while self.at(|k| *k == TokenKind::Newline)
            && self.peek_at(1).kind == TokenKind::Ident
            && matches!(self.text(self.peek_at(1)), "var" | "func" | "onready" | "static")
        {
            self.advance();
        }
    }

    fn parse_expression_statement(&mut self, start: usize) -> Result<NodeId> {
        let target = self.parse_expr()?;
        let op = self.peek().clone();
        if op.kind == TokenKind::Op && ASSIGN_OPS.contains(&self.text(&op)) {
            let op = self.text(&op).to_string();
            self.advance();
            let value = self.parse_expr()?;
            self.expect_statement_end()?;
            return Ok(self.add(NodeKind::Assign { op }, self.span_from(start), vec![target, value]));
        }
        self.expect_statement_end()?;
        Ok(self.add(NodeKind::ExprStmt, self.span_from(start), vec![target]))
    }

    fn parse_var(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let name_token = self.expect_ident()?;
        let name = self.text(&name_token).to_string();

        if self.is_op(":") && !self.next_starts_block() {
            self.advance();
            self.parse_type_hint()?;
        }

        let mut children = Vec::new();
        if self.is_op("=") || self.is_op(":=") {
            self.advance();
            children.push(self.parse_expr()?);
        }

        if self.is_ident("setget") {
            self.skip_to_statement_end();
        }

        let span = self.span_from(start);
        if self.is_op(":") {
            // Godot 4 属性访问器块，内容不参与提取
            self.advance();
            self.skip_property_block();
        } else {
            self.expect_statement_end()?;
        }
        Ok(self.add(NodeKind::VarDecl { name }, span, children))
    }

    /// `var x:` 之后紧跟换行，说明是属性块而不是类型标注
    fn next_starts_block(&self) -> bool {
        matches!(self.peek_at(1).kind, TokenKind::Newline)
    }

    fn parse_type_hint(&mut self) -> Result<()> {
        self.expect_ident()?;
        while self.is_op(".") {
            self.advance();
            self.expect_ident()?;
        }
        if self.is_op("[") {
            self.skip_balanced();
        }
        Ok(())
    }

    fn skip_property_block(&mut self) {
        if !self.at(|k| *k == TokenKind::Newline) {
            self.skip_to_statement_end();
            return;
        }
        self.advance();
        if !self.at(|k| *k == TokenKind::Indent) {
            return;
        }
        let mut depth = 0usize;
        loop {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::Eof => return,
                _ => {}
            }
        }
    }

    fn parse_func(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let name = if self.at(|k| *k == TokenKind::Ident) {
            let name_token = self.advance();
            self.text(&name_token).to_string()
        } else {
            String::new()
        };
        self.skip_to_colon()?;
        self.advance();
        let body = self.parse_suite()?;
        Ok(self.add(NodeKind::FuncDecl { name }, self.span_from(start), body))
    }

    fn parse_class(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let name_token = self.expect_ident()?;
        let name = self.text(&name_token).to_string();
        self.skip_to_colon()?;
        self.advance();
        let body = self.parse_suite()?;
        Ok(self.add(NodeKind::ClassDecl { name }, self.span_from(start), body))
    }

    fn parse_if(&mut self, start: usize) -> Result<NodeId> {
        let mut branches = vec![self.parse_branch(BranchKind::If)?];
        while self.is_ident("elif") {
            branches.push(self.parse_branch(BranchKind::Elif)?);
        }
        if self.is_ident("else") {
            branches.push(self.parse_branch(BranchKind::Else)?);
        }
        Ok(self.add(NodeKind::If, self.span_from(start), branches))
    }

    fn parse_branch(&mut self, kind: BranchKind) -> Result<NodeId> {
        let start = self.advance().span.start;
        let mut children = Vec::new();
        if kind != BranchKind::Else {
            children.push(self.parse_expr()?);
        }
        self.expect_op(":")?;
        children.extend(self.parse_suite()?);
        Ok(self.add(NodeKind::Branch(kind), self.span_from(start), children))
    }

    fn parse_for(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        self.expect_ident()?;
        if self.is_op(":") {
            self.advance();
            self.parse_type_hint()?;
        }
        if !self.is_ident("in") {
            return Err(self.unexpected("期望 `in`"));
        }
        self.advance();
        let iterable = self.parse_expr()?;
        self.expect_op(":")?;
        let mut children = vec![iterable];
        children.extend(self.parse_suite()?);
        Ok(self.add(NodeKind::For, self.span_from(start), children))
    }

    fn parse_while(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let condition = self.parse_expr()?;
        self.expect_op(":")?;
        let mut children = vec![condition];
        children.extend(self.parse_suite()?);
        Ok(self.add(NodeKind::While, self.span_from(start), children))
    }

    fn parse_match(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let subject = self.parse_expr()?;
        self.expect_op(":")?;
        let mut children = vec![subject];

        if !self.at(|k| *k == TokenKind::Newline) {
            return Err(self.unexpected("match 之后"));
        }
        self.advance();
        if !self.at(|k| *k == TokenKind::Indent) {
            return Ok(self.add(NodeKind::Match, self.span_from(start), children));
        }
        self.advance();

        loop {
            self.skip_newlines();
            match self.peek().kind {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                _ => {}
            }
            let branch_start = self.peek().span.start;
            self.skip_to_colon()?;
            let pattern = self.add(NodeKind::Pattern, self.span_from(branch_start), Vec::new());
            self.advance();
            let mut branch_children = vec![pattern];
            branch_children.extend(self.parse_suite()?);
            children.push(self.add(NodeKind::MatchBranch, self.span_from(branch_start), branch_children));
        }
        Ok(self.add(NodeKind::Match, self.span_from(start), children))
    }

    // ---- 表达式 ----

    fn parse_expr(&mut self) -> Result<NodeId> {
        let then = self.parse_binary(1)?;
        if self.is_ident("if") {
            self.advance();
            let condition = self.parse_binary(1)?;
            if !self.is_ident("else") {
                return Err(self.unexpected("三元表达式缺少 else"));
            }
            self.advance();
            let otherwise = self.parse_expr()?;
            let span = self.span_of(then).to(self.span_of(otherwise));
            return Ok(self.add(NodeKind::Ternary, span, vec![then, condition, otherwise]));
        }
        Ok(then)
    }

    /// 当前位置的二元运算符：(优先级, 运算符, 词法单元数)
    fn binary_op(&self) -> Option<(u8, String, usize)> {
        let token = self.peek();
        let text = self.text(token);
        let prec = match (&token.kind, text) {
            (TokenKind::Ident, "or") | (TokenKind::Op, "||") => 1,
            (TokenKind::Ident, "and") | (TokenKind::Op, "&&") => 2,
            (TokenKind::Ident, "not") if self.is_ident_at(1, "in") => {
                return Some((4, "not in".to_string(), 2));
            }
            (TokenKind::Ident, "in") => 4,
            (TokenKind::Op, "==" | "!=" | "<" | ">" | "<=" | ">=") => 4,
            (TokenKind::Op, "|") => 5,
            (TokenKind::Op, "^") => 6,
            (TokenKind::Op, "&") => 7,
            (TokenKind::Op, "<<" | ">>") => 8,
            (TokenKind::Op, "+" | "-") => 9,
            (TokenKind::Op, "*" | "/" | "%") => 10,
            (TokenKind::Op, "**") => 12,
            (TokenKind::Ident, "is" | "as") => 13,
            _ => return None,
        };
        Some((prec, text.to_string(), 1))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId> {
        let mut lhs = self.parse_prefix()?;
        while let Some((prec, op, count)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            for _ in 0..count {
                self.advance();
            }
            let rhs = if op == "is" || op == "as" {
                self.parse_postfix()?
            } else {
                self.parse_binary(prec + 1)?
            };
            let span = self.span_of(lhs).to(self.span_of(rhs));
            lhs = self.add(NodeKind::Binary { op }, span, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<NodeId> {
        let token = self.peek().clone();
        let text = self.text(&token);
        let unary = match (&token.kind, text) {
            (TokenKind::Ident, "not") | (TokenKind::Op, "!") => Some((text, 3)),
            (TokenKind::Op, "-" | "+" | "~") => Some((text, 11)),
            (TokenKind::Ident, "await") => None,
            _ => return self.parse_postfix(),
        };

        self.advance();
        match unary {
            Some((op, prec)) => {
                let operand = self.parse_binary(prec)?;
                let span = token.span.to(self.span_of(operand));
                Ok(self.add(NodeKind::Unary { op: op.to_string() }, span, vec![operand]))
            }
            None => {
                let operand = self.parse_postfix()?;
                let span = token.span.to(self.span_of(operand));
                Ok(self.add(NodeKind::Await, span, vec![operand]))
            }
        }
    }

    fn parse_postfix(&mut self) -> Result<NodeId> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_op("(") {
                self.advance();
                let mut children = vec![expr];
                children.extend(self.parse_sequence(")")?);
                let span = Span::new(self.span_of(expr).start, self.last_end);
                expr = self.add(NodeKind::Call, span, children);
            } else if self.is_op(".") {
                self.advance();
                let name_token = self.expect_ident()?;
        let name = self.text(&name_token).to_string();
                let span = Span::new(self.span_of(expr).start, self.last_end);
                expr = self.add(NodeKind::Attribute { name }, span, vec![expr]);
            } else if self.is_op("[") {
                self.advance();
                let index = self.parse_expr()?;
                self.expect_op("]")?;
                let span = Span::new(self.span_of(expr).start, self.last_end);
                expr = self.add(NodeKind::Index, span, vec![expr, index]);
            } else {
                return Ok(expr);
            }
        }
    }

    /// 逗号分隔的表达式序列，允许尾随逗号，消费结尾的 `close`
    fn parse_sequence(&mut self, close: &str) -> Result<Vec<NodeId>> {
        let mut items = Vec::new();
        loop {
            if self.is_op(close) {
                break;
            }
            items.push(self.parse_expr()?);
            if self.is_op(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<NodeId> {
        let token = self.peek().clone();
        let text = self.text(&token);
        match &token.kind {
            TokenKind::Str(info) => {
                let info = info.clone();
                self.advance();
                Ok(self.add(NodeKind::StringLiteral(info), token.span, Vec::new()))
            }
            TokenKind::Number => {
                self.advance();
                Ok(self.add(NodeKind::Number, token.span, Vec::new()))
            }
            TokenKind::Ident => match text {
                "true" | "false" | "null" => {
                    self.advance();
                    Ok(self.add(NodeKind::Literal, token.span, Vec::new()))
                }
                "func" => Err(self.unexpected("不支持的 lambda 表达式")),
                t if STATEMENT_KEYWORDS.contains(&t) => Err(self.unexpected("表达式中")),
                _ => {
                    self.advance();
                    Ok(self.add(NodeKind::Identifier, token.span, Vec::new()))
                }
            },
            TokenKind::Op => match text {
                "(" => {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect_op(")")?;
                    Ok(self.add(NodeKind::Paren, self.span_from(token.span.start), vec![inner]))
                }
                "[" => {
                    self.advance();
                    let items = self.parse_sequence("]")?;
                    Ok(self.add(NodeKind::Array, self.span_from(token.span.start), items))
                }
                "{" => self.parse_dictionary(token.span.start),
                "$" | "%" => self.parse_node_path(token.span.start),
                "." => {
                    // Godot 3 的父类方法调用 `.method()`
                    self.advance();
                    let name_token = self.expect_ident()?;
        let name = self.text(&name_token).to_string();
                    Ok(self.add(NodeKind::Attribute { name }, self.span_from(token.span.start), Vec::new()))
                }
                _ => Err(self.unexpected("表达式中")),
            },
            _ => Err(self.unexpected("期望表达式")),
        }
    }

    fn parse_dictionary(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        let mut pairs = Vec::new();
        loop {
            if self.is_op("}") {
                break;
            }
            let key = self.parse_expr()?;
            if self.is_op(":") || self.is_op("=") {
                self.advance();
            } else {
                return Err(self.unexpected("字典键之后"));
            }
            let value = self.parse_expr()?;
            let span = self.span_of(key).to(self.span_of(value));
            pairs.push(self.add(NodeKind::Pair, span, vec![key, value]));
            if self.is_op(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(self.add(NodeKind::Dictionary, self.span_from(start), pairs))
    }

    /// `$Path/To/Node`、`$"Path"`、`%Unique`；路径整体作为不透明的叶子节点
    fn parse_node_path(&mut self, start: usize) -> Result<NodeId> {
        self.advance();
        match self.peek().kind {
            TokenKind::Str(_) => {
                self.advance();
            }
            TokenKind::Ident => {
                self.advance();
                while self.is_op("/") && self.peek().span.start == self.last_end {
                    let next = self.peek_at(1);
                    let adjacent = next.span.start == self.peek().span.end
                        && matches!(next.kind, TokenKind::Ident | TokenKind::Number);
                    if !adjacent {
                        break;
                    }
                    self.advance();
                    self.advance();
                }
            }
            _ => return Err(self.unexpected("节点路径")),
        }
        Ok(self.add(NodeKind::NodePath, self.span_from(start), Vec::new()))
    }
}
