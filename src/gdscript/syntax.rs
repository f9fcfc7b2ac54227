use std::ops::Range;
use std::sync::Arc;

use super::lexer::StringInfo;
use crate::token::TokenPosition;
use crate::utils::{GdError, Result};

/// 字节区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 字节偏移 -> 行列号
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    source: Arc<str>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self::from_shared(Arc::from(source))
    }

    fn from_shared(source: Arc<str>) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            source,
        }
    }

    /// 行号从 1 开始，列号按字符计数从 0 开始
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let end = offset.min(self.source.len());
        let column = self.source.get(start..end).map(|s| s.chars().count()).unwrap_or(0);
        (line + 1, column)
    }

    pub fn position(&self, span: Span) -> TokenPosition {
        let (start_line, start_column) = self.line_col(span.start);
        let (end_line, end_column) = self.line_col(span.end);
        TokenPosition::new(start_line, end_line, start_column, end_column)
    }
}

/// 节点句柄（指向 [`SyntaxTree`] 内部数组的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 分支种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    Elif,
    Else,
}

/// 节点类型
///
/// 子节点约定（`children` 的顺序）：
/// - `Branch`：If/Elif 为 `[条件, 语句...]`，Else 为 `[语句...]`
/// - `VarDecl`：有初始值时为 `[初始值]`，属性块语句不建模
/// - `Return` / `ExprStmt`：`[表达式]`（`return` 无值时为空）
/// - `Assign`：`[目标, 值]`
/// - `For`：`[可迭代表达式, 语句...]`；`While`：`[条件, 语句...]`
/// - `Match`：`[表达式, MatchBranch...]`；`MatchBranch`：`[Pattern, 语句...]`
/// - `Call`：`[被调用者, 参数...]`
/// - `Attribute`：`[对象]`（Godot 3 的 `.method()` 父类调用没有对象）
/// - `Index`：`[对象, 下标]`
/// - `Pair`：`[键, 值]`
/// - `Binary`：`[左, 右]`；`Unary` / `Paren` / `Await`：`[操作数]`
/// - `Ternary`：`[真值, 条件, 假值]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Script,

    // 语句
    Extends,
    ClassName,
    Signal,
    Enum,
    Const,
    VarDecl { name: String },
    FuncDecl { name: String },
    ClassDecl { name: String },
    If,
    Branch(BranchKind),
    For,
    While,
    Match,
    MatchBranch,
    Pattern,
    Return,
    Keyword,
    Assign { op: String },
    ExprStmt,

    // 表达式
    StringLiteral(StringInfo),
    Number,
    Literal,
    Identifier,
    NodePath,
    Array,
    Dictionary,
    Pair,
    Call,
    Attribute { name: String },
    Index,
    Unary { op: String },
    Binary { op: String },
    Ternary,
    Paren,
    Await,
}

impl NodeKind {
    pub fn is_statement(&self) -> bool {
        !self.is_expression() && !matches!(self, NodeKind::Script | NodeKind::Pattern)
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::StringLiteral(_)
                | NodeKind::Number
                | NodeKind::Literal
                | NodeKind::Identifier
                | NodeKind::NodePath
                | NodeKind::Array
                | NodeKind::Dictionary
                | NodeKind::Pair
                | NodeKind::Call
                | NodeKind::Attribute { .. }
                | NodeKind::Index
                | NodeKind::Unary { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Ternary
                | NodeKind::Paren
                | NodeKind::Await
        )
    }

    /// 简短的类型名，用于词条的 `type` 字段与日志
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Script => "script",
            NodeKind::Extends => "extends",
            NodeKind::ClassName => "class_name",
            NodeKind::Signal => "signal",
            NodeKind::Enum => "enum",
            NodeKind::Const => "const",
            NodeKind::VarDecl { .. } => "var",
            NodeKind::FuncDecl { .. } => "func",
            NodeKind::ClassDecl { .. } => "class",
            NodeKind::If => "if",
            NodeKind::Branch(_) => "branch",
            NodeKind::For => "for",
            NodeKind::While => "while",
            NodeKind::Match => "match",
            NodeKind::MatchBranch => "match_branch",
            NodeKind::Pattern => "pattern",
            NodeKind::Return => "return",
            NodeKind::Keyword => "keyword",
            NodeKind::Assign { .. } => "assign",
            NodeKind::ExprStmt => "expression",
            NodeKind::StringLiteral(_) => "string",
            NodeKind::Number => "number",
            NodeKind::Literal => "literal",
            NodeKind::Identifier => "identifier",
            NodeKind::NodePath => "node_path",
            NodeKind::Array => "array",
            NodeKind::Dictionary => "dictionary",
            NodeKind::Pair => "pair",
            NodeKind::Call => "call",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Index => "index",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Ternary => "ternary",
            NodeKind::Paren => "paren",
            NodeKind::Await => "await",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// 一次文本替换
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

/// 语法树（节点数组 + 句柄）
///
/// 节点构建后不再修改；替换子树通过 [`replace_spans`](Self::replace_spans)
/// 生成新版本的树，旧树与旧句柄保持有效。
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: Arc<str>,
    range: Range<usize>,
    nodes: Vec<Node>,
    root: NodeId,
    lines: Arc<LineIndex>,
}

impl SyntaxTree {
    pub(crate) fn from_parts(
        source: Arc<str>,
        range: Range<usize>,
        nodes: Vec<Node>,
        root: NodeId,
        lines: Option<Arc<LineIndex>>,
    ) -> Self {
        let lines = lines.unwrap_or_else(|| Arc::new(LineIndex::from_shared(Arc::clone(&source))));
        Self {
            source,
            range,
            nodes,
            root,
            lines,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 完整源码（分段解析时为整个文件）
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 本树覆盖的源码区间
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 节点的原始文本
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.span(id);
        &self.source[span.start..span.end]
    }

    /// 字符串字面量引号内的内容区间
    pub fn string_content_span(&self, id: NodeId) -> Option<Span> {
        match self.kind(id) {
            NodeKind::StringLiteral(info) => {
                let span = self.span(id);
                let open = info.prefix.len() + info.delimiter.len();
                let close = info.delimiter.len();
                Some(Span::new(span.start + open, span.end - close))
            }
            _ => None,
        }
    }

    /// 字符串字面量引号内的原始内容（保留转义）
    pub fn string_content(&self, id: NodeId) -> Option<&str> {
        self.string_content_span(id)
            .map(|span| &self.source[span.start..span.end])
    }

    pub fn position(&self, span: Span) -> TokenPosition {
        self.lines.position(span)
    }

    /// 前序遍历全部节点
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// 所有节点（前序）
    pub fn all_nodes(&self) -> Descendants<'_> {
        self.descendants(self.root)
    }

    /// 子树中是否存在字符串字面量
    pub fn has_string_node(&self, id: NodeId) -> bool {
        self.descendants(id)
            .any(|n| matches!(self.kind(n), NodeKind::StringLiteral(_)))
    }

    /// 子树中所有字符串字面量
    pub fn string_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|&n| matches!(self.kind(n), NodeKind::StringLiteral(_)))
            .collect()
    }

    /// `Branch` 的条件表达式（Else 分支没有条件）
    pub fn condition(&self, branch: NodeId) -> Option<NodeId> {
        match self.kind(branch) {
            NodeKind::Branch(BranchKind::If | BranchKind::Elif) => self.children(branch).first().copied(),
            _ => None,
        }
    }

    /// 语句的唯一顶层表达式
    pub fn statement_expression(&self, stmt: NodeId) -> Option<NodeId> {
        match self.kind(stmt) {
            NodeKind::ExprStmt | NodeKind::Return | NodeKind::VarDecl { .. } => {
                self.children(stmt).first().copied()
            }
            NodeKind::Assign { .. } => self.children(stmt).get(1).copied(),
            _ => None,
        }
    }

    /// 调用表达式的被调用函数名（`a.b.c()` 取 `c`）
    pub fn callee_name(&self, call: NodeId) -> Option<&str> {
        let callee = *self.children(call).first()?;
        match self.kind(callee) {
            NodeKind::Identifier => Some(self.text(callee)),
            NodeKind::Attribute { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// 调用表达式的实参
    pub fn call_arguments(&self, call: NodeId) -> &[NodeId] {
        match self.kind(call) {
            NodeKind::Call => self.children(call).get(1..).unwrap_or(&[]),
            _ => &[],
        }
    }

    /// 生成应用替换后的新版本
    ///
    /// 替换区间不得重叠；结果会重新解析，解析失败则返回错误，原树不受影响。
    pub fn replace_spans(&self, edits: &[Edit]) -> Result<SyntaxTree> {
        let text = apply_edits(&self.source, edits)?;
        let delta: isize = edits
            .iter()
            .map(|e| e.text.len() as isize - e.span.len() as isize)
            .sum();
        let end = (self.range.end as isize + delta) as usize;
        let source: Arc<str> = Arc::from(text.as_str());
        super::parser::parse_shared(source, self.range.start..end)
    }

    /// 用新文本替换单个节点
    pub fn replace_subtree(&self, id: NodeId, text: &str) -> Result<SyntaxTree> {
        self.replace_spans(&[Edit {
            span: self.span(id),
            text: text.to_string(),
        }])
    }
}

/// 前序遍历迭代器
pub struct Descendants<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// 把一组不重叠的替换应用到文本上
pub fn apply_edits(source: &str, edits: &[Edit]) -> Result<String> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.span.start);

    for pair in sorted.windows(2) {
        if pair[0].span.overlaps(&pair[1].span) || pair[0].span.end > pair[1].span.start {
            return Err(GdError::Translation(format!(
                "替换区间重叠: {}..{} 与 {}..{}",
                pair[0].span.start, pair[0].span.end, pair[1].span.start, pair[1].span.end
            )));
        }
    }

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in sorted {
        if edit.span.end > source.len() || edit.span.start < cursor {
            return Err(GdError::Translation("替换区间越界".to_string()));
        }
        output.push_str(&source[cursor..edit.span.start]);
        output.push_str(&edit.text);
        cursor = edit.span.end;
    }
    output.push_str(&source[cursor..]);
    Ok(output)
}
