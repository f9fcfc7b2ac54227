//! GDScript 语法解析
//!
//! 只覆盖提取与回写需要的语法结构：语句、表达式以及它们在源码中的精确位置。
//! 函数签名、枚举、信号、match 模式等与文本无关的部分按不透明区间跳过。

mod lexer;
mod parser;
mod syntax;

pub use lexer::{tokenize, StringInfo, Token, TokenKind};
pub use parser::{parse_expression, parse_range, parse_script, parse_statement};
pub(crate) use parser::parse_with_lines;
pub use syntax::{
    apply_edits, BranchKind, Descendants, Edit, LineIndex, Node, NodeId, NodeKind, Span, SyntaxTree,
};
