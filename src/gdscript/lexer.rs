use std::ops::Range;

use super::syntax::{LineIndex, Span};
use crate::utils::{GdError, Result};

/// 词法单元类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str(StringInfo),
    Op,
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// 字符串字面量的分隔信息
///
/// 例如 `&"Name"`：前缀 `&`，分隔符 `"`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringInfo {
    /// 前缀（`r`、`&`、`^` 或空）
    pub prefix: String,
    /// 引号（`"`、`'`、`"""` 或 `'''`）
    pub delimiter: String,
}

impl StringInfo {
    /// 用相同的前缀和引号包裹内容
    pub fn wrap(&self, content: &str) -> String {
        format!("{}{}{}{}", self.prefix, self.delimiter, content, self.delimiter)
    }

    /// 是否为原始字符串（不处理转义）
    pub fn is_raw(&self) -> bool {
        self.prefix == "r"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// 按长度从长到短排列，保证最长匹配
const OPERATORS: &[&str] = &[
    "**=", "<<=", ">>=", "**", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "<<", ">>", "->", ":=", "..", "+", "-", "*", "/", "%", "<", ">", "=", "!",
    "&", "|", "^", "~", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "$", "@", "?",
];

/// 把源码的一段切分为词法单元
///
/// 括号内的换行与行尾 `\` 续行不产生 `Newline`；
/// 逻辑行首的缩进变化产生 `Indent` / `Dedent`。
pub fn tokenize(source: &str, range: Range<usize>) -> Result<Vec<Token>> {
    Lexer::new(source, range).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    end: usize,
    depth: usize,
    indents: Vec<usize>,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, range: Range<usize>) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: range.start,
            end: range.end.min(source.len()),
            depth: 0,
            indents: Vec::new(),
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.end {
            if self.at_line_start && self.depth == 0 {
                self.handle_indentation();
                if self.pos >= self.end {
                    break;
                }
            }

            let c = self.bytes[self.pos];
            match c {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push_newline(self.pos - 1);
                        self.at_line_start = true;
                    }
                }
                b'#' => self.skip_comment(),
                b'\\' if self.continues_line() => {}
                b'"' | b'\'' => self.lex_string(self.pos, String::new())?,
                b'r' | b'&' | b'^' if self.is_quote(self.pos + 1) => {
                    let prefix = (c as char).to_string();
                    self.lex_string(self.pos, prefix)?;
                }
                b'0'..=b'9' => self.lex_number(),
                b'.' if self.pos + 1 < self.end && self.bytes[self.pos + 1].is_ascii_digit() => {
                    self.lex_number()
                }
                c if c == b'_' || c.is_ascii_alphabetic() || c >= 0x80 => self.lex_ident(),
                _ => self.lex_operator()?,
            }
        }

        let eof = self.end;
        if !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.push_newline(eof);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, eof, eof);
        }
        self.push(TokenKind::Eof, eof, eof);
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn push_newline(&mut self, at: usize) {
        let emit = matches!(
            self.tokens.last().map(|t| &t.kind),
            Some(TokenKind::Ident | TokenKind::Number | TokenKind::Str(_) | TokenKind::Op)
        );
        if emit {
            self.push(TokenKind::Newline, at, at);
        }
    }

    /// 计算逻辑行首的缩进宽度（制表符按 4 计），空行与注释行不参与
    fn handle_indentation(&mut self) {
        let line_start = self.pos;
        let mut width = 0;
        while self.pos < self.end {
            match self.bytes[self.pos] {
                b' ' => width += 1,
                b'\t' => width += 4,
                b'\r' => {}
                _ => break,
            }
            self.pos += 1;
        }
        if self.pos >= self.end {
            return;
        }
        match self.bytes[self.pos] {
            b'\n' | b'#' => return,
            _ => {}
        }
        self.at_line_start = false;

        let current = match self.indents.last() {
            Some(&current) => current,
            None => {
                self.indents.push(width);
                return;
            }
        };
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, line_start, self.pos);
        } else if width < current {
            while self.indents.len() > 1 && self.indents[self.indents.len() - 1] > width {
                self.indents.pop();
                self.push(TokenKind::Dedent, self.pos, self.pos);
            }
            if self.indents.last().is_some_and(|&top| top < width) {
                // 与任何外层缩进都不对齐时按新的一层处理
                self.indents.push(width);
                self.push(TokenKind::Indent, line_start, self.pos);
            }
        }
    }

    fn skip_comment(&mut self) {
        while self.pos < self.end && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    /// 行尾 `\` 续行
    fn continues_line(&mut self) -> bool {
        let mut next = self.pos + 1;
        while next < self.end && matches!(self.bytes[next], b' ' | b'\t' | b'\r') {
            next += 1;
        }
        if next < self.end && self.bytes[next] == b'\n' {
            self.pos = next + 1;
            true
        } else {
            false
        }
    }

    fn is_quote(&self, at: usize) -> bool {
        at < self.end && matches!(self.bytes[at], b'"' | b'\'')
    }

    fn lex_string(&mut self, start: usize, prefix: String) -> Result<()> {
        let quote_at = start + prefix.len();
        let quote = self.bytes[quote_at];
        let triple = quote_at + 2 < self.end
            && self.bytes[quote_at + 1] == quote
            && self.bytes[quote_at + 2] == quote;
        let delimiter_len = if triple { 3 } else { 1 };
        let raw = prefix == "r";

        let mut pos = quote_at + delimiter_len;
        loop {
            if pos >= self.end {
                return Err(self.error(start, "未闭合的字符串"));
            }
            let c = self.bytes[pos];
            if c == b'\\' && !raw {
                pos += 2;
                continue;
            }
            if c == quote {
                if !triple {
                    pos += 1;
                    break;
                }
                if pos + 2 < self.end
                    && self.bytes[pos + 1] == quote
                    && self.bytes[pos + 2] == quote
                {
                    pos += 3;
                    break;
                }
            }
            pos += 1;
        }

        let delimiter = String::from_utf8_lossy(&self.bytes[quote_at..quote_at + delimiter_len]).into_owned();
        self.push(TokenKind::Str(StringInfo { prefix, delimiter }), start, pos);
        self.pos = pos;
        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.pos;
        let mut prev = 0u8;
        while self.pos < self.end {
            let c = self.bytes[self.pos];
            let exponent_sign = (c == b'-' || c == b'+')
                && (prev == b'e' || prev == b'E')
                && !self.source[start..self.pos].starts_with("0x");
            if c.is_ascii_alphanumeric() || c == b'_' || exponent_sign {
                prev = c;
                self.pos += 1;
            } else if c == b'.'
                && self.pos + 1 < self.end
                && self.bytes[self.pos + 1].is_ascii_digit()
            {
                prev = c;
                self.pos += 1;
            } else if c == b'.' && !self.source[start..self.pos].contains('.') {
                // `1.` 形式的浮点数，但不能吞掉 `1.method()` 的点
                let next = self.bytes.get(self.pos + 1).copied().unwrap_or(b' ');
                if next.is_ascii_alphabetic() || next == b'_' {
                    break;
                }
                prev = c;
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start, self.pos);
    }

    fn lex_ident(&mut self) {
        let start = self.pos;
        while self.pos < self.end {
            let c = self.bytes[self.pos];
            if c == b'_' || c.is_ascii_alphanumeric() || c >= 0x80 {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident, start, self.pos);
    }

    fn lex_operator(&mut self) -> Result<()> {
        let rest = &self.source[self.pos..self.end];
        let op = OPERATORS
            .iter()
            .find(|op| rest.starts_with(**op))
            .ok_or_else(|| self.error(self.pos, "无法识别的字符"))?;

        match *op {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        let start = self.pos;
        self.pos += op.len();
        self.push(TokenKind::Op, start, self.pos);
        Ok(())
    }

    fn error(&self, at: usize, message: &str) -> GdError {
        let (line, column) = LineIndex::new(self.source).line_col(at);
        GdError::Parse {
            line,
            column,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, 0..source.len())
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source, 0..source.len())
            .unwrap()
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof))
            .map(|t| t.text(source).to_string())
            .collect()
    }

    #[test]
    fn test_basic_tokens() {
        assert_eq!(
            texts("var x := a.b(1, \"hi\") # comment"),
            vec!["var", "x", ":=", "a", ".", "b", "(", "1", ",", "\"hi\"", ")"]
        );
    }

    #[test]
    fn test_string_forms() {
        let source = r#"'a' "b\"c" """x
y""" &"name" ^"path" r"raw\d""#;
        let tokens = tokenize(source, 0..source.len()).unwrap();
        let strings: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Str(info) => Some((info.clone(), t.text(source).to_string())),
                _ => None,
            })
            .collect();
        assert_eq!(strings.len(), 6);
        assert_eq!(strings[1].1, r#""b\"c""#);
        assert_eq!(strings[2].0.delimiter, "\"\"\"");
        assert_eq!(strings[3].0.prefix, "&");
        assert_eq!(strings[4].0.prefix, "^");
        assert!(strings[5].0.is_raw());
    }

    #[test]
    fn test_unterminated_string() {
        let source = "sayn(\"oops)\n";
        assert!(matches!(
            tokenize(source, 0..source.len()),
            Err(GdError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_indent_and_dedent() {
        let source = "func a():\n\tif x:\n\t\tpass\n\treturn 1\n";
        let kinds = kinds(source);
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Indent).count(), 2);
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Dedent).count(), 2);
        assert_eq!(kinds.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let source = "var d = {\n\t\"a\": 1,\n}\nvar e = 2\n";
        let newlines = kinds(source).iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn test_line_continuation() {
        let source = "var a = 1 + \\\n\t2\n";
        let kinds = kinds(source);
        assert!(!kinds.contains(&TokenKind::Indent));
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("1.5e-3 0xFF 1_000 .5 3.floor()"), vec![
            "1.5e-3", "0xFF", "1_000", ".5", "3", ".", "floor", "(", ")"
        ]);
    }
}
