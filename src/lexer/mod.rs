//! Tokenizer: text/expression/raw/comment mode switching, trim markers,
//! and line statements (spec §4.1).
//!
//! The teacher hand-rolls a brace-counting scanner
//! (`pipeline::parser::parse_multi_template`) wherever its pest grammar
//! can't see across a mixed literal/template document. Altar's whole
//! document is like that, one level deeper (several tag kinds, explicit
//! trim state, line/column tracking), so the lexer here is hand-rolled
//! throughout rather than grammar-driven.

use crate::error::{AltarResult, Error, Position};
use memchr::memchr;

mod scan;

pub use scan::tokenize_tag_content;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    VariableStart,
    VariableEnd,
    BlockStart,
    BlockEnd,
    Name,
    String,
    Number,
    Operator,
    Punct,
    RawContent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
    pub trim_left: bool,
    pub trim_right: bool,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Token {
        Token {
            kind,
            value: value.into(),
            line,
            column,
            trim_left: false,
            trim_right: false,
        }
    }
}

/// Immutable per-engine syntax configuration (spec §9: "no hidden
/// process-wide mutable state"). Built once via [`SyntaxConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxConfig {
    pub variable_start: String,
    pub variable_end: String,
    pub block_start: String,
    pub block_end: String,
    pub comment_start: String,
    pub comment_end: String,
    pub line_statement_prefix: Option<String>,
    pub line_comment_prefix: Option<String>,
    pub keep_trailing_newline: bool,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        SyntaxConfig {
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            line_statement_prefix: None,
            line_comment_prefix: None,
            keep_trailing_newline: false,
        }
    }
}

impl SyntaxConfig {
    pub fn builder() -> SyntaxConfigBuilder {
        SyntaxConfigBuilder {
            inner: SyntaxConfig::default(),
        }
    }
}

pub struct SyntaxConfigBuilder {
    inner: SyntaxConfig,
}

impl SyntaxConfigBuilder {
    pub fn delimiters(
        mut self,
        variable: (&str, &str),
        block: (&str, &str),
        comment: (&str, &str),
    ) -> Self {
        self.inner.variable_start = variable.0.to_string();
        self.inner.variable_end = variable.1.to_string();
        self.inner.block_start = block.0.to_string();
        self.inner.block_end = block.1.to_string();
        self.inner.comment_start = comment.0.to_string();
        self.inner.comment_end = comment.1.to_string();
        self
    }

    pub fn line_statement_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.line_statement_prefix = Some(prefix.into());
        self
    }

    pub fn line_comment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.line_comment_prefix = Some(prefix.into());
        self
    }

    pub fn keep_trailing_newline(mut self, keep: bool) -> Self {
        self.inner.keep_trailing_newline = keep;
        self
    }

    /// Rejects configurations where a line-statement/line-comment prefix
    /// would be ambiguous against the block/variable delimiters.
    pub fn build(self) -> AltarResult<SyntaxConfig> {
        let cfg = self.inner;
        if cfg.variable_start == cfg.block_start || cfg.block_start == cfg.comment_start {
            return Err(Error::parse(
                "overlapping delimiters in syntax configuration",
                Position::unknown(),
            ));
        }
        Ok(cfg)
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    syntax: &'a SyntaxConfig,
    template_name: Option<&'a str>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, syntax: &'a SyntaxConfig, template_name: Option<&'a str>) -> Self {
        Lexer {
            src,
            syntax,
            template_name,
        }
    }

    pub fn tokenize(&self) -> AltarResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut pos = 0usize;
        let mut line = 1usize;
        let mut col = 1usize;
        let bytes = self.src.as_bytes();
        let len = bytes.len();
        let mut at_line_start = true;

        while pos < len {
            if at_line_start {
                if let Some((new_pos, new_line, new_col)) =
                    self.try_line_directive(pos, line, &mut tokens)?
                {
                    pos = new_pos;
                    line = new_line;
                    col = new_col;
                    at_line_start = true;
                    continue;
                }
            }

            let rest = &self.src[pos..];
            let next_comment = find_at(rest, &self.syntax.comment_start);
            let next_variable = find_at(rest, &self.syntax.variable_start);
            let next_block = find_at(rest, &self.syntax.block_start);

            let candidates = [
                next_comment.map(|p| (p, Marker::Comment)),
                next_variable.map(|p| (p, Marker::Variable)),
                next_block.map(|p| (p, Marker::Block)),
            ];
            let nearest = candidates.into_iter().flatten().min_by_key(|(p, _)| *p);

            match nearest {
                None => {
                    if !self.src[pos..].is_empty() {
                        push_text(&mut tokens, &self.src[pos..], line, col);
                    }
                    pos = len;
                }
                Some((rel, marker)) => {
                    if rel > 0 {
                        push_text(&mut tokens, &self.src[pos..pos + rel], line, col);
                        advance(&self.src[pos..pos + rel], &mut line, &mut col);
                        pos += rel;
                    }
                    match marker {
                        Marker::Comment => {
                            pos = self.consume_comment(pos, &mut line, &mut col, &mut tokens)?;
                        }
                        Marker::Variable => {
                            pos = self.consume_tag(
                                pos,
                                &mut line,
                                &mut col,
                                &mut tokens,
                                TokenKind::VariableStart,
                                TokenKind::VariableEnd,
                                &self.syntax.variable_start.clone(),
                                &self.syntax.variable_end.clone(),
                                false,
                            )?;
                        }
                        Marker::Block => {
                            pos = self.consume_block(pos, &mut line, &mut col, &mut tokens)?;
                        }
                    }
                }
            }
            at_line_start = self.src[..pos].ends_with('\n') || pos == 0;
        }

        tokens.push(Token::new(TokenKind::Eof, "", line, col));
        apply_trim(&mut tokens);
        Ok(tokens)
    }

    fn err_pos(&self, line: usize, col: usize) -> Position {
        Position::new(self.template_name, line, col)
    }

    /// Handles a `{% raw %}`/ordinary block tag or a line statement whose
    /// content turned out to be `raw`. Returns the byte position just past
    /// the consumed construct.
    #[allow(clippy::too_many_arguments)]
    fn consume_tag(
        &self,
        pos: usize,
        line: &mut usize,
        col: &mut usize,
        tokens: &mut Vec<Token>,
        start_kind: TokenKind,
        end_kind: TokenKind,
        opener: &str,
        closer: &str,
        _is_block: bool,
    ) -> AltarResult<usize> {
        let start_line = *line;
        let start_col = *col;
        let mut p = pos + opener.len();
        advance(opener, line, col);
        let trim_left = self.src[p..].starts_with('-');
        if trim_left {
            p += 1;
            advance("-", line, col);
        }

        let (inner_end, trim_right) = find_tag_close(&self.src[p..], closer)
            .ok_or_else(|| {
                Error::lex(
                    format!("unterminated tag, expected '{closer}'"),
                    self.err_pos(start_line, start_col),
                )
            })?;
        let inner = &self.src[p..p + inner_end];

        let mut start_tok = Token::new(start_kind, opener, start_line, start_col);
        start_tok.trim_left = trim_left;
        tokens.push(start_tok);

        let mut inner_line = *line;
        let mut inner_col = *col;
        let inner_tokens = scan::tokenize_tag_content(inner, &mut inner_line, &mut inner_col)
            .map_err(|msg| Error::lex(msg, self.err_pos(*line, *col)))?;
        tokens.extend(inner_tokens);

        advance(inner, line, col);
        p += inner_end;
        let close_len = closer.len() + if trim_right { 1 } else { 0 };
        let close_text = &self.src[p..p + close_len];
        advance(close_text, line, col);
        p += close_len;

        let mut end_tok = Token::new(end_kind, closer, *line, *col);
        end_tok.trim_right = trim_right;
        tokens.push(end_tok);

        Ok(p)
    }

    fn consume_block(
        &self,
        pos: usize,
        line: &mut usize,
        col: &mut usize,
        tokens: &mut Vec<Token>,
    ) -> AltarResult<usize> {
        // Peek ahead to see whether this is a `raw` block without fully
        // tokenizing it first (`raw` takes no arguments).
        let opener = self.syntax.block_start.clone();
        let closer = self.syntax.block_end.clone();
        let mut p = pos + opener.len();
        let trimmed_left = self.src[p..].starts_with('-');
        let probe_start = if trimmed_left { p + 1 } else { p };
        let probe = self.src[probe_start..].trim_start();
        let is_raw = probe.starts_with("raw") && {
            let after_raw = probe["raw".len()..].trim_start();
            let after_raw = after_raw.strip_prefix('-').unwrap_or(after_raw).trim_start();
            after_raw.starts_with(&closer)
        };

        if !is_raw {
            return self.consume_tag(
                pos,
                line,
                col,
                tokens,
                TokenKind::BlockStart,
                TokenKind::BlockEnd,
                &opener,
                &closer,
                true,
            );
        }

        // Consume the `{% raw %}` opener as an ordinary tag...
        let after_open = self.consume_tag(
            pos,
            line,
            col,
            tokens,
            TokenKind::BlockStart,
            TokenKind::BlockEnd,
            &opener,
            &closer,
            true,
        )?;
        p = after_open;

        // ...then scan verbatim until a matching `{% endraw %}`.
        let raw_start_line = *line;
        let raw_start_col = *col;
        let (raw_text, endraw_pos) = find_endraw(&self.src[p..], &opener, &closer)
            .ok_or_else(|| {
                Error::lex(
                    "unterminated raw block, expected 'endraw'",
                    self.err_pos(raw_start_line, raw_start_col),
                )
            })?;

        if !raw_text.is_empty() {
            let raw_tok = Token::new(TokenKind::RawContent, raw_text, *line, *col);
            tokens.push(raw_tok);
        }
        advance(raw_text, line, col);
        p += raw_text.len();

        // Consume the `{% endraw %}` closer as an ordinary tag.
        self.consume_tag(
            p,
            line,
            col,
            tokens,
            TokenKind::BlockStart,
            TokenKind::BlockEnd,
            &opener,
            &closer,
            true,
        )
        .map(|end| {
            let _ = endraw_pos;
            end
        })
    }

    fn consume_comment(
        &self,
        pos: usize,
        line: &mut usize,
        col: &mut usize,
        tokens: &mut Vec<Token>,
    ) -> AltarResult<usize> {
        let start_line = *line;
        let start_col = *col;
        let opener = self.syntax.comment_start.clone();
        let closer = self.syntax.comment_end.clone();
        let mut p = pos + opener.len();
        advance(&opener, line, col);
        let trim_left = self.src[p..].starts_with('-');
        if trim_left {
            p += 1;
            advance("-", line, col);
        }
        let (inner_end, trim_right) = find_tag_close(&self.src[p..], &closer).ok_or_else(|| {
            Error::lex(
                format!("unterminated comment, expected '{closer}'"),
                self.err_pos(start_line, start_col),
            )
        })?;
        let inner = &self.src[p..p + inner_end];
        advance(inner, line, col);
        p += inner_end;
        let close_len = closer.len() + if trim_right { 1 } else { 0 };
        advance(&self.src[p..p + close_len], line, col);
        p += close_len;

        // Comments leave behind synthetic start/end markers purely to carry
        // the trim flags; the parser discards any token pair shaped like
        // this (start immediately followed by end, no body) automatically
        // because no parser rule ever looks for one -- simpler to just not
        // emit anything and apply trim against neighboring Text directly.
        if trim_left {
            if let Some(last) = tokens.last_mut() {
                if last.kind == TokenKind::Text {
                    last.trim_right = true;
                }
            }
        }
        if trim_right {
            tokens.push(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                line: *line,
                column: *col,
                trim_left: false,
                trim_right: true,
            });
            let marker = tokens.pop().unwrap();
            // Stash the trim-right request on a zero-width marker consumed
            // immediately by `apply_trim`'s text-trimming pass below.
            tokens.push(Token {
                kind: TokenKind::Text,
                value: String::new(),
                line: marker.line,
                column: marker.column,
                trim_left: false,
                trim_right: true,
            });
        }
        Ok(p)
    }

    /// If `pos` is at the start of a physical line and a line-statement or
    /// line-comment prefix is configured and present (after leading
    /// whitespace), handles it and returns the new scan position.
    fn try_line_directive(
        &self,
        pos: usize,
        line: usize,
        tokens: &mut Vec<Token>,
    ) -> AltarResult<Option<(usize, usize, usize)>> {
        let rest = &self.src[pos..];
        let ws_len = rest.len() - rest.trim_start_matches([' ', '\t']).len();
        let after_ws = &rest[ws_len..];

        if let Some(prefix) = &self.syntax.line_comment_prefix {
            if after_ws.starts_with(prefix.as_str()) {
                let line_len = after_ws.find('\n').map(|i| i + 1).unwrap_or(after_ws.len());
                let consumed = ws_len + line_len;
                return Ok(Some((pos + consumed, line + 1, 1)));
            }
        }
        if let Some(prefix) = &self.syntax.line_statement_prefix {
            if after_ws.starts_with(prefix.as_str()) {
                let body_start = ws_len + prefix.len();
                let body = &rest[body_start..];
                let line_len = body.find('\n').unwrap_or(body.len());
                let content = &body[..line_len];

                let mut start_tok =
                    Token::new(TokenKind::BlockStart, &self.syntax.block_start, line, 1);
                start_tok.trim_left = false;
                tokens.push(start_tok);
                let mut inner_line = line;
                let mut inner_col = 1;
                let inner_tokens =
                    scan::tokenize_tag_content(content, &mut inner_line, &mut inner_col)
                        .map_err(|msg| Error::lex(msg, self.err_pos(line, 1)))?;
                tokens.extend(inner_tokens);
                let mut end_tok =
                    Token::new(TokenKind::BlockEnd, &self.syntax.block_end, line, 1);
                end_tok.trim_right = false;
                tokens.push(end_tok);

                let consumed = body_start + line_len + if line_len < body.len() { 1 } else { 0 };
                return Ok(Some((pos + consumed, line + 1, 1)));
            }
        }
        Ok(None)
    }
}

enum Marker {
    Comment,
    Variable,
    Block,
}

fn find_at(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let first = needle.as_bytes()[0];
    let mut offset = 0;
    loop {
        let slice = &haystack.as_bytes()[offset..];
        match memchr(first, slice) {
            None => return None,
            Some(i) => {
                let at = offset + i;
                if haystack[at..].starts_with(needle) {
                    return Some(at);
                }
                offset = at + 1;
            }
        }
    }
}

/// Finds the closer, honoring string literals inside the tag so a `%}` or
/// `}}` inside a quoted string doesn't end the tag early. Returns the byte
/// offset of the closer (relative to the search start) and whether a
/// trim-right `-` preceded it.
fn find_tag_close(s: &str, closer: &str) -> Option<(usize, bool)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut in_string: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        if c == b'\'' || c == b'"' {
            in_string = Some(c);
            i += 1;
            continue;
        }
        if c == b'-' && s[i + 1..].starts_with(closer) {
            return Some((i, true));
        }
        if s[i..].starts_with(closer) {
            return Some((i, false));
        }
        i += 1;
    }
    None
}

fn find_endraw<'a>(s: &'a str, opener: &str, closer: &str) -> Option<(&'a str, usize)> {
    let mut search_from = 0;
    loop {
        let rel = find_at(&s[search_from..], opener)?;
        let at = search_from + rel;
        let mut p = at + opener.len();
        let trim = s[p..].starts_with('-');
        if trim {
            p += 1;
        }
        let after = s[p..].trim_start();
        if after.starts_with("endraw") {
            let tail = after["endraw".len()..].trim_start();
            let tail_trim = tail.starts_with('-');
            let check = if tail_trim { &tail[1..] } else { tail };
            if check.starts_with(closer) {
                return Some((&s[..at], at));
            }
        }
        search_from = at + opener.len();
    }
}

fn push_text(tokens: &mut Vec<Token>, text: &str, line: usize, col: usize) {
    tokens.push(Token::new(TokenKind::Text, text, line, col));
}

fn advance(text: &str, line: &mut usize, col: &mut usize) {
    for ch in text.chars() {
        if ch == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
    }
}

/// A token whose `value` is raw template source that trim markers can eat
/// into: either literal text, or the verbatim body of a `{% raw %}` block.
fn is_trimmable(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::Text | TokenKind::RawContent)
}

/// Applies trim-left/trim-right flags from delimiter tokens to the Text/
/// RawContent tokens immediately beside them, per spec §4.1: strip
/// trailing/leading whitespace up to and including at most one newline.
/// `{% raw %}`'s own content is eligible too -- `{%- raw -%}`/`{%- endraw -%}`
/// trim the raw body itself, same as any other tag pair.
fn apply_trim(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        let trim_left = tokens[i].trim_left
            && matches!(
                tokens[i].kind,
                TokenKind::BlockStart | TokenKind::VariableStart
            );
        if trim_left {
            if let Some(prev) = (0..i).rev().find(|&j| is_trimmable(&tokens[j].kind)) {
                tokens[prev].value = trim_trailing_ws_one_newline(&tokens[prev].value);
            }
        }
        let trim_right = tokens[i].trim_right
            && matches!(tokens[i].kind, TokenKind::BlockEnd | TokenKind::VariableEnd);
        if trim_right {
            if let Some(next) = (i + 1..tokens.len()).find(|&j| is_trimmable(&tokens[j].kind)) {
                tokens[next].value = trim_leading_ws_one_newline(&tokens[next].value);
            }
        }
        // Comment-driven trims are stashed directly on Text tokens (see
        // `consume_comment`); apply them the same way.
        if tokens[i].kind == TokenKind::Text && tokens[i].trim_right && tokens[i].value.is_empty()
        {
            if let Some(next) = (i + 1..tokens.len()).find(|&j| is_trimmable(&tokens[j].kind)) {
                tokens[next].value = trim_leading_ws_one_newline(&tokens[next].value);
            }
        }
    }
}

fn trim_trailing_ws_one_newline(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut end = s.len();
    let mut newlines = 0;
    while end > 0 {
        match bytes[end - 1] {
            b' ' | b'\t' => end -= 1,
            b'\n' if newlines == 0 => {
                newlines += 1;
                end -= 1;
                if end > 0 && bytes[end - 1] == b'\r' {
                    end -= 1;
                }
            }
            _ => break,
        }
    }
    s[..end].to_string()
}

fn trim_leading_ws_one_newline(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut start = 0;
    let mut newlines = 0;
    while start < bytes.len() {
        match bytes[start] {
            b' ' | b'\t' => start += 1,
            b'\r' if newlines == 0 && bytes.get(start + 1) == Some(&b'\n') => {
                newlines += 1;
                start += 2;
            }
            b'\n' if newlines == 0 => {
                newlines += 1;
                start += 1;
            }
            _ => break,
        }
    }
    s[start..].to_string()
}
