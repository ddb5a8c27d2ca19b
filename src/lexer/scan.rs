//! Tokenizes the content of a single `{{ ... }}` / `{% ... %}` tag (or a
//! line-statement body) into `Name`/`String`/`Number`/`Operator`/`Punct`
//! tokens. Grounded on the teacher's `parser::process_arg` escape-sequence
//! handling -- same backslash table, same "no backslash, fast path"
//! shortcut -- applied here to quoted string literals instead of pipeline
//! argument text.

use super::{Token, TokenKind};

pub fn tokenize_tag_content(
    s: &str,
    line: &mut usize,
    col: &mut usize,
) -> Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                bump(s, &mut i, 1, line, col);
            }
            '\'' | '"' => {
                let (value, consumed) = scan_string(&s[i..], c)?;
                out.push(Token::new(TokenKind::String, value, *line, *col));
                bump(s, &mut i, consumed, line, col);
            }
            '0'..='9' => {
                let consumed = scan_number_len(&s[i..]);
                out.push(Token::new(
                    TokenKind::Number,
                    &s[i..i + consumed],
                    *line,
                    *col,
                ));
                bump(s, &mut i, consumed, line, col);
            }
            c if c.is_alphabetic() || c == '_' => {
                let consumed = scan_name_len(&s[i..]);
                out.push(Token::new(
                    TokenKind::Name,
                    &s[i..i + consumed],
                    *line,
                    *col,
                ));
                bump(s, &mut i, consumed, line, col);
            }
            _ => {
                let (kind, consumed) = scan_symbol(&s[i..])
                    .ok_or_else(|| format!("unknown operator starting with '{c}'"))?;
                out.push(Token::new(kind, &s[i..i + consumed], *line, *col));
                bump(s, &mut i, consumed, line, col);
            }
        }
    }

    Ok(out)
}

fn bump(_s: &str, i: &mut usize, n: usize, line: &mut usize, col: &mut usize) {
    let chunk = &_s[*i..*i + n];
    for ch in chunk.chars() {
        if ch == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
    }
    *i += n;
}

fn scan_name_len(s: &str) -> usize {
    s.char_indices()
        .take_while(|&(i, c)| {
            if i == 0 {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || c == '_'
            }
        })
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}

fn scan_number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }
    i
}

/// Parses a quoted string literal, returning its decoded value and the
/// number of source bytes it occupied (including both quotes).
fn scan_string(s: &str, quote: char) -> Result<(String, usize), String> {
    let bytes = s.as_bytes();
    let q = quote as u8;
    let mut i = 1;
    let mut value = String::new();
    while i < bytes.len() {
        let c = bytes[i];
        if c == q {
            return Ok((value, i + 1));
        }
        if c == b'\\' {
            let esc = bytes.get(i + 1).copied();
            match esc {
                Some(b'n') => value.push('\n'),
                Some(b't') => value.push('\t'),
                Some(b'r') => value.push('\r'),
                Some(b'\\') => value.push('\\'),
                Some(b'\'') => value.push('\''),
                Some(b'"') => value.push('"'),
                Some(other) => {
                    value.push('\\');
                    value.push(other as char);
                }
                None => return Err("unterminated string literal".to_string()),
            }
            i += 2;
            continue;
        }
        // advance by full utf8 char
        let ch_len = utf8_len(c);
        value.push_str(std::str::from_utf8(&bytes[i..i + ch_len]).unwrap_or(""));
        i += ch_len;
    }
    Err("unterminated string literal".to_string())
}

fn utf8_len(first_byte: u8) -> usize {
    if first_byte & 0x80 == 0 {
        1
    } else if first_byte & 0xE0 == 0xC0 {
        2
    } else if first_byte & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

const MULTI_CHAR_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "//", "**", "~"];

fn scan_symbol(s: &str) -> Option<(TokenKind, usize)> {
    for op in MULTI_CHAR_OPERATORS {
        if s.starts_with(op) {
            return Some((TokenKind::Operator, op.len()));
        }
    }
    let c = s.chars().next()?;
    match c {
        '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '|' => {
            Some((TokenKind::Operator, c.len_utf8()))
        }
        ',' | ':' | '[' | ']' | '(' | ')' | '{' | '}' | '.' => {
            Some((TokenKind::Punct, c.len_utf8()))
        }
        _ => None,
    }
}
