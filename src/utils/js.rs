//! Bounding of JavaScript fragments inside minified player source

use crate::error::SigError;

/// Text between the first occurrence of `left` and the next `right` after it.
///
/// Returns `None` when either marker is missing or the enclosed text is empty.
pub fn between<'a>(haystack: &'a str, left: &str, right: &str) -> Option<&'a str> {
    let start = haystack.find(left)? + left.len();
    let rest = &haystack[start..];
    let end = rest.find(right)?;
    Some(&rest[..end]).filter(|s| !s.is_empty())
}

/// Cut a balanced structure off the front of `code`.
///
/// `code` must begin with `{`, `[` or `(`; the returned slice runs from that
/// delimiter through its matching closer.
pub fn cut_after_js(code: &str) -> Result<&str, SigError> {
    let body = scan_balanced(code, 1)?;
    Ok(&code[..body.len() + 1])
}

/// Scan from `start` (the offset just after an opening delimiter) to the
/// matching closing delimiter, returning `text[start..=close]`.
///
/// Delimiters inside string literals, template literals, regular expression
/// literals and comments are ignored; backslash escapes are honoured.
pub fn scan_balanced(text: &str, start: usize) -> Result<&str, SigError> {
    let bytes = text.as_bytes();
    if start == 0 || start > bytes.len() {
        return Err(SigError::BoundaryScan(format!(
            "start offset {} out of range",
            start
        )));
    }

    let opener = bytes[start - 1];
    let closer = closer_for(opener).ok_or_else(|| {
        SigError::BoundaryScan(format!(
            "expected an opening delimiter, found {:?}",
            opener as char
        ))
    })?;

    let mut stack = vec![closer];
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => {
                i = skip_string(bytes, i, quote)?;
                continue;
            }
            b'/' => match bytes.get(i + 1) {
                Some(b'/') => {
                    i = bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |p| i + p);
                    continue;
                }
                Some(b'*') => {
                    i = text[i + 2..]
                        .find("*/")
                        .map(|p| i + 2 + p + 2)
                        .ok_or_else(|| {
                            SigError::BoundaryScan("unterminated block comment".to_string())
                        })?;
                    continue;
                }
                _ if regex_allowed(bytes, i) => {
                    if let Some(end) = skip_regex(bytes, i) {
                        i = end;
                        continue;
                    }
                }
                _ => {}
            },
            open @ (b'{' | b'[' | b'(') => {
                if let Some(close) = closer_for(open) {
                    stack.push(close);
                }
            }
            close @ (b'}' | b']' | b')') => {
                if stack.last() != Some(&close) {
                    return Err(SigError::BoundaryScan(format!(
                        "mismatched {:?} at offset {}",
                        close as char, i
                    )));
                }
                stack.pop();
                if stack.is_empty() {
                    return Ok(&text[start..=i]);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(SigError::BoundaryScan(format!(
        "no matching {:?} found",
        closer as char
    )))
}

fn closer_for(open: u8) -> Option<u8> {
    match open {
        b'{' => Some(b'}'),
        b'[' => Some(b']'),
        b'(' => Some(b')'),
        _ => None,
    }
}

/// Returns the offset just past the closing quote.
fn skip_string(bytes: &[u8], open: usize, quote: u8) -> Result<usize, SigError> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(SigError::BoundaryScan(format!(
        "unterminated string literal at offset {}",
        open
    )))
}

/// A `/` starts a regular expression literal only where an operand is expected.
fn regex_allowed(bytes: &[u8], slash: usize) -> bool {
    let before = &bytes[..slash];
    let Some(pos) = before.iter().rposition(|b| !b.is_ascii_whitespace()) else {
        return true;
    };

    match before[pos] {
        b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';' | b'+'
        | b'-' | b'*' | b'%' | b'<' | b'>' | b'^' | b'~' => true,
        b if is_ident_byte(b) => {
            let word_start = before[..=pos]
                .iter()
                .rposition(|&b| !is_ident_byte(b))
                .map_or(0, |p| p + 1);
            matches!(
                &before[word_start..=pos],
                b"return"
                    | b"typeof"
                    | b"case"
                    | b"in"
                    | b"of"
                    | b"void"
                    | b"delete"
                    | b"new"
                    | b"instanceof"
            )
        }
        _ => false,
    }
}

/// Returns the offset just past the literal and its flags, or `None` when the
/// slash does not open a well-formed literal on this line.
fn skip_regex(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

pub(crate) fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}
