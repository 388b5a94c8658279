//! Structural scanner for import call sites in module sources.
//!
//! The scanner tokenizes just enough of the source to tell code apart from
//! string literals and comments. Regular-expression literals are not
//! recognized; a regex containing a quote can hide the rest of its line.

/// Identifier of the import primitive.
pub const IMPORT_CALLEE: &str = "require";

/// Keyword that turns an import call into a suspension point.
pub const SUSPEND_KEYWORD: &str = "yield";

/// One `require(...)` call found in a module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    /// Byte offset of the `require` identifier.
    pub offset: usize,
    /// The first argument, when it is a single plain string literal.
    pub specifier: Option<String>,
    /// The call is already preceded by `yield`.
    pub suspended: bool,
}

/// Find every import call in `source`, in source order.
///
/// Skips occurrences inside strings and comments, member calls such as
/// `loader.require(`, and definitions such as `function require(`. The
/// `${...}` substitutions of template literals are code and are scanned.
pub fn scan_imports(source: &str) -> Vec<ImportSite> {
    let mut sites = Vec::new();
    scan_code(source, 0, false, &mut sites);
    sites
}

/// Scan code starting at `i`. When `nested` (inside a template
/// substitution), stops at the `}` closing it and returns the index past it.
fn scan_code(source: &str, mut i: usize, nested: bool, sites: &mut Vec<ImportSite>) -> usize {
    let bytes = source.as_bytes();
    let mut depth = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = find_byte(bytes, i + 2, b'\n').unwrap_or(bytes.len());
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_block_end(bytes, i + 2);
            }
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
            }
            b'`' => {
                i = scan_template(source, i, sites);
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                if nested && depth == 0 {
                    return i + 1;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < bytes.len() && is_ident(bytes[i]) {
                    i += 1;
                }
                if &source[start..i] != IMPORT_CALLEE
                    || !is_call(bytes, i)
                    || is_member_access(bytes, start)
                {
                    continue;
                }
                let previous = previous_word(source, start);
                if previous == Some("function") {
                    continue;
                }
                sites.push(ImportSite {
                    offset: start,
                    specifier: literal_argument(source, i),
                    suspended: previous == Some(SUSPEND_KEYWORD),
                });
            }
            _ => i += 1,
        }
    }

    bytes.len()
}

/// Walk a template literal from its opening backtick, scanning each
/// substitution as code. Returns the index past the closing backtick.
fn scan_template(source: &str, open: usize, sites: &mut Vec<ImportSite>) -> usize {
    let bytes = source.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = scan_code(source, i + 2, true, sites);
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == needle)
        .map(|p| from + p)
}

fn find_block_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Returns the index just past the closing quote.
fn skip_string(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn is_call(bytes: &[u8], end: usize) -> bool {
    bytes.get(skip_whitespace(bytes, end)) == Some(&b'(')
}

fn last_non_space_before(bytes: &[u8], start: usize) -> Option<usize> {
    (0..start).rev().find(|&i| !bytes[i].is_ascii_whitespace())
}

fn is_member_access(bytes: &[u8], start: usize) -> bool {
    last_non_space_before(bytes, start).is_some_and(|i| bytes[i] == b'.')
}

fn previous_word(source: &str, start: usize) -> Option<&str> {
    let bytes = source.as_bytes();
    let end = last_non_space_before(bytes, start)? + 1;
    let mut begin = end;
    while begin > 0 && is_ident(bytes[begin - 1]) {
        begin -= 1;
    }
    (begin < end).then(|| &source[begin..end])
}

fn literal_argument(source: &str, callee_end: usize) -> Option<String> {
    let bytes = source.as_bytes();
    let open = skip_whitespace(bytes, callee_end);
    let quote_at = skip_whitespace(bytes, open + 1);
    let quote = *bytes.get(quote_at)?;
    if !matches!(quote, b'\'' | b'"' | b'`') {
        return None;
    }
    let close = find_byte(bytes, quote_at + 1, quote)?;
    let text = &source[quote_at + 1..close];
    if text.contains('\\') || (quote == b'`' && text.contains("${")) {
        return None;
    }
    (bytes.get(skip_whitespace(bytes, close + 1)) == Some(&b')')).then(|| text.to_string())
}
