//! Tag scanner primitives.
//!
//! Works directly on byte offsets: tag names and attribute syntax are
//! ASCII, so offsets produced by the matchers always fall on character
//! boundaries of the surrounding UTF-8 text. Bodies may span lines; tag
//! names match case-insensitively; anything that does not parse as a tag
//! is skipped rather than reported.

/// One scanned tag element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagElement {
    /// Parsed `key=value` attributes, in source order.
    pub attrs: Vec<(String, String)>,
    /// Inner text for paired tags; `None` for self-closing elements.
    pub body: Option<String>,
}

/// Remove markdown code-fence markers so fenced tags are scannable.
///
/// Strips every ` ``` ` marker together with a trailing language label
/// and at most one following newline; all other text is preserved.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'`' && bytes.get(i + 1) == Some(&b'`') && bytes.get(i + 2) == Some(&b'`') {
            i += 3;
            while i < bytes.len() && bytes[i].is_ascii_lowercase() {
                i += 1;
            }
            if bytes.get(i) == Some(&b'\n') {
                i += 1;
            }
            continue;
        }
        let ch = text[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// All elements of `name` in document order.
///
/// Matches both paired (`<name ...>body</name>`) and self-closing
/// (`<name ... />`) forms. An open tag without its close tag is skipped.
#[must_use]
pub fn scan_elements(text: &str, name: &str) -> Vec<TagElement> {
    let mut elements = Vec::new();
    let mut from = 0;
    while let Some(open_at) = find_open_tag(text, name, from) {
        let name_end = open_at + 1 + name.len();
        let Some(gt) = find_tag_close(text, name_end) else {
            break; // unterminated open tag: nothing further can match
        };
        let raw_attrs = &text[name_end..gt];
        let self_closing = raw_attrs.trim_end().ends_with('/');
        let attr_src = raw_attrs.trim_end().trim_end_matches('/');
        let attrs = parse_attributes(attr_src);

        if self_closing {
            elements.push(TagElement { attrs, body: None });
            from = gt + 1;
            continue;
        }

        match find_close_tag(text, name, gt + 1) {
            Some((body_end, resume)) => {
                elements.push(TagElement {
                    attrs,
                    body: Some(text[gt + 1..body_end].to_owned()),
                });
                from = resume;
            }
            // no close tag: skip this open tag, keep scanning after it
            None => from = gt + 1,
        }
    }
    elements
}

/// Trimmed bodies of every paired `name` element, in document order.
#[must_use]
pub fn scan_bodies(text: &str, name: &str) -> Vec<String> {
    scan_elements(text, name)
        .into_iter()
        .filter_map(|el| el.body)
        .map(|body| body.trim().to_owned())
        .collect()
}

/// Parse `key=value` attribute pairs.
///
/// Values may be double-quoted, single-quoted, or bare (terminated by
/// whitespace). Fragments that do not parse are skipped one byte at a
/// time, so garbage between attributes cannot abort the scan.
#[must_use]
pub fn parse_attributes(src: &str) -> Vec<(String, String)> {
    let bytes = src.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let key_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-') {
            i += 1;
        }
        if i == key_start {
            i += 1; // not a key character: skip it
            continue;
        }
        let key = &src[key_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            continue; // bare word without a value
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                i += 1;
                let value_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                let value = &src[value_start..i];
                if i < bytes.len() {
                    i += 1; // consume closing quote
                }
                value
            }
            Some(_) => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &src[value_start..i]
            }
            None => "",
        };
        attrs.push((key.to_owned(), value.to_owned()));
    }
    attrs
}

/// Find the next `<name` occurrence (ASCII case-insensitive) at or after
/// `from` that is followed by whitespace, `>`, or `/`.
fn find_open_tag(text: &str, name: &str, mut from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let name_bytes = name.as_bytes();
    while from + 1 + name_bytes.len() <= bytes.len() {
        let Some(lt) = find_byte(bytes, b'<', from) else {
            return None;
        };
        let name_start = lt + 1;
        let name_end = name_start + name_bytes.len();
        if name_end <= bytes.len()
            && bytes[name_start..name_end].eq_ignore_ascii_case(name_bytes)
            && matches!(bytes.get(name_end), Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
        {
            return Some(lt);
        }
        from = lt + 1;
    }
    None
}

/// Find the `>` ending an open tag, honoring quoted attribute values.
fn find_tag_close(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    for (offset, &b) in bytes[from..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(from + offset),
            None => {}
        }
    }
    None
}

/// Find `</name>` (case-insensitive, optional internal whitespace before
/// `>`). Returns `(body_end, resume_offset)`.
fn find_close_tag(text: &str, name: &str, mut from: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let name_bytes = name.as_bytes();
    loop {
        let lt = find_byte(bytes, b'<', from)?;
        if bytes.get(lt + 1) != Some(&b'/') {
            from = lt + 1;
            continue;
        }
        let name_start = lt + 2;
        let name_end = name_start + name_bytes.len();
        if name_end > bytes.len() || !bytes[name_start..name_end].eq_ignore_ascii_case(name_bytes) {
            from = lt + 1;
            continue;
        }
        let mut gt = name_end;
        while gt < bytes.len() && bytes[gt].is_ascii_whitespace() {
            gt += 1;
        }
        if bytes.get(gt) == Some(&b'>') {
            return Some((lt, gt + 1));
        }
        from = lt + 1;
    }
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|offset| from + offset)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
