//! Tokenizes carrier text into literals and executable blocks (spec §4.1,
//! §6). Grammar and reconstruction rule are implemented verbatim; the
//! `ParseError` additionally carries a 1-based line/column pair alongside the
//! byte position, matching the amount of diagnostic context the teacher's
//! document/runbook errors always carry.

pub mod splitter;

use crate::error::{Error, Result};
use jdbcx_templates::{PropertyBag, TagStyle, VariableStore};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableBlock {
    pub index: usize,
    pub extension_name: String,
    pub properties: PropertyBag,
    pub content: String,
    pub produces_output: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    pub literals: Vec<String>,
    pub blocks: Vec<ExecutableBlock>,
}

impl ParsedQuery {
    /// Reconstructs the carrier text given a per-block renderer. A block with
    /// no output renders as the empty string (the caller is expected to pass
    /// that in via `render_block`).
    pub fn render_with<F>(&self, mut render_block: F) -> String
    where
        F: FnMut(&ExecutableBlock) -> String,
    {
        let mut out = String::new();
        if self.literals.is_empty() {
            return out;
        }
        out.push_str(&self.literals[0]);
        for (i, block) in self.blocks.iter().enumerate() {
            out.push_str(&render_block(block));
            if let Some(lit) = self.literals.get(i + 1) {
                out.push_str(lit);
            }
        }
        out
    }

    pub fn is_direct_query(&self) -> bool {
        self.literals.iter().all(|l| l.trim().is_empty())
            && self.blocks.iter().all(|b| !b.produces_output)
    }

    pub fn is_static_query(&self) -> bool {
        self.blocks.is_empty() || self.blocks.iter().all(|b| !b.produces_output)
    }
}

fn delimiters(style: TagStyle) -> (&'static str, &'static str, &'static str, &'static str) {
    match style {
        TagStyle::Brace => ("{{", "}}", "{%", "%}"),
        TagStyle::Angle => ("<<", ">>", "<%", "%>"),
        TagStyle::Square => ("[[", "]]", "[%", "%]"),
    }
}

fn line_col(input: &str, byte_pos: usize) -> (usize, usize) {
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, c) in input.char_indices() {
        if i >= byte_pos {
            break;
        }
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn parse_error(input: &str, position: usize, reason: impl Into<String>) -> Error {
    let (line, col) = line_col(input, position);
    Error::Parse {
        position,
        reason: format!("{} (line {line}, column {col})", reason.into()),
    }
}

/// Parses `input` using the given tag style. `bag` is the ambient property
/// bag consulted *only* while parsing block properties (bodies are never
/// substituted here).
pub fn parse(input: &str, style: TagStyle, bag: &PropertyBag) -> Result<ParsedQuery> {
    let (open_out, close_out, open_silent, close_silent) = delimiters(style);
    let mut literals = Vec::new();
    let mut blocks = Vec::new();
    let mut current_literal = String::new();
    let len = input.len();
    let mut i = 0usize;

    while i < len {
        let starts_out = input[i..].starts_with(open_out);
        let starts_silent = input[i..].starts_with(open_silent);
        if !starts_out && !starts_silent {
            let ch = input[i..].chars().next().unwrap();
            current_literal.push(ch);
            i += ch.len_utf8();
            continue;
        }

        let block_start = i;
        let (opener, closer, produces_output) = if starts_out {
            (open_out, close_out, true)
        } else {
            (open_silent, close_silent, false)
        };
        i += opener.len();

        let mut trim_before = false;
        if input[i..].starts_with('-') {
            trim_before = true;
            i += 1;
        }

        let body_start = i;
        let mut depth = 1i32;
        let mut j = i;
        let mut found_close = None;
        while j < len {
            if input[j..].starts_with(closer) {
                depth -= 1;
                if depth == 0 {
                    found_close = Some(j);
                    break;
                }
                j += closer.len();
            } else if input[j..].starts_with(opener) {
                depth += 1;
                j += opener.len();
            } else if input.as_bytes()[j] == b'\\' && j + 1 < len {
                j += 1 + input[j + 1..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            } else {
                j += input[j..].chars().next().unwrap().len_utf8();
            }
        }

        let Some(close_idx) = found_close else {
            return Err(parse_error(input, block_start, "unterminated block: missing closing delimiter"));
        };

        let mut body_end = close_idx;
        let mut trim_after = false;
        if body_end > body_start && input.as_bytes()[body_end - 1] == b'-' {
            trim_after = true;
            body_end -= 1;
        }

        let raw_body = &input[body_start..body_end];
        let block = parse_block_body(input, raw_body, body_start, blocks.len(), produces_output, bag)?;

        if trim_before {
            let trimmed_len = current_literal.trim_end().len();
            current_literal.truncate(trimmed_len);
        }
        literals.push(std::mem::take(&mut current_literal));
        blocks.push(block);
        i = close_idx + closer.len();

        if trim_after {
            while i < len && input.as_bytes()[i].is_ascii_whitespace() {
                i += 1;
            }
        }
    }
    literals.push(current_literal);

    let (literals, blocks) = expand_pre_post(literals, blocks);
    Ok(ParsedQuery { literals, blocks })
}

fn parse_block_body(
    full_input: &str,
    raw: &str,
    raw_offset: usize,
    index: usize,
    produces_output: bool,
    bag: &PropertyBag,
) -> Result<ExecutableBlock> {
    let mut ext_end = 0;
    for (idx, c) in raw.char_indices() {
        if c.is_ascii_alphanumeric() || c == '_' {
            ext_end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    let extension_name = raw[..ext_end].to_string();
    let mut rest = &raw[ext_end..];
    let mut properties = PropertyBag::new();

    if let Some(r) = rest.strip_prefix('.') {
        let id_end = r.find(['(', ':']).unwrap_or(r.len());
        let identifier = r[..id_end].trim().to_string();
        properties.insert("id".to_string(), identifier);
        rest = &r[id_end..];
    }

    if let Some(r) = rest.strip_prefix('(') {
        let close = find_matching_paren(r)
            .ok_or_else(|| parse_error(full_input, raw_offset, "unterminated property list"))?;
        parse_properties(&r[..close], &mut properties, bag)
            .map_err(|reason| parse_error(full_input, raw_offset, reason))?;
        rest = &r[close + 1..];
    }

    let content = rest.strip_prefix(':').unwrap_or("").to_string();
    let content = unescape_content(&content);

    Ok(ExecutableBlock {
        index,
        extension_name,
        properties,
        content,
        produces_output,
    })
}

fn unescape_content(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '{' | '}' | '%' | '<' | '>' | '[' | ']' | ':') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    let mut in_quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        if let Some(q) = in_quote {
            if c == q {
                in_quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => in_quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_properties(s: &str, out: &mut PropertyBag, bag: &PropertyBag) -> std::result::Result<(), String> {
    let bytes = s.as_bytes();
    let len = s.len();
    let mut i = 0usize;
    while i < len {
        while i < len && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= len {
            break;
        }
        let name = read_token(s, &mut i)?;
        while i < len && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        let value = if i < len && bytes[i] == b'=' {
            i += 1;
            while i < len && (bytes[i] as char).is_whitespace() {
                i += 1;
            }
            let raw = read_token(s, &mut i)?;
            substitute_property_value(&raw, bag)
        } else {
            String::new()
        };
        if !name.is_empty() {
            out.insert(name, value);
        }
        while i < len && bytes[i] != b',' {
            i += 1;
        }
        if i < len && bytes[i] == b',' {
            i += 1;
        }
    }
    Ok(())
}

fn read_token(s: &str, i: &mut usize) -> std::result::Result<String, String> {
    let bytes = s.as_bytes();
    let len = s.len();
    if *i < len && (bytes[*i] == b'\'' || bytes[*i] == b'"') {
        let quote = bytes[*i];
        *i += 1;
        let mut out = String::new();
        while *i < len {
            let c = bytes[*i];
            if c == b'\\' && *i + 1 < len {
                out.push(bytes[*i + 1] as char);
                *i += 2;
            } else if c == quote {
                *i += 1;
                return Ok(out);
            } else {
                out.push(c as char);
                *i += 1;
            }
        }
        Err("unterminated quoted value".to_string())
    } else {
        let start = *i;
        while *i < len && bytes[*i] != b',' && bytes[*i] != b'=' {
            *i += 1;
        }
        Ok(s[start..*i].trim().to_string())
    }
}

/// `${var}` inside a property value is substituted from the ambient property
/// bag regardless of which delimiter family the statement uses (spec §4.1);
/// missing variables keep their literal text.
fn substitute_property_value(value: &str, bag: &PropertyBag) -> String {
    let store = VariableStore::new();
    jdbcx_templates::render(value, &store, bag, TagStyle::Brace, None).unwrap_or_else(|_| value.to_string())
}

fn expand_pre_post(
    literals: Vec<String>,
    blocks: Vec<ExecutableBlock>,
) -> (Vec<String>, Vec<ExecutableBlock>) {
    let mut new_literals = Vec::with_capacity(literals.len());
    let mut new_blocks = Vec::with_capacity(blocks.len());
    new_literals.push(literals[0].clone());

    for (i, mut block) in blocks.into_iter().enumerate() {
        let pre = block.properties.remove("pre.query");
        let post = block.properties.remove("post.query");
        let extension_name = block.extension_name.clone();

        if let Some(pre_content) = pre {
            new_blocks.push(ExecutableBlock {
                index: new_blocks.len(),
                extension_name: extension_name.clone(),
                properties: PropertyBag::new(),
                content: pre_content,
                produces_output: false,
            });
            new_literals.push(String::new());
        }

        block.index = new_blocks.len();
        new_blocks.push(block);
        new_literals.push(literals[i + 1].clone());

        if let Some(post_content) = post {
            new_blocks.push(ExecutableBlock {
                index: new_blocks.len(),
                extension_name,
                properties: PropertyBag::new(),
                content: post_content,
                produces_output: false,
            });
            new_literals.push(String::new());
        }
    }

    (new_literals, new_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_literal_only() {
        let p = parse("select 1", TagStyle::Brace, &PropertyBag::new()).unwrap();
        assert_eq!(p.literals, vec!["select 1".to_string()]);
        assert!(p.blocks.is_empty());
    }

    #[test]
    fn round_trip_with_empty_block_output() {
        let p = parse(
            "select {{ script: [1,2,3] }} as a",
            TagStyle::Brace,
            &PropertyBag::new(),
        )
        .unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].extension_name, "script");
        assert_eq!(p.blocks[0].content.trim(), "[1,2,3]");
        let rendered = p.render_with(|_| String::new());
        assert_eq!(rendered, "select  as a");
    }

    #[test]
    fn silent_block_does_not_produce_output() {
        let p = parse("{% var: x=42 %}select ${x}", TagStyle::Brace, &PropertyBag::new()).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert!(!p.blocks[0].produces_output);
        assert_eq!(p.blocks[0].content.trim(), "x=42");
    }

    #[test]
    fn dot_identifier_sets_id_property() {
        let p = parse("{{ sql.main: select 1 }}", TagStyle::Brace, &PropertyBag::new()).unwrap();
        assert_eq!(p.blocks[0].properties.get("id"), Some(&"main".to_string()));
    }

    #[test]
    fn properties_parse_quoted_and_bare() {
        let p = parse(
            "{{ web(url='http://h', method=GET): }}",
            TagStyle::Brace,
            &PropertyBag::new(),
        )
        .unwrap();
        assert_eq!(p.blocks[0].properties.get("url"), Some(&"http://h".to_string()));
        assert_eq!(p.blocks[0].properties.get("method"), Some(&"GET".to_string()));
    }

    #[test]
    fn property_value_substitutes_from_bag() {
        let mut bag = PropertyBag::new();
        bag.insert("host".to_string(), "db1".to_string());
        let p = parse("{{ sql(url='${host}'): select 1 }}", TagStyle::Brace, &bag).unwrap();
        assert_eq!(p.blocks[0].properties.get("url"), Some(&"db1".to_string()));
    }

    #[test]
    fn angle_style_uses_angle_delimiters() {
        let p = parse("<< script: 1 >>", TagStyle::Angle, &PropertyBag::new()).unwrap();
        assert_eq!(p.blocks[0].extension_name, "script");
    }

    #[test]
    fn unterminated_block_is_a_parse_error() {
        let err = parse("{{ sql: select 1", TagStyle::Brace, &PropertyBag::new()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn is_direct_query_requires_whitespace_only_literals_and_no_output_blocks() {
        let p = parse("  {% var: x=1 %}  ", TagStyle::Brace, &PropertyBag::new()).unwrap();
        assert!(p.is_direct_query());
    }

    #[test]
    fn is_static_query_true_when_no_blocks() {
        let p = parse("select 1", TagStyle::Brace, &PropertyBag::new()).unwrap();
        assert!(p.is_static_query());
    }

    #[test]
    fn pre_and_post_query_expand_to_virtual_blocks() {
        let p = parse(
            "{{ sql(pre.query='set a', post.query='set b'): select 1 }}",
            TagStyle::Brace,
            &PropertyBag::new(),
        )
        .unwrap();
        assert_eq!(p.blocks.len(), 3);
        assert_eq!(p.blocks[0].content, "set a");
        assert_eq!(p.blocks[1].content.trim(), "select 1");
        assert_eq!(p.blocks[2].content, "set b");
    }
}
