use crate::{PropertyBag, TagStyle, TemplateError, VariableStore};

/// The block currently being rendered, for the `_` / `_.prop` pseudo-variable.
pub struct BlockInfo<'a> {
    pub extension_name: &'a str,
    pub properties: &'a PropertyBag,
}

/// Renders `input` against `store`/`bag` using whichever tag family `style`
/// selects. Unresolved strict references (`${name}` with no fallback) are
/// left byte-for-byte unchanged in the output, per spec.
pub fn render(
    input: &str,
    store: &VariableStore,
    bag: &PropertyBag,
    style: TagStyle,
    block: Option<&BlockInfo>,
) -> Result<String, TemplateError> {
    let (open, close) = style.delimiters();
    let sigil = style.requires_sigil();
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let is_open = if sigil {
            c == '$' && chars.get(i + 1) == Some(&open)
        } else {
            c == open
        };

        if !is_open {
            out.push(c);
            i += 1;
            continue;
        }

        let start = i;
        let body_start = if sigil { i + 2 } else { i + 1 };
        let mut depth = 1i32;
        let mut j = body_start;
        let mut close_idx = None;
        while j < chars.len() {
            if chars[j] == open {
                depth += 1;
            } else if chars[j] == close {
                depth -= 1;
                if depth == 0 {
                    close_idx = Some(j);
                    break;
                }
            }
            j += 1;
        }

        let Some(close_idx) = close_idx else {
            return Err(TemplateError::Unterminated(start));
        };

        let body: String = chars[body_start..close_idx].iter().collect();
        match resolve_reference(&body, store, bag, block) {
            Some(value) => out.push_str(&value),
            None => {
                tracing::warn!(reference = %body, "failed to resolve template variable");
                let literal: String = chars[start..=close_idx].iter().collect();
                out.push_str(&literal);
            }
        }
        i = close_idx + 1;
    }

    Ok(out)
}

fn resolve_reference(
    body: &str,
    store: &VariableStore,
    bag: &PropertyBag,
    block: Option<&BlockInfo>,
) -> Option<String> {
    let (name, fallback) = match body.split_once(':') {
        Some((n, f)) => (n, Some(f)),
        None => (body, None),
    };

    let resolved = if name == "_" {
        block.map(|b| b.extension_name.to_string())
    } else if let Some(prop) = name.strip_prefix("_.") {
        block.and_then(|b| b.properties.get(prop).cloned())
    } else {
        store.get(name, bag)
    };

    resolved.or_else(|| fallback.map(|f| f.to_string()))
}
