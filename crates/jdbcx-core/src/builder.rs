//! Cartesian product of concrete statements from parsed literals/blocks plus
//! each block's already-evaluated value sequence (spec §4.5). Self-contained:
//! unlike the teacher, which executes blocks top-to-bottom with no product
//! stage, this module has no teacher analogue and is grounded directly on
//! spec.md's own worked examples (§8, seed scenarios 2/3).

use crate::error::{Error, Result};
use crate::parser::ExecutableBlock;
use std::collections::HashMap;

/// One block's evaluated output: a non-empty sequence of substitution
/// values. A scalar result is represented as a one-element sequence.
pub type BlockValues = Vec<String>;

/// Builds the list of concrete statement strings. `values[i]` is the
/// evaluated sequence for `blocks[i]`; `literals.len()` must be
/// `blocks.len() + 1` (or both empty).
pub fn build_statements(
    literals: &[String],
    blocks: &[ExecutableBlock],
    values: &[BlockValues],
) -> Result<Vec<String>> {
    debug_assert_eq!(blocks.len(), values.len());

    let mut id_lengths: HashMap<String, usize> = HashMap::new();
    for (block, vals) in blocks.iter().zip(values.iter()) {
        if let Some(id) = block.properties.get("id") {
            let len = vals.len();
            match id_lengths.get(id) {
                Some(&existing) if existing != len => {
                    return Err(Error::ShapeMismatch {
                        id: id.clone(),
                        a: existing,
                        b: len,
                    });
                }
                _ => {
                    id_lengths.insert(id.clone(), len);
                }
            }
        }
    }

    // Empty cartesian product: any block producing zero values collapses
    // the whole statement to zero rows rather than failing.
    if values.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }

    // One "loop variable" per distinct `id` group, plus one per id-less
    // block, in block order — block 0 is the innermost (fastest-varying)
    // loop.
    let mut loop_order: Vec<String> = Vec::new();
    let mut loop_len: HashMap<String, usize> = HashMap::new();
    let mut block_loop_key: Vec<String> = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        let key = match block.properties.get("id") {
            Some(id) => id.clone(),
            None => format!("__block_{i}"),
        };
        loop_len.entry(key.clone()).or_insert(values[i].len());
        if !loop_order.contains(&key) {
            loop_order.push(key.clone());
        }
        block_loop_key.push(key);
    }

    let total: usize = loop_order.iter().map(|k| loop_len[k]).product();
    let mut statements = Vec::with_capacity(total);

    for combo in 0..total {
        let mut indices: HashMap<&str, usize> = HashMap::new();
        let mut remaining = combo;
        for key in &loop_order {
            let len = loop_len[key];
            indices.insert(key.as_str(), remaining % len);
            remaining /= len;
        }

        let mut out = String::new();
        if !literals.is_empty() {
            out.push_str(&literals[0]);
        }
        for (i, _) in blocks.iter().enumerate() {
            let idx = indices[block_loop_key[i].as_str()];
            out.push_str(&values[i][idx]);
            if let Some(lit) = literals.get(i + 1) {
                out.push_str(lit);
            }
        }
        statements.push(out);
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jdbcx_templates::PropertyBag;

    fn block(index: usize, id: Option<&str>) -> ExecutableBlock {
        let mut properties = PropertyBag::new();
        if let Some(id) = id {
            properties.insert("id".to_string(), id.to_string());
        }
        ExecutableBlock {
            index,
            extension_name: "script".to_string(),
            properties,
            content: String::new(),
            produces_output: true,
        }
    }

    #[test]
    fn two_independent_blocks_emit_in_spec_order() {
        let literals = vec!["".to_string(), " + ".to_string(), "".to_string()];
        let blocks = vec![block(0, None), block(1, None)];
        let values = vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec!["d".into(), "e".into()],
        ];
        let out = build_statements(&literals, &blocks, &values).unwrap();
        assert_eq!(
            out,
            vec!["a + d", "b + d", "c + d", "a + e", "b + e", "c + e"]
        );
    }

    #[test]
    fn scenario_three_from_spec() {
        let literals = vec!["".to_string(), " + ".to_string(), "".to_string()];
        let blocks = vec![block(0, None), block(1, None)];
        let values = vec![
            vec!["1".into(), "2".into()],
            vec!["3".into(), "4".into(), "5".into()],
        ];
        let out = build_statements(&literals, &blocks, &values).unwrap();
        assert_eq!(
            out,
            vec!["1 + 3", "2 + 3", "1 + 4", "2 + 4", "1 + 5", "2 + 5"]
        );
    }

    #[test]
    fn shared_id_broadcasts_same_index() {
        let literals = vec!["".to_string(), "-".to_string(), "".to_string()];
        let blocks = vec![block(0, Some("x")), block(1, Some("x"))];
        let values = vec![vec!["1".into(), "2".into()], vec!["a".into(), "b".into()]];
        let out = build_statements(&literals, &blocks, &values).unwrap();
        assert_eq!(out, vec!["1-a", "2-b"]);
    }

    #[test]
    fn shared_id_with_mismatched_lengths_is_shape_mismatch() {
        let literals = vec!["".to_string(), "-".to_string(), "".to_string()];
        let blocks = vec![block(0, Some("x")), block(1, Some("x"))];
        let values = vec![vec!["1".into(), "2".into()], vec!["a".into()]];
        let err = build_statements(&literals, &blocks, &values).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ShapeMismatch);
    }

    #[test]
    fn empty_sequence_collapses_to_zero_statements() {
        let literals = vec!["".to_string(), "".to_string()];
        let blocks = vec![block(0, None)];
        let values = vec![Vec::new()];
        let out = build_statements(&literals, &blocks, &values).unwrap();
        assert!(out.is_empty());
    }
}
