//! The validator/applier: executes one action against a document.
//!
//! Every action kind checks applicability before touching the document:
//! index bounds first, then block-kind guards. A failed check returns a typed
//! [`ApplyError`] with the document bit-for-bit unchanged. The applier holds
//! no state between calls and performs no I/O; persisting the updated
//! document (exactly one write per successful apply) is the caller's job.
//!
//! Actions are not retry-safe in general: `update_field` is naturally
//! idempotent, `add_checklist_item` appends on every call.

use super::{Action, ApplyError, FieldUpdate};
use crate::models::{
    Block, BlockKind, BlockValue, Document, GraphValue, TAG_PALETTE_SIZE, TagEntry,
};
use serde_json::Value;

/// Confirmation for a successfully applied action.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Short human-readable description of what changed.
    pub message: String,
}

impl ApplyOutcome {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Apply one action to the document.
///
/// On `Ok` the document has been mutated and should be saved once; on `Err`
/// it is untouched.
pub fn apply(doc: &mut Document, action: &Action) -> Result<ApplyOutcome, ApplyError> {
    match action {
        Action::UpdateField { field, value } => {
            apply_field(doc, field, value)?;
            Ok(ApplyOutcome::new(format!("field '{field}' updated")))
        }

        Action::AddBlock { block } => {
            let mut block = block.clone();
            normalize_block(&mut block);
            let name = block.name.clone();
            doc.blocks.push(block);
            Ok(ApplyOutcome::new(format!("block '{name}' added")))
        }

        Action::UpdateBlock { block_index, value } => {
            let idx = resolve_index(doc, *block_index)?;
            let parsed = decode_block_value(doc.blocks[idx].kind(), value)?;
            doc.blocks[idx].value = parsed;
            let name = doc.blocks[idx].name.clone();
            Ok(ApplyOutcome::new(format!("block '{name}' updated")))
        }

        Action::AddChecklistItem { block_index, item } => {
            let idx = resolve_index(doc, *block_index)?;
            let block = &mut doc.blocks[idx];
            match &mut block.value {
                BlockValue::Checklist(items) => {
                    items.push(item.clone());
                    Ok(ApplyOutcome::new(format!("item '{}' added", item.text)))
                }
                other => Err(ApplyError::KindMismatch {
                    index: idx,
                    expected: BlockKind::Checklist,
                    found: other.kind(),
                }),
            }
        }

        Action::AddGraphNode { block_index, node } => {
            let idx = resolve_index(doc, *block_index)?;
            let graph = graph_value_mut(&mut doc.blocks[idx], idx)?;
            graph.nodes.push(node.clone());
            Ok(ApplyOutcome::new(format!("node '{}' added", node.label)))
        }

        Action::AddGraphEdge { block_index, edge } => {
            let idx = resolve_index(doc, *block_index)?;
            let graph = graph_value_mut(&mut doc.blocks[idx], idx)?;
            graph.edges.push(*edge);
            Ok(ApplyOutcome::new(format!(
                "edge {} -> {} added",
                edge.source, edge.target
            )))
        }

        Action::BatchUpdate { updates } => {
            // Best-effort: a misnamed or malformed field is skipped, not
            // fatal to the batch. The caller still saves exactly once.
            let mut count = 0usize;
            for FieldUpdate { field, value } in updates {
                if apply_field(doc, field, value).is_ok() {
                    count += 1;
                }
            }
            Ok(ApplyOutcome::new(format!("{count} update(s) applied")))
        }
    }
}

/// Bounds-check a block index against the document.
fn resolve_index(doc: &Document, index: i64) -> Result<usize, ApplyError> {
    let len = doc.blocks.len();
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or(ApplyError::OutOfRange { index, len })
}

/// Borrow the graph payload of a node-graph block, initializing an empty
/// graph if the stored value is still null.
fn graph_value_mut<'a>(block: &'a mut Block, idx: usize) -> Result<&'a mut GraphValue, ApplyError> {
    match &mut block.value {
        BlockValue::NodeGraph(graph) => Ok(graph.get_or_insert_with(GraphValue::default)),
        other => Err(ApplyError::KindMismatch {
            index: idx,
            expected: BlockKind::NodeGraph,
            found: other.kind(),
        }),
    }
}

/// Apply a single `{field, value}` update. Shared by `update_field` and
/// `batch_update`.
fn apply_field(doc: &mut Document, field: &str, value: &Value) -> Result<(), ApplyError> {
    // "tags" is not a scalar field: it is backed by the first tags block,
    // created on demand.
    if field == "tags" {
        let tags = build_tag_list(value)?;
        set_tags_block(doc, tags);
        return Ok(());
    }

    let text = scalar_string(value)?;
    if doc.set_scalar_field(field, &text) {
        Ok(())
    } else {
        Err(ApplyError::UnknownField(field.to_string()))
    }
}

/// Render a JSON scalar as field text. Structured values are rejected.
fn scalar_string(value: &Value) -> Result<String, ApplyError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ApplyError::MalformedField("value")),
    }
}

/// Build a tag list from either an array of values or a comma-separated
/// string, cycling color indices through the palette by position.
fn build_tag_list(value: &Value) -> Result<Vec<TagEntry>, ApplyError> {
    let texts: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return Err(ApplyError::MalformedField("value")),
    };

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| TagEntry {
            text,
            color_index: i % TAG_PALETTE_SIZE,
        })
        .collect())
}

/// Replace the first tags block's payload, or append a new tags block if the
/// document has none.
fn set_tags_block(doc: &mut Document, tags: Vec<TagEntry>) {
    for block in &mut doc.blocks {
        if let BlockValue::Tags(existing) = &mut block.value {
            *existing = tags;
            return;
        }
    }
    doc.blocks.push(Block::new("Tags", BlockValue::Tags(tags)));
}

/// Decode a raw JSON value into the payload of the given block kind.
fn decode_block_value(kind: BlockKind, value: &Value) -> Result<BlockValue, ApplyError> {
    let malformed = |_| ApplyError::MalformedField("value");
    let mut decoded = match kind {
        BlockKind::Checklist => {
            BlockValue::Checklist(serde_json::from_value(value.clone()).map_err(malformed)?)
        }
        BlockKind::Tags => {
            BlockValue::Tags(serde_json::from_value(value.clone()).map_err(malformed)?)
        }
        BlockKind::Progress => {
            BlockValue::Progress(serde_json::from_value(value.clone()).map_err(malformed)?)
        }
        BlockKind::Link => {
            BlockValue::Link(serde_json::from_value(value.clone()).map_err(malformed)?)
        }
        BlockKind::NodeGraph => {
            BlockValue::NodeGraph(serde_json::from_value(value.clone()).map_err(malformed)?)
        }
    };
    clamp_progress(&mut decoded);
    Ok(decoded)
}

fn normalize_block(block: &mut Block) {
    clamp_progress(&mut block.value);
}

// Progress is documented as a percentage; out-of-range values from the
// generator are clamped rather than rejected.
fn clamp_progress(value: &mut BlockValue) {
    if let BlockValue::Progress(p) = value {
        *p = p.clamp(0.0, 100.0);
    }
}
