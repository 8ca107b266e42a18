//! Embedded actions: the commands an advisor reply may carry.
//!
//! An action travels as a JSON object with an `"action"` discriminator,
//! embedded in the advisor's free-form reply (see [`extract`]). Actions are
//! ephemeral: parsed from text, applied at most once, then discarded.
//!
//! Decoding is deliberately split in two stages. [`extract`] only checks for
//! the discriminator key and hands back raw JSON objects; [`Action::from_value`]
//! does the shape validation and is a total function - a malformed payload
//! becomes a typed [`ApplyError`], never a panic. The upstream text generator
//! is not trusted to produce well-formed commands.

pub mod apply;
pub mod extract;

pub use apply::{ApplyOutcome, apply};
pub use extract::{Extraction, extract};

use crate::models::{Block, BlockKind, ChecklistItem, GraphEdge, GraphNode};
use serde_json::Value;

/// JSON key that marks a record as an action and selects its kind.
pub const ACTION_KEY: &str = "action";

/// Why an action could not be decoded or applied. The document is left
/// untouched in every case.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApplyError {
    /// Discriminator missing or not in the recognized set.
    #[error("invalid action")]
    UnknownAction,

    /// A required field of the action is absent.
    #[error("invalid action: missing '{0}'")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("invalid action: malformed '{0}'")]
    MalformedField(&'static str),

    /// `block_index` does not address an existing block.
    #[error("block index {index} is out of range (document has {len} blocks)")]
    OutOfRange { index: i64, len: usize },

    /// The addressed block is not of the kind the action requires.
    #[error("block {index} is a {found} block, expected {expected}")]
    KindMismatch {
        index: usize,
        expected: BlockKind,
        found: BlockKind,
    },

    /// `update_field` named something that is not a document field.
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

/// One `{field, value}` pair of a `batch_update`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub value: Value,
}

/// A decoded action, ready for the applier.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace a scalar document field (or the tags pseudo-field).
    UpdateField { field: String, value: Value },
    /// Append a new block to the document.
    AddBlock { block: Block },
    /// Replace the payload of an existing block.
    UpdateBlock { block_index: i64, value: Value },
    /// Append an item to a checklist block.
    AddChecklistItem {
        block_index: i64,
        item: ChecklistItem,
    },
    /// Append a node to a node-graph block.
    AddGraphNode { block_index: i64, node: GraphNode },
    /// Append an edge to a node-graph block.
    AddGraphEdge { block_index: i64, edge: GraphEdge },
    /// Apply several field updates with a single save.
    BatchUpdate { updates: Vec<FieldUpdate> },
}

impl Action {
    /// Decode an action from a raw JSON value.
    ///
    /// Total: every malformed shape maps to an [`ApplyError`]. Bounds and
    /// block-kind checks are left to [`apply`], which owns the document.
    pub fn from_value(value: &Value) -> Result<Self, ApplyError> {
        let obj = value.as_object().ok_or(ApplyError::UnknownAction)?;
        let kind = obj
            .get(ACTION_KEY)
            .and_then(Value::as_str)
            .ok_or(ApplyError::UnknownAction)?;

        match kind {
            "update_field" => Ok(Action::UpdateField {
                field: str_field(obj, "field")?,
                value: obj
                    .get("value")
                    .cloned()
                    .ok_or(ApplyError::MissingField("value"))?,
            }),
            "add_block" => {
                let raw = obj.get("block").ok_or(ApplyError::MissingField("block"))?;
                let block: Block = serde_json::from_value(raw.clone())
                    .map_err(|_| ApplyError::MalformedField("block"))?;
                Ok(Action::AddBlock { block })
            }
            "update_block" => Ok(Action::UpdateBlock {
                block_index: index_field(obj)?,
                value: obj
                    .get("value")
                    .cloned()
                    .ok_or(ApplyError::MissingField("value"))?,
            }),
            "add_checklist_item" => {
                let raw = obj.get("item").ok_or(ApplyError::MissingField("item"))?;
                let item: ChecklistItem = serde_json::from_value(raw.clone())
                    .map_err(|_| ApplyError::MalformedField("item"))?;
                Ok(Action::AddChecklistItem {
                    block_index: index_field(obj)?,
                    item,
                })
            }
            "add_graph_node" => {
                let raw = obj.get("node").ok_or(ApplyError::MissingField("node"))?;
                let node: GraphNode = serde_json::from_value(raw.clone())
                    .map_err(|_| ApplyError::MalformedField("node"))?;
                Ok(Action::AddGraphNode {
                    block_index: index_field(obj)?,
                    node,
                })
            }
            "add_graph_edge" => {
                let raw = obj.get("edge").ok_or(ApplyError::MissingField("edge"))?;
                let edge: GraphEdge = serde_json::from_value(raw.clone())
                    .map_err(|_| ApplyError::MalformedField("edge"))?;
                Ok(Action::AddGraphEdge {
                    block_index: index_field(obj)?,
                    edge,
                })
            }
            "batch_update" => {
                let raw = obj
                    .get("updates")
                    .and_then(Value::as_array)
                    .ok_or(ApplyError::MissingField("updates"))?;
                // Best-effort: entries without a string field and a value are
                // skipped, not fatal to the batch.
                let updates = raw
                    .iter()
                    .filter_map(|entry| {
                        let entry = entry.as_object()?;
                        Some(FieldUpdate {
                            field: entry.get("field")?.as_str()?.to_string(),
                            value: entry.get("value")?.clone(),
                        })
                    })
                    .collect();
                Ok(Action::BatchUpdate { updates })
            }
            _ => Err(ApplyError::UnknownAction),
        }
    }

    /// Wire name of this action's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::UpdateField { .. } => "update_field",
            Action::AddBlock { .. } => "add_block",
            Action::UpdateBlock { .. } => "update_block",
            Action::AddChecklistItem { .. } => "add_checklist_item",
            Action::AddGraphNode { .. } => "add_graph_node",
            Action::AddGraphEdge { .. } => "add_graph_edge",
            Action::BatchUpdate { .. } => "batch_update",
        }
    }
}

fn str_field(
    obj: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<String, ApplyError> {
    match obj.get(key) {
        None => Err(ApplyError::MissingField(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ApplyError::MalformedField(key)),
    }
}

fn index_field(obj: &serde_json::Map<String, Value>) -> Result<i64, ApplyError> {
    match obj.get("block_index") {
        None => Err(ApplyError::MissingField("block_index")),
        Some(v) => v
            .as_i64()
            .ok_or(ApplyError::MalformedField("block_index")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;
    use serde_json::json;

    #[test]
    fn test_decode_update_field() {
        let action = Action::from_value(&json!({
            "action": "update_field", "field": "budget", "value": "10M"
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::UpdateField {
                field: "budget".into(),
                value: json!("10M"),
            }
        );
    }

    #[test]
    fn test_decode_add_block() {
        let action = Action::from_value(&json!({
            "action": "add_block",
            "block": {"type": "checklist", "name": "Tasks", "value": []}
        }))
        .unwrap();
        match action {
            Action::AddBlock { block } => assert_eq!(block.name, "Tasks"),
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decode_add_graph_node() {
        let action = Action::from_value(&json!({
            "action": "add_graph_node",
            "block_index": 2,
            "node": {"id": 4, "type": "team", "label": "Core team", "x": 400.0, "y": 150.0, "color": "#06b6d4"}
        }))
        .unwrap();
        match action {
            Action::AddGraphNode { block_index, node } => {
                assert_eq!(block_index, 2);
                assert_eq!(node.kind, NodeKind::Team);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_kind() {
        let err = Action::from_value(&json!({"action": "drop_table"})).unwrap_err();
        assert_eq!(err, ApplyError::UnknownAction);
    }

    #[test]
    fn test_decode_missing_discriminator() {
        let err = Action::from_value(&json!({"field": "budget"})).unwrap_err();
        assert_eq!(err, ApplyError::UnknownAction);
        let err = Action::from_value(&json!("update_field")).unwrap_err();
        assert_eq!(err, ApplyError::UnknownAction);
    }

    #[test]
    fn test_decode_missing_required_field() {
        let err = Action::from_value(&json!({"action": "update_field", "field": "budget"}))
            .unwrap_err();
        assert_eq!(err, ApplyError::MissingField("value"));
        let err =
            Action::from_value(&json!({"action": "add_checklist_item", "item": {"text": "x"}}))
                .unwrap_err();
        assert_eq!(err, ApplyError::MissingField("block_index"));
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = Action::from_value(&json!({
            "action": "add_block",
            "block": {"type": "hologram", "name": "?", "value": []}
        }))
        .unwrap_err();
        assert_eq!(err, ApplyError::MalformedField("block"));
    }

    #[test]
    fn test_decode_negative_index_deferred_to_apply() {
        // Negative indices decode fine; the bounds check happens at apply
        // time, where the document length is known.
        let action = Action::from_value(&json!({
            "action": "update_block", "block_index": -1, "value": 10
        }))
        .unwrap();
        assert_eq!(
            action,
            Action::UpdateBlock {
                block_index: -1,
                value: json!(10),
            }
        );
    }

    #[test]
    fn test_decode_batch_skips_malformed_entries() {
        let action = Action::from_value(&json!({
            "action": "batch_update",
            "updates": [
                {"field": "budget", "value": "10M"},
                {"value": "no field"},
                "not an object",
                {"field": "required_skills", "value": "Rust"}
            ]
        }))
        .unwrap();
        match action {
            Action::BatchUpdate { updates } => {
                assert_eq!(updates.len(), 2);
                assert_eq!(updates[0].field, "budget");
                assert_eq!(updates[1].field, "required_skills");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }
}
