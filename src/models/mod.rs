//! Data models for Mull idea documents.
//!
//! This module defines the core data structures:
//! - `Document` - An idea document with scalar fields and an ordered block list
//! - `Block` - One typed content unit inside a document (checklist, tags,
//!   progress, link, or node graph)
//! - `GraphNode` / `GraphEdge` - The node-graph block payload
//! - `ChatMessage` - One stored turn of an advisor conversation
//!
//! Blocks are stored as JSON. Rather than trusting stored shapes, every block
//! is validated on read: deserialization goes through a raw `{type, name,
//! value}` record and converts into the typed union, rejecting records whose
//! `type` or `value` do not line up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of colors in the tag palette. Tag color indices cycle through it.
pub const TAG_PALETTE_SIZE: usize = 7;

/// An idea document under development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (e.g., "ml-a1b2")
    pub id: String,

    /// Document title
    pub title: String,

    /// Long-form description of the idea
    #[serde(default)]
    pub description: String,

    /// Approximate budget, free text (e.g., "80-120k USD")
    #[serde(default)]
    pub budget: String,

    /// Planned execution steps, free text
    #[serde(default)]
    pub execution_steps: String,

    /// Skills needed to execute, free text
    #[serde(default)]
    pub required_skills: String,

    /// Ordered content blocks. Order is display order and is preserved
    /// across mutations unless an edit explicitly reorders.
    #[serde(default)]
    pub blocks: Vec<Block>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document with the given ID and title.
    pub fn new(id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            description: String::new(),
            budget: String::new(),
            execution_steps: String::new(),
            required_skills: String::new(),
            blocks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set a scalar field by its wire name. Returns `false` for names that
    /// are not scalar document fields (including `tags`, which is backed by
    /// a block, not a field).
    pub fn set_scalar_field(&mut self, field: &str, value: &str) -> bool {
        match field {
            "title" => self.title = value.to_string(),
            "description" => self.description = value.to_string(),
            "budget" => self.budget = value.to_string(),
            "execution_steps" => self.execution_steps = value.to_string(),
            "required_skills" => self.required_skills = value.to_string(),
            _ => return false,
        }
        true
    }
}

/// Discriminator for the five block variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Checklist,
    Tags,
    Progress,
    Link,
    NodeGraph,
}

impl BlockKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Checklist => "checklist",
            BlockKind::Tags => "tags",
            BlockKind::Progress => "progress",
            BlockKind::Link => "link",
            BlockKind::NodeGraph => "node_graph",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One typed content unit inside a document.
///
/// Wire shape: `{"type": "...", "name": "...", "value": ...}` where the
/// value shape depends on the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    /// Display name of the block
    pub name: String,

    /// Typed payload
    pub value: BlockValue,
}

impl Block {
    /// Create a block with the given name and payload.
    pub fn new(name: impl Into<String>, value: BlockValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The discriminator of this block's payload.
    pub fn kind(&self) -> BlockKind {
        self.value.kind()
    }
}

/// The payload union across block kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockValue {
    /// Ordered to-do items
    Checklist(Vec<ChecklistItem>),
    /// Ordered labels with palette color indices
    Tags(Vec<TagEntry>),
    /// A single completion percentage, expected in [0, 100]
    Progress(f64),
    /// Ordered external links
    Link(Vec<LinkEntry>),
    /// A node/edge graph. `None` until the first node or edge is added.
    NodeGraph(Option<GraphValue>),
}

impl BlockValue {
    /// The discriminator of this payload.
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockValue::Checklist(_) => BlockKind::Checklist,
            BlockValue::Tags(_) => BlockKind::Tags,
            BlockValue::Progress(_) => BlockKind::Progress,
            BlockValue::Link(_) => BlockKind::Link,
            BlockValue::NodeGraph(_) => BlockKind::NodeGraph,
        }
    }

    /// Empty payload for the given kind.
    pub fn empty(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Checklist => BlockValue::Checklist(Vec::new()),
            BlockKind::Tags => BlockValue::Tags(Vec::new()),
            BlockKind::Progress => BlockValue::Progress(0.0),
            BlockKind::Link => BlockValue::Link(Vec::new()),
            BlockKind::NodeGraph => BlockValue::NodeGraph(None),
        }
    }
}

/// Raw wire form of a block, used as the serde boundary.
#[derive(Serialize, Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    kind: BlockKind,
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

impl TryFrom<RawBlock> for Block {
    type Error = String;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let value = match raw.kind {
            BlockKind::Checklist => BlockValue::Checklist(
                serde_json::from_value(raw.value)
                    .map_err(|e| format!("invalid checklist value: {e}"))?,
            ),
            BlockKind::Tags => BlockValue::Tags(
                serde_json::from_value(raw.value)
                    .map_err(|e| format!("invalid tags value: {e}"))?,
            ),
            BlockKind::Progress => BlockValue::Progress(
                serde_json::from_value(raw.value)
                    .map_err(|e| format!("invalid progress value: {e}"))?,
            ),
            BlockKind::Link => BlockValue::Link(
                serde_json::from_value(raw.value)
                    .map_err(|e| format!("invalid link value: {e}"))?,
            ),
            BlockKind::NodeGraph => BlockValue::NodeGraph(
                serde_json::from_value(raw.value)
                    .map_err(|e| format!("invalid node_graph value: {e}"))?,
            ),
        };
        Ok(Block {
            name: raw.name,
            value,
        })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        let kind = block.kind();
        let value = match block.value {
            BlockValue::Checklist(items) => serde_json::to_value(items),
            BlockValue::Tags(tags) => serde_json::to_value(tags),
            BlockValue::Progress(p) => serde_json::to_value(p),
            BlockValue::Link(links) => serde_json::to_value(links),
            BlockValue::NodeGraph(graph) => serde_json::to_value(graph),
        }
        // Serializing out of the typed union cannot fail.
        .expect("block payload serializes");
        RawBlock {
            kind,
            name: block.name,
            value,
        }
    }
}

/// One item in a checklist block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Item text
    #[serde(default)]
    pub text: String,

    /// Whether the item is completed
    #[serde(default)]
    pub done: bool,
}

/// One label in a tags block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Tag text
    #[serde(default)]
    pub text: String,

    /// Index into the tag palette
    #[serde(rename = "colorIndex", default)]
    pub color_index: usize,
}

/// One entry in a link block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Target URL
    #[serde(default)]
    pub url: String,

    /// Display title
    #[serde(default)]
    pub title: String,
}

/// Payload of a node-graph block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphValue {
    /// Graph nodes. IDs are expected to be unique within the graph, but
    /// uniqueness is the writer's responsibility; `mull doctor` reports
    /// violations.
    #[serde(default)]
    pub nodes: Vec<GraphNode>,

    /// Directed edges between node IDs. Endpoints may reference nodes that
    /// do not exist yet; `mull doctor` reports dangling references.
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// Semantic kind of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Idea,
    Problem,
    Solution,
    Team,
    User,
    Market,
    Competitor,
    Tech,
    Feature,
    Money,
    Risk,
    Goal,
    Milestone,
    Resource,
    Note,
}

impl NodeKind {
    /// Default display color for this kind.
    pub fn default_color(&self) -> &'static str {
        match self {
            NodeKind::Idea => "#6366f1",
            NodeKind::Problem => "#ef4444",
            NodeKind::Solution => "#10b981",
            NodeKind::Team => "#06b6d4",
            NodeKind::User => "#8b5cf6",
            NodeKind::Market => "#f59e0b",
            NodeKind::Competitor => "#ec4899",
            NodeKind::Tech => "#3b82f6",
            NodeKind::Feature => "#eab308",
            NodeKind::Money => "#22c55e",
            NodeKind::Risk => "#f97316",
            NodeKind::Goal => "#a855f7",
            NodeKind::Milestone => "#14b8a6",
            NodeKind::Resource => "#64748b",
            NodeKind::Note => "#94a3b8",
        }
    }

    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Idea => "idea",
            NodeKind::Problem => "problem",
            NodeKind::Solution => "solution",
            NodeKind::Team => "team",
            NodeKind::User => "user",
            NodeKind::Market => "market",
            NodeKind::Competitor => "competitor",
            NodeKind::Tech => "tech",
            NodeKind::Feature => "feature",
            NodeKind::Money => "money",
            NodeKind::Risk => "risk",
            NodeKind::Goal => "goal",
            NodeKind::Milestone => "milestone",
            NodeKind::Resource => "resource",
            NodeKind::Note => "note",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One node in a node-graph block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Numeric ID, unique within the graph
    pub id: i64,

    /// Semantic kind
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Display label
    #[serde(default)]
    pub label: String,

    /// Canvas X coordinate
    #[serde(default)]
    pub x: f64,

    /// Canvas Y coordinate
    #[serde(default)]
    pub y: f64,

    /// Display color (hex); empty means "use the kind's default"
    #[serde(default)]
    pub color: String,
}

impl GraphNode {
    /// Create a node with the kind's default color.
    pub fn new(id: i64, kind: NodeKind, label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            x,
            y,
            color: kind.default_color().to_string(),
        }
    }
}

/// One directed edge in a node-graph block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node ID
    #[serde(rename = "from")]
    pub source: i64,

    /// Target node ID
    #[serde(rename = "to")]
    pub target: i64,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an advisor-suggested action attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionDisposition {
    /// Waiting for the user to apply or discard it.
    Pending,
    /// Applied to the document.
    Applied,
    /// Rejected by the user.
    Discarded,
}

impl ActionDisposition {
    /// Wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionDisposition::Pending => "pending",
            ActionDisposition::Applied => "applied",
            ActionDisposition::Discarded => "discarded",
        }
    }
}

/// One stored turn of an advisor conversation.
///
/// Assistant turns may carry the actions extracted from the raw reply; the
/// disposition tracks whether the user has acted on them. The document
/// itself never stores actions - they live on the conversation record until
/// applied or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier (UUID)
    pub id: String,

    /// Document this conversation belongs to
    pub doc_id: String,

    /// Speaker
    pub role: Role,

    /// Sanitized message text
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// First action embedded in the reply, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<serde_json::Value>,

    /// Every action embedded in the reply, in occurrence order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_actions: Vec<serde_json::Value>,

    /// Lifecycle of the suggested actions, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_state: Option<ActionDisposition>,
}

impl ChatMessage {
    /// Create a user turn.
    pub fn user(id: String, doc_id: String, content: impl Into<String>) -> Self {
        Self {
            id,
            doc_id,
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            suggested_action: None,
            all_actions: Vec::new(),
            action_state: None,
        }
    }

    /// Create an assistant turn carrying extracted actions.
    pub fn assistant(
        id: String,
        doc_id: String,
        content: impl Into<String>,
        all_actions: Vec<serde_json::Value>,
    ) -> Self {
        let action_state = if all_actions.is_empty() {
            None
        } else {
            Some(ActionDisposition::Pending)
        };
        Self {
            id,
            doc_id,
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            suggested_action: all_actions.first().cloned(),
            all_actions,
            action_state,
        }
    }
}
