//! Command implementations for the Mull CLI.
//!
//! Each command returns a result struct implementing [`Output`], which the
//! binary serializes as JSON (default) or human-readable text (`-H`).
//!
//! Commands that mutate a document go through the same validator/applier the
//! advisor actions use, so CLI edits and advisor edits obey identical rules.
//! A *rejected* action is a well-formed `{success: false, message}` outcome,
//! not a process error: the conversation can simply continue.

use crate::actions::{self, Action};
use crate::advisor::{AdvisorError, ChatAdvisor, ChatClient, ChatTurn, GroqClient};
use crate::config::{self, MullConfig};
use crate::models::{
    ActionDisposition, Block, BlockKind, BlockValue, ChatMessage, Document, Role,
};
use crate::storage::{DOC_ID_PREFIX, Storage, generate_id, validate_id};
use crate::{Error, Result, action_log};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output: Serialize {
    /// Format for human-readable output.
    fn to_human(&self) -> String;

    /// Serialize to JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn open(workspace: &Path) -> Result<Storage> {
    Storage::open(workspace)
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Touch the document's update timestamp and save it. The single write per
/// successful mutation.
fn save(storage: &mut Storage, doc: &mut Document) -> Result<()> {
    doc.updated_at = Utc::now();
    storage.update_document(doc)
}

// === init ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub root: String,
}

impl Output for InitResult {
    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized mull storage at {}", self.root)
        } else {
            format!("Already initialized at {}", self.root)
        }
    }
}

/// Initialize storage for a workspace.
pub fn init(workspace: &Path) -> Result<InitResult> {
    if Storage::exists(workspace)? {
        let storage = Storage::open(workspace)?;
        return Ok(InitResult {
            initialized: false,
            root: storage.root.display().to_string(),
        });
    }
    let storage = Storage::init(workspace)?;
    Ok(InitResult {
        initialized: true,
        root: storage.root.display().to_string(),
    })
}

// === idea ===

#[derive(Debug, Serialize)]
pub struct DocResult {
    pub document: Document,
}

impl Output for DocResult {
    fn to_human(&self) -> String {
        render_document(&self.document)
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub block_count: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub documents: Vec<DocumentSummary>,
}

impl Output for ListResult {
    fn to_human(&self) -> String {
        if self.documents.is_empty() {
            return "No documents found.".to_string();
        }
        let mut out = String::new();
        for doc in &self.documents {
            out.push_str(&format!(
                "{}  {} ({} blocks, updated {})\n",
                doc.id,
                doc.title,
                doc.block_count,
                doc.updated_at.format("%Y-%m-%d %H:%M")
            ));
        }
        out.trim_end().to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}

impl Output for DeleteResult {
    fn to_human(&self) -> String {
        format!("Deleted {}", self.id)
    }
}

/// Create a new idea document.
pub fn idea_create(
    workspace: &Path,
    title: &str,
    description: Option<&str>,
    budget: Option<&str>,
    steps: Option<&str>,
    skills: Option<&str>,
) -> Result<DocResult> {
    let mut storage = open(workspace)?;
    idea_create_with_storage(&mut storage, title, description, budget, steps, skills)
}

pub fn idea_create_with_storage(
    storage: &mut Storage,
    title: &str,
    description: Option<&str>,
    budget: Option<&str>,
    steps: Option<&str>,
    skills: Option<&str>,
) -> Result<DocResult> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }

    let mut doc = Document::new(generate_id(DOC_ID_PREFIX, title), title.to_string());
    if let Some(d) = description {
        doc.description = d.to_string();
    }
    if let Some(b) = budget {
        doc.budget = b.to_string();
    }
    if let Some(s) = steps {
        doc.execution_steps = s.to_string();
    }
    if let Some(s) = skills {
        doc.required_skills = s.to_string();
    }

    storage.add_document(&doc)?;
    Ok(DocResult { document: doc })
}

/// List documents, optionally filtered by a title substring.
pub fn idea_list(workspace: &Path, search: Option<&str>) -> Result<ListResult> {
    let storage = open(workspace)?;
    let documents = storage
        .list_documents(search)?
        .into_iter()
        .map(|doc| DocumentSummary {
            id: doc.id,
            title: doc.title,
            block_count: doc.blocks.len(),
            updated_at: doc.updated_at,
        })
        .collect();
    Ok(ListResult { documents })
}

/// Show one document in full.
pub fn idea_show(workspace: &Path, id: &str) -> Result<DocResult> {
    let storage = open(workspace)?;
    validate_id(id, DOC_ID_PREFIX)?;
    Ok(DocResult {
        document: storage.get_document(id)?,
    })
}

/// Set a document field directly. Shares the applier's field rules, so
/// `--field tags` updates the tags block exactly as an advisor action would.
pub fn idea_set(workspace: &Path, id: &str, field: &str, value: &str) -> Result<DocResult> {
    let mut storage = open(workspace)?;
    idea_set_with_storage(&mut storage, id, field, value)
}

pub fn idea_set_with_storage(
    storage: &mut Storage,
    id: &str,
    field: &str,
    value: &str,
) -> Result<DocResult> {
    let mut doc = storage.get_document(id)?;
    let action = Action::UpdateField {
        field: field.to_string(),
        value: Value::String(value.to_string()),
    };
    actions::apply(&mut doc, &action).map_err(|e| Error::InvalidInput(e.to_string()))?;
    save(storage, &mut doc)?;
    Ok(DocResult { document: doc })
}

/// Delete a document.
pub fn idea_delete(workspace: &Path, id: &str) -> Result<DeleteResult> {
    let mut storage = open(workspace)?;
    storage.delete_document(id)?;
    Ok(DeleteResult {
        id: id.to_string(),
        deleted: true,
    })
}

// === block ===

/// Append an empty block of the given kind.
pub fn block_add(workspace: &Path, id: &str, kind: &str, name: &str) -> Result<DocResult> {
    let mut storage = open(workspace)?;
    block_add_with_storage(&mut storage, id, kind, name)
}

pub fn block_add_with_storage(
    storage: &mut Storage,
    id: &str,
    kind: &str,
    name: &str,
) -> Result<DocResult> {
    let kind = parse_block_kind(kind)?;
    let mut doc = storage.get_document(id)?;
    let action = Action::AddBlock {
        block: Block::new(name, BlockValue::empty(kind)),
    };
    actions::apply(&mut doc, &action).map_err(|e| Error::InvalidInput(e.to_string()))?;
    save(storage, &mut doc)?;
    Ok(DocResult { document: doc })
}

/// Remove a block by index.
pub fn block_remove(workspace: &Path, id: &str, index: usize) -> Result<DocResult> {
    let mut storage = open(workspace)?;
    block_remove_with_storage(&mut storage, id, index)
}

pub fn block_remove_with_storage(
    storage: &mut Storage,
    id: &str,
    index: usize,
) -> Result<DocResult> {
    let mut doc = storage.get_document(id)?;
    if index >= doc.blocks.len() {
        return Err(Error::InvalidInput(format!(
            "block index {index} is out of range (document has {} blocks)",
            doc.blocks.len()
        )));
    }
    doc.blocks.remove(index);
    save(storage, &mut doc)?;
    Ok(DocResult { document: doc })
}

fn parse_block_kind(s: &str) -> Result<BlockKind> {
    match s {
        "checklist" => Ok(BlockKind::Checklist),
        "tags" => Ok(BlockKind::Tags),
        "progress" => Ok(BlockKind::Progress),
        "link" => Ok(BlockKind::Link),
        "node_graph" => Ok(BlockKind::NodeGraph),
        other => Err(Error::InvalidInput(format!(
            "unknown block type '{other}' (expected checklist, tags, progress, link, or node_graph)"
        ))),
    }
}

// === chat ===

#[derive(Debug, Serialize)]
pub struct ChatResult {
    pub document_id: String,
    pub message_id: String,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<Value>,
}

impl Output for ChatResult {
    fn to_human(&self) -> String {
        let mut out = self.reply.clone();
        if self.suggested_action.is_some() {
            out.push_str(&format!(
                "\n\n(The advisor suggests a change. Review it with `mull action show {}`, \
                 apply with `mull action apply {}`.)",
                self.document_id, self.document_id
            ));
        }
        out
    }
}

/// Send one message to the advisor and persist both turns.
pub fn chat(workspace: &Path, id: &str, message: &str) -> Result<ChatResult> {
    let mut storage = open(workspace)?;
    let cfg = MullConfig::load(&storage.root)?;
    let api_key =
        config::resolve_api_key(&cfg).ok_or(Error::Advisor(AdvisorError::MissingApiKey))?;
    let client = GroqClient::new(
        cfg.api_url().to_string(),
        cfg.model().to_string(),
        api_key,
        cfg.timeout(),
    );
    chat_with_client(&mut storage, id, message, Box::new(client))
}

/// Chat against an injected backend client. Used directly by tests.
pub fn chat_with_client(
    storage: &mut Storage,
    id: &str,
    message: &str,
    client: Box<dyn ChatClient>,
) -> Result<ChatResult> {
    let doc = storage.get_document(id)?;

    let history: Vec<ChatTurn> = storage
        .list_chat_messages(id)?
        .into_iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| ChatTurn::new(m.role, m.content))
        .collect();

    let advisor = ChatAdvisor::new(client);
    let reply = advisor.chat(&doc, &history, message)?;

    let user_turn = ChatMessage::user(new_message_id(), id.to_string(), message);
    storage.add_chat_message(&user_turn)?;

    let assistant_turn = ChatMessage::assistant(
        new_message_id(),
        id.to_string(),
        reply.content.clone(),
        reply.all_actions.clone(),
    );
    storage.add_chat_message(&assistant_turn)?;

    Ok(ChatResult {
        document_id: id.to_string(),
        message_id: assistant_turn.id,
        reply: reply.content,
        suggested_action: reply.suggested_action,
    })
}

#[derive(Debug, Serialize)]
pub struct HistoryResult {
    pub document_id: String,
    pub messages: Vec<ChatMessage>,
}

impl Output for HistoryResult {
    fn to_human(&self) -> String {
        if self.messages.is_empty() {
            return "No conversation yet.".to_string();
        }
        let mut out = String::new();
        for msg in &self.messages {
            out.push_str(&format!("[{}] {}\n", msg.role, msg.content));
            if let Some(state) = msg.action_state {
                out.push_str(&format!("    (suggested action: {})\n", state.as_str()));
            }
        }
        out.trim_end().to_string()
    }
}

/// Show the stored conversation for a document.
pub fn history(workspace: &Path, id: &str) -> Result<HistoryResult> {
    let storage = open(workspace)?;
    storage.get_document(id)?;
    Ok(HistoryResult {
        document_id: id.to_string(),
        messages: storage.list_chat_messages(id)?,
    })
}

// === action ===

#[derive(Debug, Serialize)]
pub struct ActionShowResult {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub actions: Vec<Value>,
}

impl Output for ActionShowResult {
    fn to_human(&self) -> String {
        if self.actions.is_empty() {
            return "No pending action.".to_string();
        }
        let mut out = String::from("Pending actions:\n");
        for (i, action) in self.actions.iter().enumerate() {
            out.push_str(&format!("  [{i}] {action}\n"));
        }
        out.push_str(&format!(
            "Apply with `mull action apply {} [--index N]`.",
            self.document_id
        ));
        out
    }
}

/// Show the pending suggested actions for a document.
pub fn action_show(workspace: &Path, id: &str) -> Result<ActionShowResult> {
    let storage = open(workspace)?;
    storage.get_document(id)?;
    let pending = storage.pending_action_message(id)?;
    Ok(match pending {
        Some(msg) => ActionShowResult {
            document_id: id.to_string(),
            message_id: Some(msg.id),
            actions: msg.all_actions,
        },
        None => ActionShowResult {
            document_id: id.to_string(),
            message_id: None,
            actions: Vec::new(),
        },
    })
}

/// Result of applying or discarding an action: the wire shape shown to the
/// user, with the updated document on success.
#[derive(Debug, Serialize)]
pub struct ApplyResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

impl ApplyResult {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            document: None,
        }
    }
}

impl Output for ApplyResult {
    fn to_human(&self) -> String {
        if self.success {
            format!("Applied: {}", self.message)
        } else {
            format!("Not applied: {}", self.message)
        }
    }
}

/// Apply a suggested action (or a raw `--json` action) to the document.
///
/// Every malformed or inapplicable action yields `success: false` with the
/// document untouched; only infrastructure problems (missing document,
/// storage failures) are process errors.
pub fn action_apply(
    workspace: &Path,
    id: &str,
    index: Option<usize>,
    json: Option<&str>,
) -> Result<ApplyResult> {
    let mut storage = open(workspace)?;
    action_apply_with_storage(&mut storage, id, index, json)
}

pub fn action_apply_with_storage(
    storage: &mut Storage,
    id: &str,
    index: Option<usize>,
    json: Option<&str>,
) -> Result<ApplyResult> {
    let mut doc = storage.get_document(id)?;

    // Resolve the action value: an explicit --json payload, or the pending
    // suggestion recorded on the conversation.
    let (value, pending_message_id) = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => (value, None),
            Err(_) => return Ok(ApplyResult::rejected("invalid action")),
        },
        None => {
            let Some(msg) = storage.pending_action_message(id)? else {
                return Ok(ApplyResult::rejected("no pending action"));
            };
            let idx = index.unwrap_or(0);
            let Some(value) = msg.all_actions.get(idx).cloned() else {
                return Ok(ApplyResult::rejected(format!(
                    "no pending action at index {idx}"
                )));
            };
            (value, Some(msg.id))
        }
    };

    let action = match Action::from_value(&value) {
        Ok(action) => action,
        Err(e) => return Ok(ApplyResult::rejected(e.to_string())),
    };

    match actions::apply(&mut doc, &action) {
        Ok(outcome) => {
            save(storage, &mut doc)?;
            if let Some(message_id) = pending_message_id {
                storage.set_action_disposition(&message_id, ActionDisposition::Applied)?;
            }
            Ok(ApplyResult {
                success: true,
                message: outcome.message,
                document: Some(doc),
            })
        }
        Err(e) => Ok(ApplyResult::rejected(e.to_string())),
    }
}

/// Discard the pending suggested action.
pub fn action_discard(workspace: &Path, id: &str) -> Result<ApplyResult> {
    let mut storage = open(workspace)?;
    action_discard_with_storage(&mut storage, id)
}

pub fn action_discard_with_storage(storage: &mut Storage, id: &str) -> Result<ApplyResult> {
    storage.get_document(id)?;
    let Some(msg) = storage.pending_action_message(id)? else {
        return Ok(ApplyResult::rejected("no pending action"));
    };
    storage.set_action_disposition(&msg.id, ActionDisposition::Discarded)?;
    Ok(ApplyResult {
        success: true,
        message: "suggested action discarded".to_string(),
        document: None,
    })
}

// === doctor ===

#[derive(Debug, Serialize)]
pub struct DoctorIssue {
    pub doc_id: String,
    pub block_index: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub documents_checked: usize,
    pub issues: Vec<DoctorIssue>,
}

impl Output for DoctorResult {
    fn to_human(&self) -> String {
        if self.issues.is_empty() {
            return format!(
                "Checked {} document(s): no issues found.",
                self.documents_checked
            );
        }
        let mut out = format!(
            "Checked {} document(s), {} issue(s):\n",
            self.documents_checked,
            self.issues.len()
        );
        for issue in &self.issues {
            out.push_str(&format!(
                "  {} [block {}]: {}\n",
                issue.doc_id, issue.block_index, issue.message
            ));
        }
        out.trim_end().to_string()
    }
}

/// Report structural issues without mutating anything.
///
/// Graph invariants (unique node IDs, resolvable edge endpoints) and the
/// progress range are advisory: the applier stays permissive, this command
/// surfaces violations.
pub fn doctor(workspace: &Path, id: Option<&str>) -> Result<DoctorResult> {
    let storage = open(workspace)?;
    let docs = match id {
        Some(id) => vec![storage.get_document(id)?],
        None => storage.list_documents(None)?,
    };

    let mut issues = Vec::new();
    for doc in &docs {
        check_document(doc, &mut issues);
    }

    Ok(DoctorResult {
        documents_checked: docs.len(),
        issues,
    })
}

fn check_document(doc: &Document, issues: &mut Vec<DoctorIssue>) {
    for (idx, block) in doc.blocks.iter().enumerate() {
        match &block.value {
            BlockValue::Progress(p) => {
                if !(0.0..=100.0).contains(p) {
                    issues.push(DoctorIssue {
                        doc_id: doc.id.clone(),
                        block_index: idx,
                        message: format!("progress value {p} outside 0-100"),
                    });
                }
            }
            BlockValue::NodeGraph(Some(graph)) => {
                let mut seen = std::collections::HashSet::new();
                for node in &graph.nodes {
                    if !seen.insert(node.id) {
                        issues.push(DoctorIssue {
                            doc_id: doc.id.clone(),
                            block_index: idx,
                            message: format!("duplicate node id {}", node.id),
                        });
                    }
                }
                for edge in &graph.edges {
                    for endpoint in [edge.source, edge.target] {
                        if !seen.contains(&endpoint) {
                            issues.push(DoctorIssue {
                                doc_id: doc.id.clone(),
                                block_index: idx,
                                message: format!(
                                    "edge {} -> {} references missing node {}",
                                    edge.source, edge.target, endpoint
                                ),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

// === log ===

#[derive(Debug, Serialize)]
pub struct LogResult {
    pub entries: Vec<action_log::ActionLog>,
}

impl Output for LogResult {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No log entries.".to_string();
        }
        let mut out = String::new();
        for entry in &self.entries {
            let status = if entry.success { "ok" } else { "failed" };
            out.push_str(&format!(
                "{}  {:<20} {} ({}ms)\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.command,
                status,
                entry.duration_ms
            ));
        }
        out.trim_end().to_string()
    }
}

/// Show the audit trail of commands for this workspace.
pub fn log(workspace: &Path, limit: usize) -> Result<LogResult> {
    let storage = open(workspace)?;
    Ok(LogResult {
        entries: action_log::read_log(&storage.root, limit),
    })
}

// === version ===

#[derive(Debug, Serialize)]
pub struct VersionResult {
    pub version: &'static str,
    pub build_timestamp: &'static str,
    pub git_commit: &'static str,
}

impl Output for VersionResult {
    fn to_human(&self) -> String {
        format!(
            "mull {} (built {}, commit {})",
            self.version, self.build_timestamp, self.git_commit
        )
    }
}

/// Version and build information.
pub fn version() -> VersionResult {
    VersionResult {
        version: env!("CARGO_PKG_VERSION"),
        build_timestamp: env!("MULL_BUILD_TIMESTAMP"),
        git_commit: env!("MULL_GIT_COMMIT"),
    }
}

// === rendering helpers ===

fn render_document(doc: &Document) -> String {
    let mut out = format!("{}  {}\n", doc.id, doc.title);
    push_line(&mut out, "Description", &doc.description);
    push_line(&mut out, "Budget", &doc.budget);
    push_line(&mut out, "Execution steps", &doc.execution_steps);
    push_line(&mut out, "Required skills", &doc.required_skills);

    if !doc.blocks.is_empty() {
        out.push_str("  Blocks:\n");
        for (idx, block) in doc.blocks.iter().enumerate() {
            out.push_str(&format!(
                "    [{idx}] {} ({}) - {}\n",
                block.name,
                block.kind(),
                block_summary(block)
            ));
        }
    }
    out.trim_end().to_string()
}

fn push_line(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("  {label}: {value}\n"));
    }
}

fn block_summary(block: &Block) -> String {
    match &block.value {
        BlockValue::Checklist(items) => {
            let done = items.iter().filter(|i| i.done).count();
            format!("{done}/{} done", items.len())
        }
        BlockValue::Tags(tags) => {
            let texts: Vec<&str> = tags.iter().map(|t| t.text.as_str()).collect();
            texts.join(", ")
        }
        BlockValue::Progress(p) => format!("{p}%"),
        BlockValue::Link(links) => format!("{} link(s)", links.len()),
        BlockValue::NodeGraph(graph) => {
            let (nodes, edges) = graph
                .as_ref()
                .map(|g| (g.nodes.len(), g.edges.len()))
                .unwrap_or((0, 0));
            format!("{nodes} nodes, {edges} edges")
        }
    }
}
