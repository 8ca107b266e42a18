//! Conversation layer between the user, the document, and the generative
//! backend.
//!
//! [`ChatAdvisor`] assembles the system prompt plus document context, sends
//! the conversation to an injected [`ChatClient`], and post-processes the raw
//! reply through the extraction engine so callers only ever see sanitized
//! text plus parsed action candidates. The advisor never mutates or persists
//! the document; applying a suggested action is a separate, user-approved
//! step.
//!
//! [`GroqClient`] is the production client (OpenAI-compatible
//! chat/completions over blocking HTTP). Tests substitute a scripted client.

pub mod prompts;

use crate::actions::extract;
use crate::models::{BlockValue, Document, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Maximum number of prior turns sent to the backend.
pub const HISTORY_WINDOW: usize = 20;

/// Sampling temperature for advisor replies.
const TEMPERATURE: f64 = 0.7;

/// Completion budget per reply.
const MAX_TOKENS: u32 = 2000;

/// Errors from the conversation layer.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// No API key in the environment or state.
    #[error("advisor unavailable: no API key configured (set MULL_API_KEY or GROQ_API_KEY)")]
    MissingApiKey,

    /// Network or HTTP-status failure from the backend.
    #[error("advisor request failed: {0}")]
    Http(String),

    /// The backend answered with a shape we do not understand.
    #[error("unexpected advisor response: {0}")]
    Parse(String),
}

/// One turn of a conversation, in the wire shape the backend expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A text-completion backend. Injected so tests can script replies.
pub trait ChatClient {
    /// Produce the assistant's reply to the given conversation.
    fn complete(&self, messages: &[ChatTurn]) -> Result<String, AdvisorError>;
}

/// Blocking client for an OpenAI-compatible chat/completions endpoint.
pub struct GroqClient {
    api_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GroqClient {
    pub fn new(api_url: String, model: String, api_key: String, timeout: Duration) -> Self {
        Self {
            api_url,
            model,
            api_key,
            timeout,
        }
    }
}

impl ChatClient for GroqClient {
    fn complete(&self, messages: &[ChatTurn]) -> Result<String, AdvisorError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();

        let response = agent
            .post(&self.api_url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_json(serde_json::json!({
                "model": self.model,
                "messages": messages,
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
            }));

        let body: Value = match response {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| AdvisorError::Parse(e.to_string()))?,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(AdvisorError::Http(format!("HTTP {}: {}", code, body)));
            }
            Err(e) => return Err(AdvisorError::Http(e.to_string())),
        };

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdvisorError::Parse("no completion content in response".to_string()))
    }
}

/// The advisor's reply after sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// User-visible text, with every action fence stripped.
    pub content: String,

    /// First embedded action, if any - the suggested one by convention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<Value>,

    /// Every embedded action in occurrence order.
    #[serde(default)]
    pub all_actions: Vec<Value>,
}

/// Drives one conversation turn against the backend.
pub struct ChatAdvisor {
    client: Box<dyn ChatClient>,
}

impl ChatAdvisor {
    pub fn new(client: Box<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// Send one user message and return the sanitized reply.
    ///
    /// `history` is the prior conversation (oldest first) excluding the new
    /// message; only the last [`HISTORY_WINDOW`] turns are forwarded.
    pub fn chat(
        &self,
        doc: &Document,
        history: &[ChatTurn],
        user_message: &str,
    ) -> Result<ChatReply, AdvisorError> {
        let system = format!(
            "{}\n\n---\n{}",
            prompts::SYSTEM_PROMPT,
            document_context(doc, history.len())
        );

        let mut messages = Vec::with_capacity(history.len().min(HISTORY_WINDOW) + 2);
        messages.push(ChatTurn::new(Role::System, system));
        let window_start = history.len().saturating_sub(HISTORY_WINDOW);
        messages.extend_from_slice(&history[window_start..]);
        messages.push(ChatTurn::new(Role::User, user_message));

        let raw = self.client.complete(&messages)?;
        let extraction = extract(&raw);

        Ok(ChatReply {
            content: extraction.visible_text,
            suggested_action: extraction.actions.first().cloned(),
            all_actions: extraction.actions,
        })
    }
}

/// Render the document into prompt context: scalar fields plus a compact
/// summary of every block, with its index so the advisor can address it.
pub fn document_context(doc: &Document, prior_messages: usize) -> String {
    let mut out = String::new();
    out.push_str("## Current document\n\n");
    out.push_str(&format!("**Title:** {}\n", doc.title));
    out.push_str(&format!("**Description:** {}\n", doc.description));
    push_field(&mut out, "Budget", &doc.budget);
    push_field(&mut out, "Execution steps", &doc.execution_steps);
    push_field(&mut out, "Required skills", &doc.required_skills);

    if !doc.blocks.is_empty() {
        out.push_str(&format!("\n**Blocks ({}):**\n", doc.blocks.len()));
        for (idx, block) in doc.blocks.iter().enumerate() {
            out.push_str(&format!(
                "\n[block {idx}] {} ({})\n",
                block.name,
                block.kind()
            ));
            match &block.value {
                BlockValue::Checklist(items) => {
                    let done = items.iter().filter(|i| i.done).count();
                    out.push_str(&format!("  done: {done}/{}\n", items.len()));
                    for item in items.iter().take(5) {
                        let mark = if item.done { "x" } else { " " };
                        out.push_str(&format!("  [{mark}] {}\n", item.text));
                    }
                }
                BlockValue::Tags(tags) => {
                    let texts: Vec<&str> = tags.iter().take(10).map(|t| t.text.as_str()).collect();
                    out.push_str(&format!("  tags: {}\n", texts.join(", ")));
                }
                BlockValue::Progress(p) => {
                    out.push_str(&format!("  progress: {p}%\n"));
                }
                BlockValue::Link(links) => {
                    for link in links.iter().take(3) {
                        let label = if link.title.is_empty() {
                            &link.url
                        } else {
                            &link.title
                        };
                        out.push_str(&format!("  - {label}\n"));
                    }
                }
                BlockValue::NodeGraph(graph) => {
                    let (nodes, edges) = graph
                        .as_ref()
                        .map(|g| (g.nodes.len(), g.edges.len()))
                        .unwrap_or((0, 0));
                    out.push_str(&format!("  graph: {nodes} nodes, {edges} edges\n"));
                    if let Some(g) = graph {
                        for node in g.nodes.iter().take(8) {
                            out.push_str(&format!("  - [{}] {}\n", node.kind, node.label));
                        }
                    }
                }
            }
        }
    }

    if prior_messages > 0 {
        out.push_str(&format!("\n**Prior messages:** {prior_messages}\n"));
    }

    out
}

fn push_field(out: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        out.push_str(&format!("**{label}:** (not set)\n"));
    } else {
        out.push_str(&format!("**{label}:** {value}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockValue, ChecklistItem, TagEntry};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Scripted backend: returns a fixed reply and records what it was sent.
    struct ScriptedClient {
        reply: String,
        seen: Rc<RefCell<Vec<ChatTurn>>>,
    }

    impl ScriptedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Rc::new(RefCell::new(Vec::new())),
            }
        }

        /// Handle onto the recorded conversation, shared with the test.
        fn recorder(&self) -> Rc<RefCell<Vec<ChatTurn>>> {
            Rc::clone(&self.seen)
        }
    }

    impl ChatClient for ScriptedClient {
        fn complete(&self, messages: &[ChatTurn]) -> Result<String, AdvisorError> {
            *self.seen.borrow_mut() = messages.to_vec();
            Ok(self.reply.clone())
        }
    }

    fn sample_doc() -> Document {
        let mut doc = Document::new("ml-0001".into(), "Delivery drones".into());
        doc.description = "Last-mile delivery with small drones".into();
        doc.budget = "100k USD".into();
        doc.blocks = vec![
            Block::new(
                "Tasks",
                BlockValue::Checklist(vec![
                    ChecklistItem {
                        text: "prototype".into(),
                        done: true,
                    },
                    ChecklistItem {
                        text: "permits".into(),
                        done: false,
                    },
                ]),
            ),
            Block::new(
                "Labels",
                BlockValue::Tags(vec![TagEntry {
                    text: "logistics".into(),
                    color_index: 0,
                }]),
            ),
        ];
        doc
    }

    #[test]
    fn test_chat_strips_action_from_content() {
        let reply = "Raising the budget now.\n```__SYSTEM_ACTION__\n{\"action\":\"update_field\",\"field\":\"budget\",\"value\":\"200k\"}\n```\nDone!";
        let advisor = ChatAdvisor::new(Box::new(ScriptedClient::new(reply)));
        let result = advisor.chat(&sample_doc(), &[], "raise the budget").unwrap();
        assert_eq!(result.content, "Raising the budget now.\nDone!");
        assert_eq!(result.all_actions.len(), 1);
        assert_eq!(result.suggested_action.unwrap()["field"], "budget");
    }

    #[test]
    fn test_chat_without_actions() {
        let advisor = ChatAdvisor::new(Box::new(ScriptedClient::new("Tell me more about it.")));
        let result = advisor.chat(&sample_doc(), &[], "what do you think?").unwrap();
        assert_eq!(result.content, "Tell me more about it.");
        assert!(result.suggested_action.is_none());
        assert!(result.all_actions.is_empty());
    }

    #[test]
    fn test_chat_sends_system_prompt_and_context() {
        let client = ScriptedClient::new("ok");
        let recorder = client.recorder();
        let advisor = ChatAdvisor::new(Box::new(client));
        advisor.chat(&sample_doc(), &[], "hello").unwrap();

        let seen = recorder.borrow();
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[0].content.contains("Mull advisor"));
        assert!(seen[0].content.contains("Delivery drones"));
        assert!(seen[0].content.contains("[block 0] Tasks (checklist)"));
        assert_eq!(seen.last().unwrap().role, Role::User);
        assert_eq!(seen.last().unwrap().content, "hello");
    }

    #[test]
    fn test_chat_caps_history_window() {
        let client = ScriptedClient::new("ok");
        let recorder = client.recorder();
        let advisor = ChatAdvisor::new(Box::new(client));

        let history: Vec<ChatTurn> = (0..30)
            .map(|i| ChatTurn::new(Role::User, format!("message {i}")))
            .collect();
        advisor.chat(&sample_doc(), &history, "latest").unwrap();

        let seen = recorder.borrow();
        // 1 system + 20 history + 1 new user message
        assert_eq!(seen.len(), 22);
        assert_eq!(seen[1].content, "message 10");
    }

    #[test]
    fn test_document_context_reports_empty_fields() {
        let doc = Document::new("ml-0002".into(), "Bare".into());
        let context = document_context(&doc, 0);
        assert!(context.contains("**Budget:** (not set)"));
        assert!(context.contains("**Required skills:** (not set)"));
        assert!(!context.contains("Blocks"));
    }

    #[test]
    fn test_document_context_summarizes_graph() {
        let mut doc = Document::new("ml-0003".into(), "Map idea".into());
        doc.blocks = vec![Block::new("Map", BlockValue::NodeGraph(None))];
        let context = document_context(&doc, 3);
        assert!(context.contains("graph: 0 nodes, 0 edges"));
        assert!(context.contains("**Prior messages:** 3"));
    }
}
