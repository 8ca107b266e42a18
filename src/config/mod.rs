//! Configuration for Mull.
//!
//! Preferences live in `config.kdl` inside the workspace's data directory:
//!
//! ```kdl
//! model "llama-3.3-70b-versatile"
//! api-url "https://api.groq.com/openai/v1/chat/completions"
//! timeout-secs 60
//! output-format "human"  // or "json"
//! api-key "gsk_..."      // optional; environment variables take precedence
//! ```
//!
//! Every node is optional; built-in defaults cover the rest. For the API key
//! the precedence is `MULL_API_KEY` > `GROQ_API_KEY` > config file.

use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default generative model.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default OpenAI-compatible completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default backend timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variables checked for the API key, in precedence order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["MULL_API_KEY", "GROQ_API_KEY"];

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl. Unset values fall back to the
/// built-in defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MullConfig {
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output_format: Option<OutputFormat>,
    pub api_key: Option<String>,
}

impl MullConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective model name.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Effective completions endpoint.
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Effective backend timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Effective output format.
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.unwrap_or_default()
    }

    /// Parse config from a KDL document. Unknown nodes and malformed values
    /// are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = string_node(doc, "model") {
            config.model = Some(s);
        }
        if let Some(s) = string_node(doc, "api-url") {
            config.api_url = Some(s);
        }
        if let Some(node) = doc.get("timeout-secs") {
            if let Some(entry) = node.entries().first() {
                if let Some(i) = entry.value().as_integer() {
                    if i > 0 {
                        config.timeout_secs = Some(i as u64);
                    }
                }
            }
        }
        if let Some(s) = string_node(doc, "output-format") {
            config.output_format = OutputFormat::parse(&s);
        }
        if let Some(s) = string_node(doc, "api-key") {
            config.api_key = Some(s);
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref model) = self.model {
            doc.nodes_mut().push(string_kdl_node("model", model));
        }
        if let Some(ref url) = self.api_url {
            doc.nodes_mut().push(string_kdl_node("api-url", url));
        }
        if let Some(secs) = self.timeout_secs {
            let mut node = KdlNode::new("timeout-secs");
            node.push(KdlEntry::new(KdlValue::Integer(secs as i128)));
            doc.nodes_mut().push(node);
        }
        if let Some(format) = self.output_format {
            doc.nodes_mut()
                .push(string_kdl_node("output-format", format.as_str()));
        }
        if let Some(ref key) = self.api_key {
            doc.nodes_mut().push(string_kdl_node("api-key", key));
        }

        doc
    }

    /// Load the config from `<storage root>/config.kdl`.
    ///
    /// A missing file yields the defaults; an unreadable or unparseable file
    /// is an error rather than silently ignored.
    pub fn load(storage_root: &Path) -> Result<Self> {
        let path = storage_root.join("config.kdl");
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Other(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Self::from_kdl(&doc))
    }

    /// Write the config to `<storage root>/config.kdl`.
    pub fn save(&self, storage_root: &Path) -> Result<()> {
        let path = storage_root.join("config.kdl");
        std::fs::write(&path, self.to_kdl().to_string())?;
        Ok(())
    }
}

/// Resolve the API key: environment first, then the config file.
pub fn resolve_api_key(config: &MullConfig) -> Option<String> {
    let env_values = API_KEY_ENV_VARS
        .iter()
        .map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .collect::<Vec<_>>();
    select_api_key(env_values, config)
}

/// Pure precedence selection, separated for testability.
fn select_api_key(env_values: Vec<Option<String>>, config: &MullConfig) -> Option<String> {
    env_values
        .into_iter()
        .flatten()
        .next()
        .or_else(|| config.api_key.clone().filter(|v| !v.is_empty()))
}

fn string_node(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}

fn string_kdl_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}
