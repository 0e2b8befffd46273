use serde::{Deserialize, Serialize};

/// A single block within an assistant or user turn.
///
/// Closed sum type: text, a tool invocation request, or the result of one.
/// Unknown block kinds arriving from a provider are preserved as `Other` so
/// they survive a round-trip through the conversation log without loss.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String },
    #[serde(other)]
    Other,
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult { tool_use_id: tool_use_id.into(), content: content.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Content of a message: either a plain string (the common case) or an
/// ordered sequence of blocks (tool_use / tool_result turns).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Block>),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Blocks(parts) if parts.len() == 1 => parts[0].as_text(),
            _ => None,
        }
    }

    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Self::Text(_) => vec![],
            Self::Blocks(parts) => parts.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn user_blocks(blocks: Vec<Block>) -> Self {
        Self { role: Role::User, content: MessageContent::Blocks(blocks) }
    }

    pub fn assistant_blocks(blocks: Vec<Block>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Blocks(blocks) }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Approximate token count: chars of the JSON-encoded content, divided by four.
    pub fn approx_tokens(&self) -> usize {
        let encoded = serde_json::to_string(&self.content).unwrap_or_default();
        (encoded.len() / 4).max(1)
    }

    /// Every `tool_use` id present in this message, in order.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.content
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every `tool_result` id present in this message, in order.
    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A tool schema advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider. Mirrors `Converse(system, messages, tools, maxTokens)`.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub max_tokens: u32,
}

/// Response from a model provider. `stop_reason == "tool_use"` is the only
/// semantically significant value: any other value ends the agent loop.
#[derive(Debug, Clone)]
pub struct Response {
    pub content: Vec<Block>,
    pub stop_reason: String,
    pub model: String,
}

impl Response {
    pub fn wants_tool_use(&self) -> bool {
        self.stop_reason == "tool_use"
    }

    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|b| match b {
                Block::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(Block::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_user_sets_role_and_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn approx_tokens_divides_json_length_by_four() {
        let m = Message::user("12345678");
        // JSON-encoded: "\"12345678\"" = 10 chars -> 2 (integer division)
        assert_eq!(m.approx_tokens(), 2);
    }

    #[test]
    fn approx_tokens_minimum_is_one() {
        let m = Message::user("");
        assert_eq!(m.approx_tokens(), 1);
    }

    #[test]
    fn tool_use_ids_collects_in_order() {
        let m = Message::assistant_blocks(vec![
            Block::Text { text: "thinking".into() },
            Block::ToolUse { id: "a".into(), name: "bash".into(), input: serde_json::json!({}) },
            Block::ToolUse { id: "b".into(), name: "read_file".into(), input: serde_json::json!({}) },
        ]);
        assert_eq!(m.tool_use_ids(), vec!["a", "b"]);
    }

    #[test]
    fn tool_result_ids_collects_in_order() {
        let m = Message::user_blocks(vec![
            Block::tool_result("a", "ok"),
            Block::tool_result("b", "ok"),
        ]);
        assert_eq!(m.tool_result_ids(), vec!["a", "b"]);
    }

    #[test]
    fn response_wants_tool_use_true_only_for_tool_use_stop_reason() {
        let r = Response { content: vec![], stop_reason: "tool_use".into(), model: "m".into() };
        assert!(r.wants_tool_use());
        let r2 = Response { content: vec![], stop_reason: "end_turn".into(), model: "m".into() };
        assert!(!r2.wants_tool_use());
    }

    #[test]
    fn response_text_joins_text_blocks() {
        let r = Response {
            content: vec![Block::text("a"), Block::ToolUse {
                id: "1".into(),
                name: "x".into(),
                input: serde_json::json!({}),
            }, Block::text("b")],
            stop_reason: "tool_use".into(),
            model: "m".into(),
        };
        assert_eq!(r.text(), "ab");
    }

    #[test]
    fn unknown_block_kind_round_trips_as_other() {
        let json = r#"{"type":"redacted_thinking","data":"xyz"}"#;
        let b: Block = serde_json::from_str(json).unwrap();
        assert_eq!(b, Block::Other);
    }
}
