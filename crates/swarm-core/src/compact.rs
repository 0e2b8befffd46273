// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The compression pipeline: micro-compaction (cheap, runs every turn) and
//! auto-compaction (expensive, runs only when the conversation grows past a
//! token threshold or the model calls `compress`).

use std::path::{Path, PathBuf};

use chrono::Utc;
use swarm_model::{Block, CompletionRequest, Message, MessageContent, ModelProvider};
use swarm_tools::OutputCategory;
use tracing::info;

/// Conversation JSON is truncated to this many characters before being
/// handed to the summarisation call.
const SUMMARIZE_INPUT_CAP: usize = 80_000;

const CLEARED_PLACEHOLDER: &str = "[cleared]";

/// Largest byte index `<= index` that lands on a UTF-8 char boundary.
/// Command/file output routinely has multibyte characters sitting right at a
/// fixed truncation offset; slicing on a non-boundary panics.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Scrub stale tool outputs to reclaim tokens without reshaping the
/// conversation's block structure.
///
/// Collects every `ToolResult` block across the whole message list, in
/// order. If there are more than `keep_last_n`, every one but the last
/// `keep_last_n` has its content replaced with `[cleared]` when the content
/// exceeds `min_len` characters.
pub fn micro_compact(messages: &mut [Message], keep_last_n: usize, min_len: usize) {
    let total = messages
        .iter()
        .flat_map(|m| m.content.blocks())
        .filter(|b| matches!(b, Block::ToolResult { .. }))
        .count();
    if total <= keep_last_n {
        return;
    }
    let to_clear = total - keep_last_n;
    let mut seen = 0usize;
    for msg in messages.iter_mut() {
        let MessageContent::Blocks(blocks) = &mut msg.content else { continue };
        for block in blocks.iter_mut() {
            let Block::ToolResult { content, .. } = block else { continue };
            if seen >= to_clear {
                return;
            }
            seen += 1;
            if content.len() > min_len {
                *content = CLEARED_PLACEHOLDER.to_string();
            }
        }
    }
}

/// Estimate the token cost of a conversation as `len(JSON-encoded messages) / 4`.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let encoded = serde_json::to_string(messages).unwrap_or_default();
    (encoded.len() / 4).max(if messages.is_empty() { 0 } else { 1 })
}

/// Persist the conversation as a JSONL transcript under `transcripts_dir`,
/// one message per line, with a timestamped filename. Returns the path.
pub fn write_transcript(messages: &[Message], transcripts_dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(transcripts_dir)?;
    let path = transcripts_dir.join(format!("transcript_{}.jsonl", Utc::now().timestamp()));
    let mut body = String::new();
    for msg in messages {
        body.push_str(&serde_json::to_string(msg)?);
        body.push('\n');
    }
    std::fs::write(&path, body)?;
    Ok(path)
}

/// Run auto-compaction: persist a transcript, ask the model for a summary,
/// and replace `messages` with exactly two turns.
///
/// Returns the path of the written transcript.
pub async fn auto_compact(
    messages: &mut Vec<Message>,
    provider: &dyn ModelProvider,
    system: &str,
    transcripts_dir: &Path,
) -> anyhow::Result<PathBuf> {
    let transcript_path = write_transcript(messages, transcripts_dir)?;

    let encoded = serde_json::to_string(&messages).unwrap_or_default();
    let truncated: String = encoded.chars().take(SUMMARIZE_INPUT_CAP).collect();
    let summarize_request = Message::user(format!(
        "{truncated}\n\nSummarize for continuity"
    ));

    let req = CompletionRequest {
        system: system.to_string(),
        messages: vec![summarize_request],
        tools: vec![],
        max_tokens: 4096,
    };
    let response = provider.complete(req).await?;
    let summary = response.text();

    messages.clear();
    messages.push(Message::user(format!(
        "[Compressed. Transcript: {}]\n{summary}",
        transcript_path.display()
    )));
    messages.push(Message::assistant("Understood. Continuing with summary context."));

    info!(path = %transcript_path.display(), "auto-compaction fired");
    Ok(transcript_path)
}

/// Deterministic, content-aware tool-result truncation.
///
/// Returns `content` unchanged when it fits within `cap_tokens`.
/// Otherwise applies a category-specific extraction strategy that preserves
/// the most useful portion of the output. Dispatching on [`OutputCategory`]
/// (not on tool names) keeps this function independent of the tools crate's
/// concrete tool list; each tool declares its own category.
///
/// - [`OutputCategory::HeadTail`]: keep the first 60 + last 40 lines so both
///   the command preamble and the final result are visible.
/// - [`OutputCategory::MatchList`]: keep leading matches (highest relevance
///   first); the tail is not preserved because later matches are less relevant.
/// - [`OutputCategory::FileContent`]: balanced head + tail with a separator,
///   preserving both the imports/declarations and the most recent changes.
/// - [`OutputCategory::Generic`]: hard-truncate at the nearest line boundary.
///
/// Every truncated result ends with an explicit notice so the model knows
/// that additional content exists and how to retrieve it.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[... {{lines}} lines / {omitted_bytes} bytes omitted ...]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                     use a more specific pattern to see them ...]"
            ),
        ),
        OutputCategory::FileContent => head_tail_lines(
            content,
            cap_chars,
            usize::MAX,
            usize::MAX,
            &format!(
                "[... {{lines}} lines omitted ({omitted_bytes} bytes); \
                     use read_file with offset/limit to see more ...]"
            ),
        ),
        OutputCategory::Generic => {
            let safe_cap = floor_char_boundary(content, cap_chars);
            let cut = content[..safe_cap]
                .rfind('\n')
                .map(|p| p + 1)
                .unwrap_or(safe_cap);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; \
                 content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

// ─── Private helpers ──────────────────────────────────────────────────────────

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..floor_char_boundary(content, cap_chars)].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

/// Keep `max_head` leading lines and `max_tail` trailing lines, inserting a
/// notice between them. Pass `usize::MAX` to split evenly by character budget.
fn head_tail_lines(
    content: &str,
    cap_chars: usize,
    max_head: usize,
    max_tail: usize,
    notice_template: &str,
) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..floor_char_boundary(content, cap_chars)].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
