// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::types::{CompletionRequest, Response};

/// A language-model endpoint capable of one synchronous, non-streaming
/// `Converse` call. This is the only capability the agent kernel depends on;
/// everything else about a provider (auth, retries, wire format) lives below
/// this trait.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for logging.
    fn name(&self) -> &str;

    /// Send a request and return the model's full (non-streamed) response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<Response>;
}
