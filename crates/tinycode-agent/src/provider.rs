//! Chat orchestration over one protocol and one transport

use std::path::Path;
use std::sync::Arc;
use tinycode_ai::protocol::ChatRequest;
use tinycode_ai::{
    ChatResponse, Message, Protocol, StopReason, ToolDefinition, ToolExecutor, TranscriptEntry,
    Transport, check_tool_pairing,
};

use crate::compaction::{CompactionConfig, CompressionOutcome};
use crate::error::Result;

/// Formats requests with a [`Protocol`], sends them over a [`Transport`]
/// and parses the answers.
pub struct ChatProvider {
    transport: Arc<dyn Transport>,
    protocol: Protocol,
    model: String,
    system_prompt: String,
    compaction: CompactionConfig,
}

impl ChatProvider {
    pub fn new(
        transport: Arc<dyn Transport>,
        protocol: Protocol,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            protocol,
            model: model.into(),
            system_prompt: system_prompt.into(),
            compaction: CompactionConfig::default(),
        }
    }

    /// Set compaction configuration
    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the backend behind the transport
    pub fn provider_name(&self) -> &str {
        self.transport.name()
    }

    /// One round-trip. Transport failures propagate unretried.
    pub async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        history: &str,
    ) -> Result<ChatResponse> {
        let body = self.protocol.format_request(&ChatRequest {
            messages,
            tools,
            system: &self.system_prompt,
            history,
            model: &self.model,
        })?;
        tracing::debug!(
            protocol = %self.protocol,
            messages = messages.len(),
            bytes = body.len(),
            "sending chat request"
        );

        let response = self.transport.send(body).await?;
        let parsed = self.protocol.parse_response(&response)?;
        tracing::debug!(
            entries = parsed.messages.len(),
            stop_reason = ?parsed.stop_reason,
            "chat response"
        );
        Ok(parsed)
    }

    /// Whether the buffer has reached the compaction threshold
    pub fn should_compress(&self, len: usize) -> bool {
        self.compaction.should_compress(len)
    }

    /// Summarize part of the buffer into the running history.
    ///
    /// When the protocol's policy finds nothing to compress the inputs come
    /// back unchanged. A failed summarization call propagates and leaves the
    /// caller's state untouched.
    pub async fn compress(&self, messages: Vec<Message>, history: String) -> Result<CompressionOutcome> {
        let plan = self.protocol.plan_compression(&messages);
        if plan.to_compress.is_empty() {
            tracing::debug!(messages = messages.len(), "no compaction boundary");
            return Ok(CompressionOutcome::unchanged(messages, history));
        }

        let body = self
            .protocol
            .format_compression_request(&plan.to_compress, &history, &self.model)?;
        tracing::debug!(
            compress = plan.to_compress.len(),
            retain = plan.retained.len(),
            "compacting conversation"
        );

        let response = self.transport.send(body).await?;
        let history = self
            .protocol
            .parse_compression_response(&messages, &response)?;

        if let Err(violation) = check_tool_pairing(&plan.retained) {
            tracing::warn!("compaction left an unpaired tool reply: {}", violation);
        }

        Ok(CompressionOutcome {
            history,
            messages: plan.retained,
            compacted: true,
        })
    }

    /// Run the pending tool calls of the last message.
    ///
    /// `None` when the last message is not eligible for tool processing.
    pub async fn dispatch_tools(
        &self,
        messages: &[Message],
        tools: &dyn ToolExecutor,
        workspace_root: &Path,
        log: &mut (dyn FnMut(TranscriptEntry) + Send),
    ) -> Option<Vec<Message>> {
        self.protocol
            .dispatch_tools(messages, tools, workspace_root, log)
            .await
    }

    pub fn needs_tool_processing(&self, stop_reason: Option<&StopReason>) -> bool {
        self.protocol.needs_tool_processing(stop_reason)
    }

    /// Render messages for display
    pub fn transcript(&self, messages: &[Message]) -> Vec<TranscriptEntry> {
        self.protocol.transcript(messages)
    }
}
