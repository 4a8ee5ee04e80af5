//! Static provider/model registry mapping each model to its wire protocol.

use std::fmt;

use crate::protocol::Protocol;
use crate::{Error, Result};

/// Backend families a transport exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// SAP AI Core
    Sap,
    /// GitHub Copilot
    Copilot,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Sap => "sap",
            Backend::Copilot => "copilot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sap" => Some(Backend::Sap),
            "copilot" => Some(Backend::Copilot),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::Sap => "bedrock-2023-05-31",
            Backend::Copilot => "gpt-4",
        }
    }

    /// Models served by this backend
    pub fn models(&self) -> Vec<&'static str> {
        MODEL_ENTRIES
            .iter()
            .filter(|e| e.backend == *self)
            .map(|e| e.model)
            .collect()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider used when none is configured
pub const DEFAULT_BACKEND: Backend = Backend::Copilot;

struct ModelEntry {
    backend: Backend,
    model: &'static str,
    protocol: Protocol,
}

const MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry {
        backend: Backend::Sap,
        model: "bedrock-2023-05-31",
        protocol: Protocol::ContentBlock,
    },
    ModelEntry {
        backend: Backend::Sap,
        model: "claude-3-sonnet",
        protocol: Protocol::ContentBlock,
    },
    ModelEntry {
        backend: Backend::Sap,
        model: "claude-3-haiku",
        protocol: Protocol::ContentBlock,
    },
    ModelEntry {
        backend: Backend::Copilot,
        model: "claude-sonnet-4",
        protocol: Protocol::FunctionCall,
    },
    ModelEntry {
        backend: Backend::Copilot,
        model: "gpt-4",
        protocol: Protocol::FunctionCall,
    },
    ModelEntry {
        backend: Backend::Copilot,
        model: "gpt-4o",
        protocol: Protocol::FunctionCall,
    },
];

/// A validated provider/model pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub backend: Backend,
    pub model: String,
    pub protocol: Protocol,
}

/// Validate a provider name and optional model, filling in the default model.
pub fn resolve(provider: &str, model: Option<&str>) -> Result<ModelSelection> {
    let backend =
        Backend::from_name(provider).ok_or_else(|| Error::UnknownProvider(provider.to_string()))?;
    let model = model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| backend.default_model());

    let entry = MODEL_ENTRIES
        .iter()
        .find(|e| e.backend == backend && e.model == model)
        .ok_or_else(|| Error::UnsupportedModel {
            model: model.to_string(),
            provider: provider.to_string(),
            supported: backend.models().join(", "),
        })?;

    Ok(ModelSelection {
        backend,
        model: entry.model.to_string(),
        protocol: entry.protocol,
    })
}
