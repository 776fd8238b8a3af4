//! Driver factory: capability-driven selection/creation of an LLM driver.
//!
//! Only the interface is specified here; concrete providers (OpenAI,
//! Anthropic, ...) are out of scope. The engine never calls `query` itself
//! except inside the scheduler — workflow bodies are the only other
//! consumers.

mod fake;

pub use fake::{FakeDriver, FakeDriverFactory};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no driver satisfies required capabilities: {0:?}")]
    NoCapableDriver(Vec<String>),

    #[error("driver backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Capability requirements used to pick a driver instance.
#[derive(Debug, Clone, Default)]
pub struct DriverCriteria {
    pub required_capabilities: Vec<String>,
    pub preferred_capabilities: Vec<String>,
}

impl DriverCriteria {
    pub fn requiring(capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required_capabilities: capabilities.into_iter().map(Into::into).collect(),
            preferred_capabilities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DriverResponse {
    pub content: String,
    pub structured_output: Option<Value>,
}

/// A single LLM driver. Implementations handle provider-specific calls.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn query(
        &self,
        compiled_prompt: &str,
        options: &QueryOptions,
    ) -> Result<DriverResponse, DriverError>;
}

/// Creates driver instances matching a capability query.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create_driver(&self, criteria: &DriverCriteria) -> Result<Arc<dyn Driver>, DriverError>;
}
