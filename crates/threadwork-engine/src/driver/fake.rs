//! A deterministic test double for [`Driver`]/[`DriverFactory`], used by
//! the scheduler's own tests so natural-language interpretation can be
//! exercised without a real LLM.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Driver, DriverCriteria, DriverError, DriverFactory, DriverResponse, QueryOptions};

/// Replays a fixed sequence of canned responses, one per `query` call.
pub struct FakeDriver {
    responses: Mutex<Vec<DriverResponse>>,
}

impl FakeDriver {
    pub fn new(responses: Vec<DriverResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }

    pub fn with_single(response: DriverResponse) -> Self {
        Self::new(vec![response])
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn query(
        &self,
        _compiled_prompt: &str,
        _options: &QueryOptions,
    ) -> Result<DriverResponse, DriverError> {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(DriverError::Backend(anyhow::anyhow!(
                "fake driver exhausted its canned responses"
            )));
        }
        Ok(responses.remove(0))
    }
}

/// Always hands out the same [`FakeDriver`], regardless of criteria.
pub struct FakeDriverFactory {
    driver: Arc<FakeDriver>,
}

impl FakeDriverFactory {
    pub fn new(driver: FakeDriver) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn create_driver(
        &self,
        _criteria: &DriverCriteria,
    ) -> Result<Arc<dyn Driver>, DriverError> {
        Ok(self.driver.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replays_canned_responses_in_order() {
        let driver = FakeDriver::new(vec![
            DriverResponse {
                content: "first".into(),
                structured_output: Some(json!({"n": 1})),
            },
            DriverResponse {
                content: "second".into(),
                structured_output: None,
            },
        ]);

        let first = driver.query("p", &QueryOptions::default()).await.unwrap();
        assert_eq!(first.content, "first");
        let second = driver.query("p", &QueryOptions::default()).await.unwrap();
        assert_eq!(second.content, "second");
        assert!(driver.query("p", &QueryOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn factory_ignores_criteria() {
        let factory = FakeDriverFactory::new(FakeDriver::with_single(DriverResponse {
            content: "ok".into(),
            structured_output: None,
        }));
        let driver = factory
            .create_driver(&DriverCriteria::requiring(["time_interpretation"]))
            .await
            .unwrap();
        let response = driver.query("p", &QueryOptions::default()).await.unwrap();
        assert_eq!(response.content, "ok");
    }
}
