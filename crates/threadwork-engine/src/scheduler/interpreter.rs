//! Translates a natural-language schedule request into a concrete
//! absolute instant via the driver factory's structured-output contract.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::driver::{DriverCriteria, DriverFactory, QueryOptions};

use super::error::SchedulerError;

/// The structured response the interpretation prompt asks the driver to
/// produce.
#[derive(Debug, Clone, Deserialize)]
pub struct Interpretation {
    pub next: DateTime<Utc>,
    #[serde(default)]
    pub pattern: Option<String>,
    pub interpretation: String,
}

/// The capability required of a driver used for schedule interpretation.
pub const TIME_INTERPRETATION_CAPABILITY: &str = "time_interpretation";

fn compile_prompt(now: DateTime<Utc>, timezone: Tz, request: &str) -> String {
    format!(
        "current time is {now}, timezone is {timezone}, request is \"{request}\"; \
         produce {{ next: ISO-8601, pattern?: text, interpretation: text }}"
    )
}

/// Invokes the driver with a structured-output prompt and parses the
/// result. Returns [`SchedulerError::InterpretationFailed`] on any
/// failure to obtain a usable structured response.
pub async fn interpret(
    driver_factory: &dyn DriverFactory,
    now: DateTime<Utc>,
    timezone: Tz,
    request: &str,
) -> Result<Interpretation, SchedulerError> {
    let driver = driver_factory
        .create_driver(&DriverCriteria::requiring([TIME_INTERPRETATION_CAPABILITY]))
        .await?;

    let prompt = compile_prompt(now, timezone, request);
    let response = driver.query(&prompt, &QueryOptions::default()).await?;

    let structured = response.structured_output.ok_or_else(|| {
        SchedulerError::InterpretationFailed(
            "driver response carried no structured output".to_string(),
        )
    })?;

    serde_json::from_value(structured)
        .map_err(|err| SchedulerError::InterpretationFailed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverResponse, FakeDriver, FakeDriverFactory};
    use serde_json::json;

    #[tokio::test]
    async fn interprets_structured_response() {
        let factory = FakeDriverFactory::new(FakeDriver::with_single(DriverResponse {
            content: "ok".into(),
            structured_output: Some(json!({
                "next": "2026-08-01T09:00:00Z",
                "pattern": "every day",
                "interpretation": "tomorrow at 9am, daily"
            })),
        }));

        let result = interpret(&factory, Utc::now(), chrono_tz::UTC, "every day at 9am")
            .await
            .unwrap();
        assert_eq!(result.pattern.as_deref(), Some("every day"));
    }

    #[tokio::test]
    async fn missing_structured_output_fails() {
        let factory = FakeDriverFactory::new(FakeDriver::with_single(DriverResponse {
            content: "no structured output here".into(),
            structured_output: None,
        }));

        let result = interpret(&factory, Utc::now(), chrono_tz::UTC, "every day at 9am").await;
        assert!(matches!(result, Err(SchedulerError::InterpretationFailed(_))));
    }
}
