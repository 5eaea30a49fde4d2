//! Sequential address extraction over an ordered slice of records.

use super::types::{AddressFields, Record};
use crate::capability::{
    LanguageModel, ModelError, ResponseSchema, SchemaViolation, SessionGuard, ensure_available,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Failure while extracting a single address.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Model request failed.
    #[error("Failed to extract address information: {0}")]
    Model(#[from] ModelError),
    /// Model output was not valid JSON.
    #[error("Failed to extract address information: {0}")]
    Decode(#[from] serde_json::Error),
    /// Model output did not satisfy the address schema.
    #[error("Failed to extract address information: {0}")]
    Schema(#[from] SchemaViolation),
}

/// Counters and the latest error left behind by [`ExtractionPipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Number of records for which a request was issued.
    pub attempted: usize,
    /// Records whose fields were filled.
    pub succeeded: usize,
    /// Records that failed; their fields were left untouched.
    pub failed: usize,
    /// Identifiers of the failed records in processing order.
    pub failed_ids: Vec<String>,
    /// Message for the most recent failure, if any.
    pub last_error: Option<String>,
}

/// Schema every extraction response must satisfy.
pub fn address_schema() -> ResponseSchema {
    ResponseSchema::object()
        .string_property("city", "The city name extracted from the address")
        .string_property("state", "The state name extracted from the address")
        .pattern_property(
            "pinCode",
            "The PIN code (postal code) extracted from the address",
            "^[0-9]{6}$",
        )
        .require(&["city", "state", "pinCode"])
        .deny_additional_properties()
}

/// Prompt asking the model to pull city, state and PIN code out of `address`.
pub fn build_extraction_prompt(address: &str) -> String {
    format!(
        "Extract the city, state, and PIN code from the following Indian address.\n\
         Return only the extracted information in the specified JSON format.\n\n\
         Address: {address}\n\n\
         Extract:\n\
         - City: The city name\n\
         - State: The state name (full name, e.g., \"Maharashtra\", \"Gujarat\", \"Karnataka\")\n\
         - PIN Code: The 6-digit PIN code"
    )
}

/// Issues one structured-extraction request per record, strictly in order.
///
/// Each successful result is merged into its record before the next request starts, so
/// observers see partial progress. A failing record is reported and skipped; it never aborts
/// the run. After every successful record the pipeline pauses for the throttle delay to stay
/// under provider rate limits.
pub struct ExtractionPipeline {
    model: Arc<dyn LanguageModel>,
    schema: ResponseSchema,
    throttle: Duration,
}

impl ExtractionPipeline {
    /// Build a pipeline with the default 100 ms throttle.
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            schema: address_schema(),
            throttle: DEFAULT_THROTTLE,
        }
    }

    /// Override the pause inserted after each successful record.
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Whether the underlying capability gate is open.
    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    /// Run the pipeline over `records`, updating them in place.
    ///
    /// Returns `Err` only when the capability gate is closed, in which case no record is
    /// touched.
    pub async fn run(&self, records: &mut [Record]) -> Result<ExtractionReport, ModelError> {
        self.run_with_progress(records, |_, _| {}).await
    }

    /// Like [`ExtractionPipeline::run`], calling `on_update` with the index and new state of
    /// each record as soon as its fields are merged.
    pub async fn run_with_progress<F>(
        &self,
        records: &mut [Record],
        mut on_update: F,
    ) -> Result<ExtractionReport, ModelError>
    where
        F: FnMut(usize, &Record) + Send,
    {
        ensure_available(self.model.as_ref())?;

        let mut report = ExtractionReport::default();
        tracing::info!(records = records.len(), "Starting address extraction");

        for (index, record) in records.iter_mut().enumerate() {
            report.attempted += 1;
            match self.extract_address(&record.address).await {
                Ok(fields) => {
                    record.merge(fields);
                    report.succeeded += 1;
                    tracing::debug!(
                        record_id = %record.id,
                        city = %record.city,
                        state = %record.state,
                        pin_code = %record.pin_code,
                        "Address extracted"
                    );
                    on_update(index, record);
                    tokio::time::sleep(self.throttle).await;
                }
                Err(error) => {
                    let name = record.full_name();
                    tracing::error!(
                        record_id = %record.id,
                        name = %name,
                        error = %error,
                        "Error extracting address"
                    );
                    report.failed += 1;
                    report.failed_ids.push(record.id.clone());
                    report.last_error =
                        Some(format!("Failed to extract address for {name}. {error}"));
                }
            }
        }

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Address extraction finished"
        );
        Ok(report)
    }

    /// Issue a single structured-extraction request for `address`.
    pub async fn extract_address(&self, address: &str) -> Result<AddressFields, ExtractionError> {
        let raw = {
            let session = SessionGuard::acquire(self.model.as_ref()).await?;
            session
                .prompt(&build_extraction_prompt(address), Some(&self.schema))
                .await?
        };

        let value: serde_json::Value = serde_json::from_str(&raw)?;
        self.schema.validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::LanguageSession;
    use crate::extraction::sample_records;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records the addresses it was asked about.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    struct ScriptedSession {
        reply: Mutex<Option<Result<String, String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|reply| reply.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn is_available(&self) -> bool {
            true
        }

        async fn create_session(&self) -> Result<Box<dyn LanguageSession>, ModelError> {
            let reply = self.replies.lock().unwrap().pop_front();
            Ok(Box::new(ScriptedSession {
                reply: Mutex::new(reply),
                prompts: self.prompts.clone(),
            }))
        }
    }

    #[async_trait]
    impl LanguageSession for ScriptedSession {
        async fn prompt(
            &self,
            prompt: &str,
            constraint: Option<&ResponseSchema>,
        ) -> Result<String, ModelError> {
            assert!(constraint.is_some(), "extraction must be schema constrained");
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.reply.lock().unwrap().take() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(ModelError::GenerationFailed(message)),
                None => Err(ModelError::GenerationFailed("no scripted reply".into())),
            }
        }

        fn destroy(&mut self) {}
    }

    #[test]
    fn address_schema_matches_contract() {
        let schema = address_schema().to_json();
        assert_eq!(schema["required"], serde_json::json!(["city", "state", "pinCode"]));
        assert_eq!(schema["properties"]["pinCode"]["pattern"], "^[0-9]{6}$");
        assert_eq!(schema["additionalProperties"], false);
    }

    #[tokio::test]
    async fn fills_record_from_structured_reply() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            r#"{"city":"Noida","state":"Uttar Pradesh","pinCode":"201301"}"#,
        )]));
        let pipeline = ExtractionPipeline::new(model.clone()).with_throttle(Duration::ZERO);
        let mut records = sample_records();
        records.truncate(1);

        let report = pipeline.run(&mut records).await.expect("run");

        assert_eq!(records[0].city, "Noida");
        assert_eq!(records[0].state, "Uttar Pradesh");
        assert_eq!(records[0].pin_code, "201301");
        assert_eq!(report.succeeded, 1);
        assert!(report.last_error.is_none());
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Sector 5, Noida, Uttar Pradesh 201301"));
    }

    #[tokio::test]
    async fn failure_is_reported_and_later_records_still_run() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(r#"{"city":"Noida","state":"Uttar Pradesh","pinCode":"201301"}"#),
            Err("model busy"),
            Ok(r#"{"city":"Ahmedabad","state":"Gujarat","pinCode":"380015"}"#),
        ]));
        let pipeline = ExtractionPipeline::new(model.clone()).with_throttle(Duration::ZERO);
        let mut records = sample_records();
        records.truncate(3);
        let mut seen = Vec::new();

        let report = pipeline
            .run_with_progress(&mut records, |index, record| {
                seen.push((index, record.city.clone()));
            })
            .await
            .expect("run");

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed_ids, vec!["2".to_string()]);
        assert!(records[1].is_unprocessed());
        assert_eq!(records[2].city, "Ahmedabad");
        assert_eq!(
            seen,
            vec![(0, "Noida".to_string()), (2, "Ahmedabad".to_string())]
        );
        let message = report.last_error.expect("error surfaced");
        assert!(message.starts_with("Failed to extract address for Priya Sharma."));
        assert!(message.contains("model busy"));
        assert_eq!(model.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pattern_violation_fails_the_record() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            r#"{"city":"Noida","state":"Uttar Pradesh","pinCode":"2013"}"#,
        )]));
        let pipeline = ExtractionPipeline::new(model);
        let error = pipeline
            .extract_address("Noida 2013")
            .await
            .expect_err("invalid pin");
        assert!(matches!(
            error,
            ExtractionError::Schema(SchemaViolation::PatternMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn closed_gate_leaves_records_untouched() {
        let pipeline = ExtractionPipeline::new(Arc::new(crate::capability::DisabledLanguageModel));
        let mut records = sample_records();
        let error = pipeline.run(&mut records).await.expect_err("gate closed");
        assert!(matches!(error, ModelError::Unavailable));
        assert!(records.iter().all(Record::is_unprocessed));
    }
}
