//! Response envelopes
//!
//! Every successful operation is wrapped as `{data, meta?, timestamp}`;
//! paginated listings lift their metadata out of `data` into `meta`.
//! Failures use [`ErrorEnvelope`].

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

pub use crate::error::ErrorEnvelope;
use crate::error::EntityError;
use crate::orm::Record;
use crate::query::PaginationMeta;
use crate::services::entity::{DeleteOutcome, FindAllResult};

#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PaginationMeta>,
    pub timestamp: String,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: None,
            timestamp: timestamp(),
        }
    }

    pub fn with_meta(mut self, meta: PaginationMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl From<FindAllResult> for SuccessEnvelope<Vec<Record>> {
    fn from(result: FindAllResult) -> Self {
        match result {
            FindAllResult::List(records) => SuccessEnvelope::new(records),
            FindAllResult::Page(page) => SuccessEnvelope::new(page.records).with_meta(page.meta),
        }
    }
}

impl From<Record> for SuccessEnvelope<Record> {
    fn from(record: Record) -> Self {
        SuccessEnvelope::new(record)
    }
}

impl From<DeleteOutcome> for SuccessEnvelope<DeleteOutcome> {
    fn from(outcome: DeleteOutcome) -> Self {
        SuccessEnvelope::new(outcome)
    }
}

/// Serialize an operation result into its envelope
pub fn envelope<T, E>(result: Result<T, EntityError>) -> serde_json::Result<serde_json::Value>
where
    E: Serialize,
    SuccessEnvelope<E>: From<T>,
{
    match result {
        Ok(value) => serde_json::to_value(SuccessEnvelope::<E>::from(value)),
        Err(err) => serde_json::to_value(ErrorEnvelope::from(&err)),
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
