//! The external document source: fetches raw BOE XML for a law id. Parse
//! workers depend on the trait, never on a concrete transport.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use boe_core::IngestError;

pub trait DocumentSource: Send + Sync {
    /// Fetch the raw XML body for `law_id`. An empty body is not an error
    /// here — the caller (Parse worker) treats it as a fetch failure per
    /// the documented failure mode.
    fn fetch(&self, law_id: &str) -> Result<String, IngestError>;
}

/// Fetches documents over HTTP with a 30s per-request timeout, per the
/// concurrency model's default remote-call timeout.
pub struct HttpDocumentSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpDocumentSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, IngestError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IngestError::Infrastructure(anyhow::anyhow!(e)))?;
        Ok(Self { client, base_url: base_url.into() })
    }
}

impl DocumentSource for HttpDocumentSource {
    fn fetch(&self, law_id: &str) -> Result<String, IngestError> {
        let url = format!("{}/{law_id}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| IngestError::FetchFailure { law_id: law_id.to_string(), reason: e.to_string() })?;
        if !response.status().is_success() {
            return Err(IngestError::FetchFailure {
                law_id: law_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        let body = response
            .text()
            .map_err(|e| IngestError::FetchFailure { law_id: law_id.to_string(), reason: e.to_string() })?;
        if body.is_empty() {
            return Err(IngestError::FetchFailure { law_id: law_id.to_string(), reason: "empty response body".into() });
        }
        Ok(body)
    }
}

/// Fixed in-memory source for tests and simulation runs: a `law_id -> xml`
/// map prepared ahead of time. Missing or empty entries surface the same
/// `FetchFailure` a real transport would.
#[derive(Default)]
pub struct StaticDocumentSource {
    documents: Mutex<HashMap<String, String>>,
}

impl StaticDocumentSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(self, law_id: impl Into<String>, xml: impl Into<String>) -> Self {
        self.documents.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(law_id.into(), xml.into());
        self
    }
}

impl DocumentSource for StaticDocumentSource {
    fn fetch(&self, law_id: &str) -> Result<String, IngestError> {
        let documents = self.documents.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match documents.get(law_id) {
            Some(xml) if !xml.is_empty() => Ok(xml.clone()),
            _ => Err(IngestError::FetchFailure { law_id: law_id.to_string(), reason: "empty or missing document body".into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_serves_registered_documents() {
        let source = StaticDocumentSource::new().with_document("BOE-A-2000-1", "<xml/>");
        assert_eq!(source.fetch("BOE-A-2000-1").unwrap(), "<xml/>");
    }

    #[test]
    fn static_source_reports_fetch_failure_for_missing_document() {
        let source = StaticDocumentSource::new();
        let err = source.fetch("missing").unwrap_err();
        assert!(matches!(err, IngestError::FetchFailure { .. }));
    }
}
