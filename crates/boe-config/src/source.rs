//! Where the external document source fetches raw BOE XML from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Base URL the `HttpDocumentSource` fetches `{base_url}/{law_id}` from.
    /// Left unset, the thin CLI wrapper falls back to the in-process fixture
    /// source rather than a real fetch.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_base_url() {
        assert_eq!(SourceConfig::default().base_url, None);
    }
}
