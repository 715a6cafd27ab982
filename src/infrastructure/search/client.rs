//! HTTP client for the search index
//!
//! Speaks the OpenSearch-compatible REST API: single-document upsert by id,
//! ndjson bulk writes, and delete by id. The index is an eventually
//! consistent cache; callers treat partial bulk failure as repairable drift,
//! not a fatal error.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::models::SearchDocument;
use crate::infrastructure::search::error::SearchError;
use crate::utils::logging;

/// Outcome of one document inside a bulk write
#[derive(Debug, Clone)]
pub struct BulkItemFailure {
    pub id: i64,
    pub reason: String,
}

/// Client for the search index
pub struct SearchClient {
    client: Client,
    base_url: String,
    index: String,
}

impl SearchClient {
    /// Create a new search client
    pub fn new(config: &AppConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                SearchError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(SearchClient {
            client,
            base_url: config.search.url.trim_end_matches('/').to_string(),
            index: config.search.index.clone(),
        })
    }

    /// Upsert a single document, keyed by asset id
    pub async fn upsert_document(&self, doc: &SearchDocument) -> Result<(), SearchError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, doc.id);

        let response = self.client.put(&url).json(doc).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::IndexError(format!(
                "Upsert for document {} returned status {}: {}",
                doc.id, status, body
            )));
        }

        Ok(())
    }

    /// Delete a document by asset id; a missing document is not an error
    pub async fn delete_document(&self, id: i64) -> Result<(), SearchError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, id);

        let response = self.client.delete(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::IndexError(format!(
                "Delete for document {} returned status {}: {}",
                id, status, body
            )));
        }

        Ok(())
    }

    /// Bulk-upsert a page of documents
    ///
    /// Returns the per-document failures; the caller logs them and moves on
    /// (drift is repaired by the next resync).
    pub async fn bulk_upsert(
        &self,
        docs: &[SearchDocument],
    ) -> Result<Vec<BulkItemFailure>, SearchError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/_bulk", self.base_url);
        let body = build_bulk_body(&self.index, docs)?;

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::IndexError(format!(
                "Bulk write returned status {}: {}",
                status, body
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::ResponseError(format!("Error decoding bulk response: {}", e)))?;

        let failures = collect_bulk_failures(&response_json);
        for failure in &failures {
            logging::log_warning(&format!(
                "Bulk write failed for document {}: {}",
                failure.id, failure.reason
            ));
        }

        Ok(failures)
    }
}

/// Build the ndjson body for a bulk index request
fn build_bulk_body(index: &str, docs: &[SearchDocument]) -> Result<String, SearchError> {
    let mut body = String::new();
    for doc in docs {
        let action = json!({ "index": { "_index": index, "_id": doc.id } });
        let source = serde_json::to_string(doc)
            .map_err(|e| SearchError::ResponseError(format!("Error encoding document: {}", e)))?;
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// Extract per-item failures from a bulk response
fn collect_bulk_failures(response: &Value) -> Vec<BulkItemFailure> {
    let mut failures = Vec::new();

    if response.get("errors").and_then(Value::as_bool) != Some(true) {
        return failures;
    }

    if let Some(items) = response.get("items").and_then(Value::as_array) {
        for item in items {
            let action = item.get("index").or_else(|| item.get("create"));
            if let Some(action) = action {
                if let Some(error) = action.get("error") {
                    let id = action
                        .get("_id")
                        .and_then(Value::as_str)
                        .and_then(|s| s.parse::<i64>().ok())
                        .unwrap_or(-1);
                    failures.push(BulkItemFailure {
                        id,
                        reason: error.to_string(),
                    });
                }
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExpiryState;

    fn doc(id: i64, name: &str) -> SearchDocument {
        SearchDocument {
            id,
            name: name.to_string(),
            owner_address: "0xabc".to_string(),
            registered_at: "2024-01-01T00:00:00Z".to_string(),
            expires_at: "2026-01-01T00:00:00Z".to_string(),
            groups: vec![],
            listing_id: None,
            listing_price: None,
            listing_currency: None,
            listing_expires_at: None,
            offer_count: 0,
            max_offer_amount: None,
            character_count: name.chars().count() as u32,
            is_numeric: false,
            has_emoji: false,
            expiry_state: ExpiryState::Active,
            premium_price_usd: None,
        }
    }

    #[test]
    fn test_bulk_body_has_action_and_source_lines() {
        let body = build_bulk_body("names", &[doc(7, "alice"), doc(8, "bob")]).unwrap();
        let lines: Vec<&str> = body.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("\"_id\":7"));
        assert!(lines[2].contains("\"_id\":8"));
        assert!(lines[1].contains("\"name\":\"alice\""));
    }

    #[test]
    fn test_collect_bulk_failures_partial() {
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 200 } },
                { "index": { "_id": "2", "status": 400,
                             "error": { "type": "mapper_parsing_exception" } } }
            ]
        });
        let failures = collect_bulk_failures(&response);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, 2);
        assert!(failures[0].reason.contains("mapper_parsing_exception"));
    }

    #[test]
    fn test_collect_bulk_failures_none_when_errors_false() {
        let response = json!({ "errors": false, "items": [] });
        assert!(collect_bulk_failures(&response).is_empty());
    }
}
