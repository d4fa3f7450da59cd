//! RNAcentral lookup: EBI Search for identifiers, RNAcentral REST API for
//! the full records.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::query::{construct_search_query, SearchQuery, ToolDirective};
use super::ToolError;
use crate::config::RnaCentralConfig;

/// Identifiers matched by a search, in service order, plus a link that
/// reproduces the search for a human.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHits {
    pub identifiers: Vec<String>,
    pub reference_url: String,
}

/// An external sequence database the tRNA tool can query.
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Parse the model's directive into a query and result limit.
    fn construct_search_query(&self, directive: &str) -> Result<ToolDirective, ToolError> {
        construct_search_query(directive)
    }

    /// Run the query. An empty hit list is a valid outcome.
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, ToolError>;

    /// Full records for exactly `identifiers`, in order. Unknown identifiers
    /// are left out of the result.
    async fn fetch_records(&self, identifiers: &[String]) -> Result<Vec<Value>, ToolError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
}

/// `SequenceSource` backed by the public RNAcentral services.
pub struct RnaCentralClient {
    http: reqwest::Client,
    config: RnaCentralConfig,
}

impl RnaCentralClient {
    /// `http` should already carry the request timeout.
    pub fn new(http: reqwest::Client, config: RnaCentralConfig) -> Self {
        Self { http, config }
    }

    fn reference_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}/search?q={}",
            self.config.portal_url.trim_end_matches('/'),
            urlencoding::encode(query.expression())
        )
    }

    fn record_url(&self, identifier: &str) -> String {
        format!(
            "{}/rna/{}",
            self.config.api_url.trim_end_matches('/'),
            record_path(identifier)
        )
    }

    fn record_link(&self, identifier: &str) -> String {
        format!(
            "{}/rna/{}",
            self.config.portal_url.trim_end_matches('/'),
            record_path(identifier)
        )
    }
}

#[async_trait]
impl SequenceSource for RnaCentralClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, ToolError> {
        let size = self.config.page_size.to_string();
        tracing::info!(query = %query, size = %size, "Searching RNAcentral");

        let response = self
            .http
            .get(&self.config.search_url)
            .query(&[
                ("query", query.expression()),
                ("format", "json"),
                ("size", size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let parsed: SearchResponse = response.json().await?;
        let identifiers: Vec<String> = parsed.entries.into_iter().map(|e| e.id).collect();
        tracing::debug!(hits = identifiers.len(), "RNAcentral search finished");

        Ok(SearchHits {
            identifiers,
            reference_url: self.reference_url(query),
        })
    }

    async fn fetch_records(&self, identifiers: &[String]) -> Result<Vec<Value>, ToolError> {
        let mut records = Vec::with_capacity(identifiers.len());

        for id in identifiers {
            let url = self.record_url(id);
            let response = self.http.get(&url).query(&[("format", "json")]).send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!(identifier = %id, "RNAcentral record not found, skipping");
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ToolError::Api {
                    status: status.as_u16(),
                    message: body.chars().take(500).collect(),
                });
            }

            let record: Value = response.json().await?;
            records.push(enrich_record(record, id, &self.record_link(id))?);
        }

        tracing::debug!(
            requested = identifiers.len(),
            fetched = records.len(),
            "Fetched RNAcentral records"
        );
        Ok(records)
    }
}

/// `URS0000ABCD_9606` -> `URS0000ABCD/9606`; identifiers without a taxon
/// suffix map to the bare URS path.
fn record_path(identifier: &str) -> String {
    match identifier.split_once('_') {
        Some((urs, taxid)) if !taxid.is_empty() => format!(
            "{}/{}",
            urlencoding::encode(urs),
            urlencoding::encode(taxid)
        ),
        _ => urlencoding::encode(identifier.trim_end_matches('_')).into_owned(),
    }
}

/// Tag a record with the identifier it was fetched for and its portal link.
fn enrich_record(record: Value, identifier: &str, link: &str) -> Result<Value, ToolError> {
    match record {
        Value::Object(mut map) => {
            map.entry("rnacentral_id")
                .or_insert_with(|| Value::String(identifier.to_string()));
            map.entry("rnacentral_link")
                .or_insert_with(|| Value::String(link.to_string()));
            Ok(Value::Object(map))
        }
        other => Err(ToolError::MalformedResponse(format!(
            "expected a JSON object for {}, got {}",
            identifier,
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
