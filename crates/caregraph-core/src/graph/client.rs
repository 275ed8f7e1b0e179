//! Neo4j HTTP Query API client
//!
//! Each call is one independent `POST /db/{database}/query/v2` request;
//! the shared `reqwest` client pools the connections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{GraphEngine, GraphRecord, GraphValue};
use crate::config::{Credentials, GraphConfig};
use crate::error::{Error, Result};

/// Media type selecting typed JSON values in responses
const TYPED_JSON: &str = "application/vnd.neo4j.query";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    fields: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Graph engine backed by a Neo4j server
#[derive(Clone)]
pub struct Neo4jClient {
    http_client: HttpClient,
    query_url: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for Neo4jClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jClient")
            .field("query_url", &self.query_url)
            .field("username", &self.username)
            .finish()
    }
}

impl Neo4jClient {
    /// Create a client for the given endpoint and database
    pub fn new(
        base_uri: &str,
        database: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            query_url: format!("{}/db/{}/query/v2", base_uri.trim_end_matches('/'), database),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create a client from configuration and resolved credentials
    pub fn from_config(config: &GraphConfig, credentials: &Credentials) -> Result<Self> {
        let uri = config.effective_uri(credentials)?;
        Self::new(
            &uri,
            &config.database,
            credentials.neo4j_username.clone(),
            credentials.neo4j_password.clone(),
            config.timeout_secs,
        )
    }

    /// The full query endpoint URL
    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

#[async_trait]
impl GraphEngine for Neo4jClient {
    async fn run(&self, query: &str) -> Result<Vec<GraphRecord>> {
        debug!(query = %query, "Executing Cypher query");

        let response = self
            .http_client
            .post(&self.query_url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, TYPED_JSON)
            .json(&json!({ "statement": query }))
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::NetworkError)?;

        match status.as_u16() {
            401 | 403 => Err(Error::GraphDatabase(
                "Authentication failed. Check NEO4J_USERNAME and NEO4J_PASSWORD.".to_string(),
            )),
            404 => Err(Error::GraphDatabase(format!(
                "Query endpoint not found: {}",
                self.query_url
            ))),
            _ => parse_query_response(&body),
        }
    }
}

/// Decode a Query API response body into records
///
/// Server-reported errors take precedence over any partial data.
pub fn parse_query_response(body: &str) -> Result<Vec<GraphRecord>> {
    let response: QueryResponse = serde_json::from_str(body).map_err(|e| {
        Error::GraphDatabase(format!("Unexpected response from graph database: {}", e))
    })?;

    if let Some(error) = response.errors.first() {
        return Err(Error::GraphDatabase(if error.code.is_empty() {
            error.message.clone()
        } else {
            format!("{}: {}", error.code, error.message)
        }));
    }

    let Some(data) = response.data else {
        return Ok(Vec::new());
    };

    Ok(data
        .values
        .iter()
        .map(|row| {
            data.fields
                .iter()
                .zip(row)
                .map(|(field, value)| (field.clone(), GraphValue::from_typed_json(value)))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url() {
        let client = Neo4jClient::new("http://localhost:7474/", "neo4j", "neo4j", "pw", 5).unwrap();
        assert_eq!(client.query_url(), "http://localhost:7474/db/neo4j/query/v2");
        assert!(!format!("{:?}", client).contains("pw"));
    }

    #[test]
    fn test_parse_rows() {
        let body = r#"{
            "data": {
                "fields": ["name", "admitted"],
                "values": [
                    [{"$type": "String", "_value": "John Doe"}, {"$type": "Date", "_value": "2024-01-31"}],
                    [{"$type": "String", "_value": "Jane Roe"}, {"$type": "Null", "_value": null}]
                ]
            },
            "bookmarks": ["FB:kcwQ"]
        }"#;
        let records = parse_query_response(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["name", "admitted"]);
        assert_eq!(records[0].get("name").and_then(GraphValue::as_str), Some("John Doe"));
        assert!(records[0].get("admitted").is_some_and(GraphValue::is_temporal));
        assert_eq!(records[1].get("admitted"), Some(&GraphValue::Null));
    }

    #[test]
    fn test_parse_empty_result() {
        let body = r#"{"data": {"fields": ["name"], "values": []}}"#;
        assert!(parse_query_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_server_error() {
        let body = r#"{"errors": [{"code": "Neo.ClientError.Statement.SyntaxError",
                                   "message": "Invalid input 'RETRUN'"}]}"#;
        let err = parse_query_response(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Graph database error: Neo.ClientError.Statement.SyntaxError: Invalid input 'RETRUN'"
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_query_response("<html>bad gateway</html>"),
            Err(Error::GraphDatabase(_))
        ));
    }
}
