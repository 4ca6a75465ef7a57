//! Document-database message store over the Firestore REST API.
//!
//! Messages live under `artifacts/{app_id}/users/{user_id}/messages`, one
//! document per message, with a server-assigned timestamp so ordering does
//! not depend on client clocks.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthSession;

use super::{MessageStore, SenderTag, StoreError, StoredMessage};

/// Configuration for the document database.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub project_id: String,
    /// Per-installation namespace under which user data is scoped.
    pub app_id: String,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            api_key: String::new(),
            project_id: String::new(),
            app_id: "default-app-id".to_string(),
        }
    }
}

impl FirestoreConfig {
    /// Create a new FirestoreConfig with custom base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create a new FirestoreConfig with custom API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Create a new FirestoreConfig with custom project ID.
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Create a new FirestoreConfig with custom app ID.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }
}

/// Rows returned by `documents:runQuery`. Rows without a document (e.g. the
/// trailing read-time marker) carry no fields.
#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    fields: DocumentFields,
}

#[derive(Debug, Deserialize)]
struct DocumentFields {
    text: StringField,
    sender: StringField,
    /// Absent while the server-timestamp transform is still pending.
    timestamp: Option<TimestampField>,
}

#[derive(Debug, Deserialize)]
struct StringField {
    #[serde(rename = "stringValue")]
    string_value: String,
}

#[derive(Debug, Deserialize)]
struct TimestampField {
    #[serde(rename = "timestampValue")]
    timestamp_value: DateTime<Utc>,
}

fn parse_rows(rows: Vec<QueryRow>) -> Vec<StoredMessage> {
    rows.into_iter()
        .filter_map(|row| {
            let fields = row.document?.fields;
            let timestamp = fields.timestamp?.timestamp_value;
            let sender = SenderTag::parse(&fields.sender.string_value)?;
            Some(StoredMessage {
                text: fields.text.string_value,
                sender,
                timestamp,
            })
        })
        .collect()
}

fn write_body(doc_name: &str, text: &str, sender: SenderTag) -> Value {
    json!({
        "writes": [{
            "update": {
                "name": doc_name,
                "fields": {
                    "text": { "stringValue": text },
                    "sender": { "stringValue": sender.as_str() },
                },
            },
            "updateTransforms": [{
                "fieldPath": "timestamp",
                "setToServerValue": "REQUEST_TIME",
            }],
        }],
    })
}

/// Message store backed by the document database, scoped to one signed-in
/// user.
pub struct FirestoreStore {
    config: FirestoreConfig,
    client: Client,
    user_id: String,
    id_token: String,
    snapshot_tx: watch::Sender<Vec<StoredMessage>>,
}

impl FirestoreStore {
    /// Create a store scoped to the given session's user.
    pub fn new(config: FirestoreConfig, session: &AuthSession) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            config,
            client: Client::new(),
            user_id: session.user_id.clone(),
            id_token: session.id_token.clone(),
            snapshot_tx,
        }
    }

    /// Full resource name of the per-user scope document.
    fn scope_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents/artifacts/{}/users/{}",
            self.config.project_id, self.config.app_id, self.user_id
        )
    }

    async fn run_query(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let url = format!(
            "{}/{}:runQuery?key={}",
            self.config.base_url,
            self.scope_path(),
            self.config.api_key
        );
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": "messages" }],
                "orderBy": [{ "field": { "fieldPath": "timestamp" } }],
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.id_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }

        let rows: Vec<QueryRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok(parse_rows(rows))
    }
}

impl MessageStore for FirestoreStore {
    async fn append(&self, text: &str, sender: SenderTag) -> Result<(), StoreError> {
        let url = format!(
            "{}/projects/{}/databases/(default)/documents:commit?key={}",
            self.config.base_url, self.config.project_id, self.config.api_key
        );
        let doc_name = format!("{}/messages/{}", self.scope_path(), Uuid::new_v4());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.id_token)
            .json(&write_body(&doc_name, text, sender))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }

        // The write landed; a failed re-read only delays the next snapshot.
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "failed to refresh history after append");
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        let snapshot = self.run_query().await?;
        self.snapshot_tx.send_replace(snapshot);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<StoredMessage>> {
        self.snapshot_tx.subscribe()
    }
}
