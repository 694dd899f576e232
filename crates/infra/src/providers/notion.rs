//! Notion database adapter (poll only)
//!
//! Notion access tokens do not expire and there is no push channel, so only
//! listing and outbound writes are implemented. Property names are resolved
//! against the database schema with the same candidate lists the inbound
//! mapper uses.

use std::collections::HashMap;

use async_trait::async_trait;
use calsync_core::mapping::{notion_to_unified, NOTION_FIELDS};
use calsync_core::{unsupported, ProviderAdapter};
use calsync_domain::{
    CalSyncError, NotionConfig, NotionPage, OutboundEvent, ProviderCapabilities, ProviderKind,
    RawProviderItem, RemoteWrite, Result, TokenGrant, UnifiedEvent,
};
use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use super::endpoint;
use crate::errors::conversions::status_error;
use crate::http::client::read_json;
use crate::http::HttpClient;

const PAGE_SIZE: u32 = 100;

/// Notion database adapter
pub struct NotionDatabaseAdapter {
    http: HttpClient,
    config: NotionConfig,
}

impl NotionDatabaseAdapter {
    pub fn new(config: NotionConfig) -> Result<Self> {
        Ok(Self::with_client(config, HttpClient::new()?))
    }

    pub fn with_client(config: NotionConfig, http: HttpClient) -> Self {
        Self { http, config }
    }

    fn request(&self, method: Method, segments: &[&str], token: &str) -> Result<RequestBuilder> {
        let url = endpoint(&self.config.api_base, segments)?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header("Notion-Version", &self.config.notion_version))
    }

    /// Send and decode; a 401 means the integration was removed from the
    /// workspace. `repeatable` marks read-only `POST`s that may be retried.
    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder, repeatable: bool) -> Result<T> {
        let response = if repeatable {
            self.http.send_repeatable(builder).await?
        } else {
            self.http.send(builder).await?
        };
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(CalSyncError::TokenRevoked(format!("notion rejected the token: {}", body.trim())));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, Some(&body)));
        }
        read_json(response).await
    }

    async fn schema(&self, token: &str, database_id: &str) -> Result<NotionSchema> {
        let database: NotionDatabase =
            self.call(self.request(Method::GET, &["databases", database_id], token)?, false).await?;
        NotionSchema::resolve(&database)
    }

    async fn write_page(
        &self,
        builder: RequestBuilder,
        body: Value,
    ) -> Result<RemoteWrite> {
        let page: NotionPage = self.call(builder.json(&body), false).await?;
        let remote_modified_at = page
            .last_edited_time
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map_or_else(Utc::now, |value| value.with_timezone(&Utc));
        Ok(RemoteWrite { external_id: page.id, remote_modified_at })
    }
}

#[async_trait]
impl ProviderAdapter for NotionDatabaseAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Notion
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::POLL_ONLY
    }

    #[instrument(skip(self, access_token), fields(provider = "notion"))]
    async fn list_changes(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawProviderItem>> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": {
                    "timestamp": "last_edited_time",
                    "last_edited_time": {
                        "on_or_after": query_floor(since).to_rfc3339_opts(SecondsFormat::Millis, true)
                    }
                },
                "sorts": [{ "timestamp": "last_edited_time", "direction": "ascending" }],
                "page_size": PAGE_SIZE,
            });
            if let Some(start) = &cursor {
                body["start_cursor"] = Value::String(start.clone());
            }

            let request = self
                .request(Method::POST, &["databases", external_calendar_id, "query"], access_token)?
                .json(&body);
            let result: NotionQueryResult = self.call(request, true).await?;

            for page in result.results {
                if page.archived {
                    debug!(external_id = %page.id, "skipping archived notion page");
                    continue;
                }
                pages.push(RawProviderItem::Notion(page));
            }

            match result.next_cursor {
                Some(next) if result.has_more => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = pages.len(), "notion changes listed");
        Ok(pages)
    }

    fn to_unified_event(&self, item: &RawProviderItem) -> Result<UnifiedEvent> {
        match item {
            RawProviderItem::Notion(page) => notion_to_unified(page, Utc::now()),
            RawProviderItem::Google(event) => Err(CalSyncError::InvalidInput(format!(
                "google event {} handed to the notion adapter",
                event.id
            ))),
        }
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenGrant> {
        Err(unsupported(ProviderKind::Notion, "token refresh"))
    }

    #[instrument(skip(self, access_token, event), fields(provider = "notion", local_id = %event.local_id))]
    async fn create_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite> {
        let schema = self.schema(access_token, external_calendar_id).await?;
        let body = json!({
            "parent": { "database_id": external_calendar_id },
            "properties": schema.properties(event),
        });
        self.write_page(self.request(Method::POST, &["pages"], access_token)?, body).await
    }

    #[instrument(skip(self, access_token, event), fields(provider = "notion", local_id = %event.local_id))]
    async fn update_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        external_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite> {
        let schema = self.schema(access_token, external_calendar_id).await?;
        let body = json!({ "properties": schema.properties(event) });
        self.write_page(self.request(Method::PATCH, &["pages", external_id], access_token)?, body)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct NotionQueryResult {
    #[serde(default)]
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionDatabase {
    #[serde(default)]
    properties: HashMap<String, NotionSchemaProperty>,
}

#[derive(Debug, Deserialize)]
struct NotionSchemaProperty {
    #[serde(rename = "type")]
    kind: String,
}

/// Concrete property names of one database.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NotionSchema {
    title: String,
    date: Option<String>,
    description: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    local_id: Option<String>,
}

impl NotionSchema {
    fn resolve(database: &NotionDatabase) -> Result<Self> {
        let of_kind = |candidates: &[&str], kind: &str| -> Option<String> {
            candidates
                .iter()
                .find(|name| database.properties.get(**name).is_some_and(|p| p.kind == kind))
                .map(|name| (*name).to_string())
        };

        let title = of_kind(NOTION_FIELDS.title, "title")
            .or_else(|| {
                database
                    .properties
                    .iter()
                    .find(|(_, property)| property.kind == "title")
                    .map(|(name, _)| name.clone())
            })
            .ok_or_else(|| {
                CalSyncError::InvalidInput("notion database has no title property".into())
            })?;

        Ok(Self {
            title,
            date: of_kind(NOTION_FIELDS.date, "date"),
            description: of_kind(NOTION_FIELDS.description, "rich_text"),
            location: of_kind(NOTION_FIELDS.location, "rich_text"),
            notes: of_kind(NOTION_FIELDS.notes, "rich_text"),
            local_id: of_kind(NOTION_FIELDS.local_id, "rich_text"),
        })
    }

    /// Page properties for an outbound event. Fields without a matching
    /// property are left out.
    fn properties(&self, event: &OutboundEvent) -> Value {
        let mut properties = Map::new();
        properties.insert(self.title.clone(), json!({ "title": rich_text(&event.title) }));

        if let Some(name) = &self.date {
            let (start, end) = if event.all_day {
                let start = event.start.date_naive();
                let end = event.end.date_naive();
                (start.to_string(), (end > start).then(|| end.to_string()))
            } else {
                (
                    event.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                    Some(event.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                )
            };
            properties.insert(name.clone(), json!({ "date": { "start": start, "end": end } }));
        }

        let text_fields = [
            (&self.description, event.description.as_deref()),
            (&self.location, event.location.as_deref()),
            (&self.notes, event.notes.as_deref()),
            (&self.local_id, Some(event.local_id.as_str())),
        ];
        for (name, value) in text_fields {
            if let Some(name) = name {
                properties
                    .insert(name.clone(), json!({ "rich_text": rich_text(value.unwrap_or("")) }));
            }
        }

        Value::Object(properties)
    }
}

/// `last_edited_time` is rounded down to the minute, so an edit made in the
/// same minute as the previous pass can carry a timestamp before `since`.
/// The query starts one whole minute earlier; replays are filtered by the
/// ledger. The epoch (first pass) is left alone.
fn query_floor(since: DateTime<Utc>) -> DateTime<Utc> {
    if since == DateTime::UNIX_EPOCH {
        return since;
    }
    let minute = Duration::minutes(1);
    since.duration_trunc(minute).unwrap_or(since) - minute
}

fn rich_text(content: &str) -> Value {
    if content.is_empty() {
        return json!([]);
    }
    json!([{ "type": "text", "text": { "content": content } }])
}
