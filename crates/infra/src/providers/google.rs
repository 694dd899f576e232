//! Google Calendar adapter (push + poll)

use std::collections::HashMap;

use async_trait::async_trait;
use calsync_core::mapping::{google_to_unified, LOCAL_ID_PROPERTY, NOTES_PROPERTY};
use calsync_core::ProviderAdapter;
use calsync_domain::{
    CalSyncError, GoogleConfig, GoogleEventItem, OutboundEvent, ProviderCapabilities,
    ProviderKind, RawProviderItem, RemoteWrite, Result, TokenGrant, UnifiedEvent,
    WebhookRegistration, WebhookRequest,
};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::endpoint;
use crate::errors::conversions::status_error;
use crate::http::client::read_json;
use crate::http::HttpClient;

const PAGE_SIZE: &str = "250";

/// Google Calendar v3 adapter
pub struct GoogleCalendarAdapter {
    http: HttpClient,
    config: GoogleConfig,
}

impl GoogleCalendarAdapter {
    pub fn new(config: GoogleConfig) -> Result<Self> {
        Ok(Self::with_client(config, HttpClient::new()?))
    }

    pub fn with_client(config: GoogleConfig, http: HttpClient) -> Self {
        Self { http, config }
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        since: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<GoogleEventsPage> {
        let url = endpoint(&self.config.api_base, &["calendars", calendar_id, "events"])?;
        let mut query = vec![
            ("updatedMin", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("singleEvents", "true".to_string()),
            ("showDeleted", "false".to_string()),
            ("orderBy", "updated".to_string()),
            ("maxResults", PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let request = self.http.request(Method::GET, url).bearer_auth(access_token).query(&query);
        self.http.send_json(request).await
    }

    async fn write_event(
        &self,
        method: Method,
        access_token: &str,
        segments: &[&str],
        event: &OutboundEvent,
    ) -> Result<RemoteWrite> {
        let url = endpoint(&self.config.api_base, segments)?;
        let request = self
            .http
            .request(method, url)
            .bearer_auth(access_token)
            .json(&GoogleEventBody::from(event));
        let written: GoogleEventItem = self.http.send_json(request).await?;

        let remote_modified_at = written
            .updated
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map_or_else(Utc::now, |value| value.with_timezone(&Utc));

        Ok(RemoteWrite { external_id: written.id, remote_modified_at })
    }
}

#[async_trait]
impl ProviderAdapter for GoogleCalendarAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::PUSH_AND_POLL
    }

    #[instrument(skip(self, access_token), fields(provider = "google"))]
    async fn list_changes(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawProviderItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .fetch_page(access_token, external_calendar_id, since, page_token.as_deref())
                .await?;

            for item in page.items {
                if item.is_cancelled() {
                    debug!(external_id = %item.id, "skipping cancelled google event");
                    continue;
                }
                items.push(RawProviderItem::Google(item));
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = items.len(), "google changes listed");
        Ok(items)
    }

    fn to_unified_event(&self, item: &RawProviderItem) -> Result<UnifiedEvent> {
        match item {
            RawProviderItem::Google(event) => google_to_unified(event, Utc::now()),
            RawProviderItem::Notion(page) => Err(CalSyncError::InvalidInput(format!(
                "notion page {} handed to the google adapter",
                page.id
            ))),
        }
    }

    #[instrument(skip_all, fields(provider = "google"))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let request = self.http.request(Method::POST, &self.config.token_endpoint).form(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);
        let response = self.http.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(token_error(status, &body));
        }

        let grant: GoogleTokenResponse = read_json(response).await?;
        info!("google access token refreshed");
        Ok(TokenGrant {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_in_secs: grant.expires_in,
        })
    }

    #[instrument(skip(self, access_token, event), fields(provider = "google", local_id = %event.local_id))]
    async fn create_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite> {
        self.write_event(
            Method::POST,
            access_token,
            &["calendars", external_calendar_id, "events"],
            event,
        )
        .await
    }

    #[instrument(skip(self, access_token, event), fields(provider = "google", local_id = %event.local_id))]
    async fn update_event(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        external_id: &str,
        event: &OutboundEvent,
    ) -> Result<RemoteWrite> {
        self.write_event(
            Method::PATCH,
            access_token,
            &["calendars", external_calendar_id, "events", external_id],
            event,
        )
        .await
    }

    #[instrument(
        skip(self, access_token, request),
        fields(provider = "google", channel_id = %request.channel_id)
    )]
    async fn register_webhook(
        &self,
        access_token: &str,
        external_calendar_id: &str,
        request: &WebhookRequest,
    ) -> Result<WebhookRegistration> {
        let url = endpoint(
            &self.config.api_base,
            &["calendars", external_calendar_id, "events", "watch"],
        )?;
        let body = json!({
            "id": request.channel_id,
            "type": "web_hook",
            "address": request.callback_url,
            "token": request.channel_token,
            "params": { "ttl": request.ttl.as_secs().to_string() },
        });

        let call = self.http.request(Method::POST, url).bearer_auth(access_token).json(&body);
        let channel: GoogleChannel = self.http.send_json(call).await?;

        let fallback_expiry = Utc::now()
            + Duration::from_std(request.ttl).unwrap_or_else(|_| Duration::seconds(0));
        let expires_at = channel
            .expiration
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(fallback_expiry);

        info!(expires_at = %expires_at, "google push channel opened");
        Ok(WebhookRegistration {
            channel_id: channel.id,
            resource_id: channel.resource_id,
            expires_at,
        })
    }

    #[instrument(skip(self, access_token), fields(provider = "google"))]
    async fn unregister_webhook(
        &self,
        access_token: &str,
        channel_id: &str,
        resource_id: Option<&str>,
    ) -> Result<()> {
        let url = endpoint(&self.config.api_base, &["channels", "stop"])?;
        let body = json!({ "id": channel_id, "resourceId": resource_id });

        let call = self.http.request(Method::POST, url).bearer_auth(access_token).json(&body);
        let response = self.http.send(call).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, Some(&body)));
        }

        info!("google push channel stopped");
        Ok(())
    }
}

/// `invalid_grant` means the user revoked access or the grant expired.
fn token_error(status: reqwest::StatusCode, body: &str) -> CalSyncError {
    let error = serde_json::from_str::<GoogleOAuthError>(body).ok();
    match error {
        Some(err) if err.error == "invalid_grant" => CalSyncError::TokenRevoked(format!(
            "google refresh token rejected: {}",
            err.error_description.unwrap_or(err.error)
        )),
        _ => status_error(status, Some(body)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventsPage {
    #[serde(default)]
    items: Vec<GoogleEventItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleOAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleChannel {
    id: String,
    #[serde(default)]
    resource_id: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventBody {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: GoogleBoundary,
    end: GoogleBoundary,
    extended_properties: GoogleBodyProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBoundary {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct GoogleBodyProperties {
    private: HashMap<String, String>,
}

impl From<&OutboundEvent> for GoogleEventBody {
    fn from(event: &OutboundEvent) -> Self {
        let (start, end) = if event.all_day {
            let start_date = event.start.date_naive();
            let end_date = exclusive_end_date(start_date, event.end.date_naive());
            (GoogleBoundary::date(start_date), GoogleBoundary::date(end_date))
        } else {
            (GoogleBoundary::timed(event.start), GoogleBoundary::timed(event.end))
        };

        let mut private = HashMap::new();
        private.insert(LOCAL_ID_PROPERTY.to_string(), event.local_id.clone());
        if let Some(notes) = &event.notes {
            private.insert(NOTES_PROPERTY.to_string(), notes.clone());
        }

        Self {
            summary: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start,
            end,
            extended_properties: GoogleBodyProperties { private },
        }
    }
}

impl GoogleBoundary {
    fn timed(at: DateTime<Utc>) -> Self {
        Self { date_time: Some(at.to_rfc3339_opts(SecondsFormat::Secs, true)), date: None }
    }

    fn date(day: NaiveDate) -> Self {
        Self { date_time: None, date: Some(day.format("%Y-%m-%d").to_string()) }
    }
}

/// Google all-day ends are exclusive and must be after the start date.
fn exclusive_end_date(start: NaiveDate, end: NaiveDate) -> NaiveDate {
    if end > start {
        end
    } else {
        start.succ_opt().unwrap_or(start)
    }
}
