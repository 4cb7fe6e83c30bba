//! Session reports and the sinks that record them.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use delicia_core::config::NotionConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub initial_inquiry: String,
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn new(initial_inquiry: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            initial_inquiry: initial_inquiry.into(),
            summary: summary.into(),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("faltan NOTION_API_KEY o NOTION_DATABASE_ID")]
    MissingCredentials,
    #[error("{0}")]
    Api(String),
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn save(&self, report: &SessionReport) -> Result<(), ReportError>;
}

/// Notion property names a report is written into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportProperties {
    pub title: String,
    pub summary: String,
    pub date: String,
}

impl Default for ReportProperties {
    fn default() -> Self {
        Self {
            title: "Consulta".to_string(),
            summary: "Resumen".to_string(),
            date: "Fecha".to_string(),
        }
    }
}

/// Writes one page per report into a Notion database.
///
/// Credentials are optional at construction; a sink without them fails each save with
/// [`ReportError::MissingCredentials`] and never touches the network.
pub struct NotionReportSink {
    api_key: Option<SecretString>,
    database_id: Option<String>,
    base_url: String,
    api_version: String,
    properties: ReportProperties,
    client: reqwest::Client,
}

impl std::fmt::Debug for NotionReportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionReportSink")
            .field("has_api_key", &self.api_key.is_some())
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl NotionReportSink {
    pub fn from_config(config: &NotionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone().filter(|id| !id.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            properties: ReportProperties {
                title: config.title_property.clone(),
                summary: config.summary_property.clone(),
                date: config.date_property.clone(),
            },
            client,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<(&SecretString, &str)> {
        let api_key = self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty())?;
        let database_id = self.database_id.as_deref()?;
        Some((api_key, database_id))
    }

    pub fn page_payload(&self, database_id: &str, report: &SessionReport) -> Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.properties.title.clone(),
            json!({ "title": [{ "text": { "content": report.initial_inquiry } }] }),
        );
        properties.insert(
            self.properties.summary.clone(),
            json!({ "rich_text": [{ "text": { "content": report.summary } }] }),
        );
        properties.insert(
            self.properties.date.clone(),
            json!({
                "date": {
                    "start": report.recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                }
            }),
        );

        json!({
            "parent": { "database_id": database_id },
            "properties": Value::Object(properties),
        })
    }
}

#[async_trait]
impl ReportSink for NotionReportSink {
    async fn save(&self, report: &SessionReport) -> Result<(), ReportError> {
        let Some((api_key, database_id)) = self.credentials() else {
            tracing::warn!(
                event_name = "report.notion.unconfigured",
                "notion credentials missing; report not saved"
            );
            return Err(ReportError::MissingCredentials);
        };

        let response = self
            .client
            .post(format!("{}/v1/pages", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .header("Notion-Version", &self.api_version)
            .json(&self.page_payload(database_id, report))
            .send()
            .await
            .map_err(|error| {
                tracing::warn!(
                    event_name = "report.notion.failed",
                    error = %error,
                    "notion request failed"
                );
                ReportError::Api(error.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                event_name = "report.notion.failed",
                status = status.as_u16(),
                "notion rejected the report"
            );
            return Err(ReportError::Api(format!("HTTP {}: {detail}", status.as_u16())));
        }

        tracing::info!(event_name = "report.notion.saved", "session report saved to notion");
        Ok(())
    }
}

/// Keeps reports in memory so sessions can be exercised without Notion.
#[derive(Debug, Default)]
pub struct InMemoryReportSink {
    reports: Mutex<Vec<SessionReport>>,
    failure: Option<ReportError>,
}

impl InMemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every save fails with `error`.
    pub fn failing(error: ReportError) -> Self {
        Self { reports: Mutex::new(Vec::new()), failure: Some(error) }
    }

    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports.lock().map(|reports| reports.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReportSink for InMemoryReportSink {
    async fn save(&self, report: &SessionReport) -> Result<(), ReportError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.reports
            .lock()
            .map_err(|_| ReportError::Api("report store lock poisoned".to_string()))?
            .push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use delicia_core::config::AppConfig;

    use super::{
        InMemoryReportSink, NotionReportSink, ReportError, ReportSink, SessionReport,
    };

    fn report() -> SessionReport {
        SessionReport {
            initial_inquiry: "¿Tienen opciones vegetarianas?".to_string(),
            summary: "Preguntó por platos vegetarianos.".to_string(),
            recorded_at: Utc.with_ymd_and_hms(2026, 10, 19, 21, 30, 0).single().expect("date"),
        }
    }

    #[test]
    fn payload_uses_configured_property_names() {
        let mut config = AppConfig::default().notion;
        config.title_property = "Pregunta".to_string();
        let sink = NotionReportSink::from_config(&config).expect("sink");

        let payload = sink.page_payload("db-1", &report());

        assert_eq!(payload["parent"]["database_id"], "db-1");
        assert_eq!(
            payload["properties"]["Pregunta"]["title"][0]["text"]["content"],
            "¿Tienen opciones vegetarianas?"
        );
        assert_eq!(
            payload["properties"]["Resumen"]["rich_text"][0]["text"]["content"],
            "Preguntó por platos vegetarianos."
        );
        assert_eq!(payload["properties"]["Fecha"]["date"]["start"], "2026-10-19T21:30:00Z");
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let sink = NotionReportSink::from_config(&AppConfig::default().notion).expect("sink");

        assert!(!sink.has_credentials());
        assert_eq!(sink.save(&report()).await, Err(ReportError::MissingCredentials));
    }

    #[tokio::test]
    async fn blank_database_id_counts_as_missing() {
        let mut config = AppConfig::default().notion;
        config.api_key = Some("secret_abc".to_string().into());
        config.database_id = Some("  ".to_string());
        let sink = NotionReportSink::from_config(&config).expect("sink");

        assert!(!sink.has_credentials());
        assert!(!format!("{sink:?}").contains("secret_abc"));
    }

    #[tokio::test]
    async fn in_memory_sink_records_and_can_fail() {
        let sink = InMemoryReportSink::new();
        sink.save(&report()).await.expect("save");
        assert_eq!(sink.reports(), vec![report()]);

        let failing = InMemoryReportSink::failing(ReportError::Api("HTTP 401".to_string()));
        assert!(failing.save(&report()).await.is_err());
        assert!(failing.reports().is_empty());
    }
}
