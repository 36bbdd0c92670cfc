//! HTTP client for the TNS bulk-report API.
//!
//! Reports are posted form-encoded to `api/bulk-report`; the TNS processes
//! them asynchronously, so the outcome is polled from
//! `api/bulk-report-reply`, which answers 404 until the report is processed.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::{ReportId, TnsError, TnsRegistry};
use crate::config::TnsConfig;

/// HTTP client for the Transient Name Server.
#[derive(Debug, Clone)]
pub struct TnsClient {
    config: TnsConfig,
    client: Client,
}

impl TnsClient {
    pub fn new(config: TnsConfig) -> Result<Self, TnsError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, TnsError> {
        Self::new(TnsConfig::from_env())
    }

    /// The TNS identifies bots by a marker in the user agent.
    fn user_agent(&self) -> String {
        format!(
            r#"tns_marker{{"tns_id": "{}", "type": "bot", "name": "{}"}}"#,
            self.config.bot_id, self.config.bot_name
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<reqwest::Response, TnsError> {
        let response = self
            .client
            .post(self.url(path))
            .header(reqwest::header::USER_AGENT, self.user_agent())
            .form(form)
            .send()
            .await?;
        Ok(response)
    }

    /// Decode a JSON body, turning a 400 into a rejection and any other
    /// failure status into a transport error.
    async fn read_json(&self, response: reqwest::Response) -> Result<Value, TnsError> {
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(TnsError::Rejected(rejection_text(&body)));
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TnsRegistry for TnsClient {
    async fn send_report(&self, payload: &str) -> Result<ReportId, TnsError> {
        tracing::info!("Sending report to TNS at {}", self.config.base_url);
        let response = self
            .post(
                "api/bulk-report",
                &[("api_key", self.config.api_key.as_str()), ("data", payload)],
            )
            .await?;
        let body = self.read_json(response).await?;

        match &body["data"]["report_id"] {
            Value::String(id) if !id.is_empty() => Ok(id.clone()),
            Value::Number(id) => Ok(id.to_string()),
            _ => Err(TnsError::Rejected(
                "TNS response did not include a report id".to_string(),
            )),
        }
    }

    async fn get_report_reply(&self, report_id: &str) -> Result<Option<String>, TnsError> {
        let attempts = self.config.reply_attempts.max(1);
        for attempt in 1..=attempts {
            let response = self
                .post(
                    "api/bulk-report-reply",
                    &[
                        ("api_key", self.config.api_key.as_str()),
                        ("report_id", report_id),
                    ],
                )
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                tracing::debug!(
                    "Report {} not processed yet (attempt {}/{})",
                    report_id,
                    attempt,
                    attempts
                );
                if attempt < attempts {
                    tokio::time::sleep(self.config.reply_interval).await;
                }
                continue;
            }

            let body = self.read_json(response).await?;
            let name = designation_from_feedback(&body["data"]["feedback"]);
            match &name {
                Some(name) => tracing::info!("Report {} earned designation {}", report_id, name),
                None => tracing::info!("Report {} processed without a designation", report_id),
            }
            return Ok(name);
        }

        tracing::warn!(
            "Report {} still unprocessed after {} attempts",
            report_id,
            attempts
        );
        Ok(None)
    }
}

/// Pull the designation out of a bulk-report reply.
///
/// Feedback entries are keyed by TNS message code: `100` (object inserted)
/// and `101` (object already exists) carry `objname` without its prefix,
/// `121` (prefix changed) carries the full `new_object_name`. The last
/// matching entry wins.
fn designation_from_feedback(feedback: &Value) -> Option<String> {
    let mut entries: Vec<&Value> = Vec::new();
    collect_entries(&feedback["at_report"], &mut entries);
    if let Some(reports) = feedback["classification_report"].as_array() {
        for report in reports {
            collect_entries(&report["classification_messages"], &mut entries);
        }
    }

    let mut name = None;
    for entry in entries {
        if let Some(objname) = entry["100"]["objname"].as_str() {
            name = Some(format!("AT{}", objname));
        } else if let Some(objname) = entry["101"]["objname"].as_str() {
            name = Some(format!("AT{}", objname));
        } else if let Some(new_name) = entry["121"]["new_object_name"].as_str() {
            name = Some(new_name.to_string());
        }
    }
    name.filter(|n| !n.trim().is_empty())
}

fn collect_entries<'a>(section: &'a Value, entries: &mut Vec<&'a Value>) {
    match section {
        Value::Array(items) => entries.extend(items.iter()),
        Value::Object(_) => entries.push(section),
        _ => {}
    }
}

/// Best-effort human readable text for a rejected request.
fn rejection_text(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let message = json["id_message"].as_str().unwrap_or("Bad request");
    match &json["data"]["feedback"] {
        Value::Null => message.to_string(),
        feedback => format!("{}: {}", message, feedback),
    }
}
