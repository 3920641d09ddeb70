//! Client for the JSOC `jsoc_fetch` export service.
//!
//! An export is requested with `op=exp_request`. If JSOC cannot serve it
//! immediately it hands back a request id, which is polled with
//! `op=exp_status` until the files are staged.

use crate::config::toml_config::JsocSettings;
use crate::domain::model::ObservationTime;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const FETCH_PATH: &str = "/cgi-bin/ajax/jsoc_fetch";

/// Export status codes that mean "not ready yet".
const PENDING_STATUSES: [i64; 3] = [1, 2, 6];

#[derive(Debug, Clone, Deserialize)]
pub struct ExportResponse {
    pub status: i64,
    #[serde(default)]
    pub requestid: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub data: Vec<ExportFile>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportFile {
    #[serde(default)]
    pub record: String,
    pub filename: String,
}

/// `hmi.sharp_cea_720s[1234][2011.12.14_20:58:00_TAI]`
pub fn build_query(series: &str, harp: &str, time: &ObservationTime) -> String {
    format!("{}[{}][{}]", series, harp, time.query_stamp())
}

pub struct JsocClient {
    client: Client,
    settings: JsocSettings,
}

impl JsocClient {
    pub fn new(settings: JsocSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;
        Ok(Self { client, settings })
    }

    fn fetch_url(&self) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), FETCH_PATH)
    }

    /// Requests an export of `query{segment}` and waits for it to be staged.
    /// Returns one download URL per exported file.
    pub async fn export(&self, query: &str, segment: &str) -> Result<Vec<String>> {
        let dataset = format!("{}{{{}}}", query, segment);
        tracing::info!("Sending export request for {}", dataset);

        let response: ExportResponse = self
            .client
            .get(self.fetch_url())
            .query(&[
                ("op", "exp_request"),
                ("ds", dataset.as_str()),
                ("notify", self.settings.email.as_str()),
                ("method", "url"),
                ("protocol", self.settings.protocol.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let finished = self.wait_for_export(response).await?;
        self.file_urls(&finished)
    }

    async fn wait_for_export(&self, mut response: ExportResponse) -> Result<ExportResponse> {
        let mut attempts = 0;

        loop {
            if response.status == 0 {
                return Ok(response);
            }
            if !PENDING_STATUSES.contains(&response.status) {
                return Err(EtlError::ExportError {
                    status: response.status,
                    message: response
                        .error
                        .unwrap_or_else(|| "export request was rejected".to_string()),
                });
            }

            let request_id = response.requestid.clone().ok_or_else(|| EtlError::ExportError {
                status: response.status,
                message: "pending export has no request id".to_string(),
            })?;

            attempts += 1;
            if attempts > self.settings.max_poll_attempts {
                return Err(EtlError::ExportError {
                    status: response.status,
                    message: format!(
                        "request {} still pending after {} polls",
                        request_id, self.settings.max_poll_attempts
                    ),
                });
            }

            tracing::debug!(
                "Export {} pending (status {}), poll {}/{}",
                request_id,
                response.status,
                attempts,
                self.settings.max_poll_attempts
            );
            tokio::time::sleep(Duration::from_secs(self.settings.poll_interval_seconds)).await;

            response = self
                .client
                .get(self.fetch_url())
                .query(&[
                    ("op", "exp_status"),
                    ("requestid", request_id.as_str()),
                    ("format", "json"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
        }
    }

    fn file_urls(&self, response: &ExportResponse) -> Result<Vec<String>> {
        if response.data.is_empty() {
            return Err(EtlError::ExportError {
                status: response.status,
                message: "missing export URL".to_string(),
            });
        }

        let base = self.settings.base_url.trim_end_matches('/');
        let dir = response.dir.as_deref().unwrap_or("").trim_end_matches('/');

        Ok(response
            .data
            .iter()
            .map(|file| {
                if file.filename.starts_with("http://") || file.filename.starts_with("https://") {
                    file.filename.clone()
                } else {
                    format!("{}{}/{}", base, dir, file.filename.trim_start_matches('/'))
                }
            })
            .collect())
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("Downloading {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use httpmock::prelude::*;

    fn settings(base_url: String) -> JsocSettings {
        JsocSettings {
            base_url,
            email: "someone@example.org".to_string(),
            poll_interval_seconds: 0,
            max_poll_attempts: 3,
            ..JsocSettings::default()
        }
    }

    #[test]
    fn test_build_query() {
        let time = ObservationTime(
            NaiveDate::from_ymd_opt(2011, 12, 14)
                .unwrap()
                .and_hms_opt(20, 58, 0)
                .unwrap(),
        );
        assert_eq!(
            build_query("hmi.sharp_cea_720s", "1234", &time),
            "hmi.sharp_cea_720s[1234][2011.12.14_20:58:00_TAI]"
        );
    }

    #[tokio::test]
    async fn test_immediate_export() {
        let server = MockServer::start();
        let request_mock = server.mock(|when, then| {
            when.method(GET)
                .path(FETCH_PATH)
                .query_param("op", "exp_request")
                .query_param("ds", "hmi.sharp_cea_720s[1][2011.01.01_00:00:00_TAI]{magnetogram}")
                .query_param("notify", "someone@example.org")
                .query_param("method", "url");
            then.status(200).json_body(serde_json::json!({
                "status": 0,
                "dir": "/SUM1/D100/S00000",
                "data": [{"record": "r", "filename": "file.magnetogram.fits"}]
            }));
        });

        let client = JsocClient::new(settings(server.base_url())).unwrap();
        let urls = client
            .export("hmi.sharp_cea_720s[1][2011.01.01_00:00:00_TAI]", "magnetogram")
            .await
            .unwrap();

        request_mock.assert();
        assert_eq!(
            urls,
            vec![server.url("/SUM1/D100/S00000/file.magnetogram.fits")]
        );
    }

    #[tokio::test]
    async fn test_rejected_export_carries_server_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(FETCH_PATH).query_param("op", "exp_request");
            then.status(200).json_body(serde_json::json!({
                "status": 4,
                "error": "Cannot export series with no segments"
            }));
        });

        let client = JsocClient::new(settings(server.base_url())).unwrap();
        let err = client.export("bad[1][x]", "magnetogram").await.unwrap_err();

        match err {
            EtlError::ExportError { status, message } => {
                assert_eq!(status, 4);
                assert!(message.contains("no segments"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_pending_export_gives_up_after_max_polls() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(FETCH_PATH).query_param("op", "exp_request");
            then.status(200)
                .json_body(serde_json::json!({"status": 2, "requestid": "JSOC_1"}));
        });
        let status_mock = server.mock(|when, then| {
            when.method(GET)
                .path(FETCH_PATH)
                .query_param("op", "exp_status")
                .query_param("requestid", "JSOC_1");
            then.status(200)
                .json_body(serde_json::json!({"status": 1, "requestid": "JSOC_1"}));
        });

        let client = JsocClient::new(settings(server.base_url())).unwrap();
        let err = client.export("q", "magnetogram").await.unwrap_err();

        status_mock.assert_hits(3);
        assert!(matches!(err, EtlError::ExportError { status: 1, .. }));
    }

    #[tokio::test]
    async fn test_finished_export_without_files_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(FETCH_PATH);
            then.status(200)
                .json_body(serde_json::json!({"status": 0, "dir": "/x", "data": []}));
        });

        let client = JsocClient::new(settings(server.base_url())).unwrap();
        let err = client.export("q", "magnetogram").await.unwrap_err();
        assert!(err.to_string().contains("missing export URL"));
    }

    #[tokio::test]
    async fn test_absolute_filenames_are_used_as_is() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(FETCH_PATH);
            then.status(200).json_body(serde_json::json!({
                "status": 0,
                "dir": "/SUM1/D100",
                "data": [
                    {"record": "a", "filename": "https://mirror.example.org/a.fits"},
                    {"record": "b", "filename": "/b.fits"}
                ]
            }));
        });

        let client = JsocClient::new(settings(server.base_url())).unwrap();
        let urls = client.export("q", "magnetogram").await.unwrap();

        assert_eq!(
            urls,
            vec![
                "https://mirror.example.org/a.fits".to_string(),
                server.url("/SUM1/D100/b.fits")
            ]
        );
    }
}
