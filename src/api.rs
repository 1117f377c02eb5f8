//! HTTP client for the Chemical Equipment Parameter Visualizer API.
//!
//! All four operations are stateless single-shot request/response calls with
//! no retries and no timeout; the session token is read from the injected
//! [`SessionStore`](crate::session::SessionStore) and never mutated here.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode, Url, multipart};
use serde::{Deserialize, Serialize};

use crate::errors::VisualizerError;
use crate::session::SessionStore;

#[derive(Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Averages {
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
}

/// One row of the uploaded CSV, echoed back by the analysis endpoint. Field
/// names match the CSV column headers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EquipmentRecord {
    #[serde(rename = "Equipment Name")]
    pub equipment_name: String,
    #[serde(rename = "Type")]
    pub equipment_type: String,
    #[serde(rename = "Flowrate")]
    pub flowrate: f64,
    #[serde(rename = "Pressure")]
    pub pressure: f64,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
}

/// Aggregated analysis of one uploaded CSV.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub id: i64,
    pub total_count: u64,
    pub averages: Averages,
    pub type_distribution: BTreeMap<String, u64>,
    pub data: Vec<EquipmentRecord>,
}

/// Per-upload summary embedded in each history entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub total_count: u64,
    pub avg_flowrate: f64,
    pub avg_pressure: f64,
    pub avg_temperature: f64,
    pub type_distribution: BTreeMap<String, u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub filename: String,
    pub upload_date: String,
    #[serde(default)]
    pub summary: Option<HistorySummary>,
}

/// Error body returned by the server on rejected requests.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    sessions: Arc<dyn SessionStore>,
}

impl ApiClient {
    /// Build a client for the given server base URL, e.g. `http://localhost:8000`.
    ///
    /// No request timeout is configured: a hung server leaves the triggering
    /// operation pending, matching the behavior of the other clients of this
    /// API.
    pub fn new(base_url: &str, sessions: Arc<dyn SessionStore>) -> Result<Self, VisualizerError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| VisualizerError::InvalidServerUrl {
            url: base_url.clone(),
        })?;
        let http = Client::builder()
            .user_agent(concat!("equipviz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VisualizerError::Request { source: e })?;
        Ok(Self {
            http,
            base_url,
            sessions,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn auth_header(&self) -> Result<String, VisualizerError> {
        self.sessions
            .load()
            .map(|session| format!("Token {}", session.token))
            .ok_or(VisualizerError::MissingToken)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, VisualizerError> {
        let response = self
            .http
            .post(self.endpoint("login/"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| VisualizerError::Request { source: e })?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| VisualizerError::Request { source: e })
        } else {
            Err(VisualizerError::InvalidCredentials)
        }
    }

    /// Upload a CSV file as multipart form data and return the server's
    /// analysis of it.
    pub async fn upload_csv(&self, path: &Path) -> Result<UploadResult, VisualizerError> {
        let auth = self.auth_header()?;
        let bytes =
            std::fs::read(path).map_err(|e| VisualizerError::CsvRead { source: e })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| VisualizerError::Request { source: e })?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("upload/"))
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VisualizerError::Request { source: e })?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| VisualizerError::Request { source: e })
        } else {
            Err(rejection(response).await)
        }
    }

    /// Fetch prior uploads, newest first, as ordered by the server.
    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>, VisualizerError> {
        let auth = self.auth_header()?;
        let response = self
            .http
            .get(self.endpoint("history/"))
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| VisualizerError::Request { source: e })?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| VisualizerError::Request { source: e })
        } else {
            Err(rejection(response).await)
        }
    }

    /// Download the generated PDF report for an upload.
    pub async fn download_report(&self, id: i64) -> Result<Vec<u8>, VisualizerError> {
        let auth = self.auth_header()?;
        let response = self
            .http
            .get(self.endpoint(&format!("report/{id}/")))
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| VisualizerError::Request { source: e })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VisualizerError::ReportNotFound { id });
        }
        if response.status().is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| VisualizerError::Request { source: e })?;
            Ok(bytes.to_vec())
        } else {
            Err(rejection(response).await)
        }
    }
}

/// Classify a non-2xx response into an error, pulling the human-readable
/// message out of the server's `{"error": ...}` body when present.
async fn rejection(response: Response) -> VisualizerError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VisualizerError::TokenRejected,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            VisualizerError::UploadRejected { message }
        }
        _ => VisualizerError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn rejects_invalid_base_url() {
        let result = ApiClient::new("not a url", Arc::new(MemorySessionStore::default()));
        assert!(matches!(
            result,
            Err(VisualizerError::InvalidServerUrl { .. })
        ));
    }

    #[test]
    fn normalizes_trailing_slash() {
        let client = ApiClient::new(
            "http://localhost:8000/",
            Arc::new(MemorySessionStore::default()),
        )
        .unwrap();
        assert_eq!(
            client.endpoint("report/7/"),
            "http://localhost:8000/api/report/7/"
        );
    }

    #[test]
    fn auth_header_requires_session() {
        let client = ApiClient::new(
            "http://localhost:8000",
            Arc::new(MemorySessionStore::default()),
        )
        .unwrap();
        assert!(matches!(
            client.auth_header(),
            Err(VisualizerError::MissingToken)
        ));

        let client = ApiClient::new(
            "http://localhost:8000",
            Arc::new(MemorySessionStore::logged_in("abc123", "alice")),
        )
        .unwrap();
        assert_eq!(client.auth_header().unwrap(), "Token abc123");
    }

    #[test]
    fn upload_result_parses_backend_shape() {
        let json = r#"{
            "id": 7,
            "total_count": 3,
            "averages": {"flowrate": 10.0, "pressure": 5.0, "temperature": 20.0},
            "type_distribution": {"Pump": 2, "Valve": 1},
            "data": [
                {"Equipment Name": "P-101", "Type": "Pump", "Flowrate": 12.0, "Pressure": 4.5, "Temperature": 21.0}
            ]
        }"#;
        let result: UploadResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.id, 7);
        assert_eq!(result.type_distribution["Pump"], 2);
        assert_eq!(result.data[0].equipment_name, "P-101");
        assert_eq!(result.data[0].equipment_type, "Pump");
    }

    #[test]
    fn history_entry_tolerates_missing_summary() {
        let json = r#"[{"id": 1, "filename": "equip.csv", "upload_date": "2024-01-15T10:30:00Z"}]"#;
        let entries: Vec<HistoryEntry> = serde_json::from_str(json).unwrap();
        assert!(entries[0].summary.is_none());
    }
}
