use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;
use crate::models::{DashboardSnapshot, Health, JobRecord, RunFilters, RuntimeSettings, SettingsUpdate};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// --- Backend trait ---

/// One call per remote resource. Implementations hold no state between
/// calls and never retry.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot, TransportError>;
    async fn fetch_jobs(&self) -> Result<Vec<JobRecord>, TransportError>;
    async fn fetch_settings(&self) -> Result<RuntimeSettings, TransportError>;
    async fn save_settings(&self, update: &SettingsUpdate)
        -> Result<RuntimeSettings, TransportError>;
    async fn start_run(&self, filters: &RunFilters) -> Result<(), TransportError>;
    async fn fetch_health(&self) -> Result<Health, TransportError>;
}

// --- HTTP implementation ---

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    jobs_limit: Option<u32>,
}

impl HttpBackend {
    pub fn new(base_url: &str, jobs_limit: Option<u32>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| TransportError::Network {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jobs_limit,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = self.url(path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|source| TransportError::Network { url: url.clone(), source })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status(),
                message: String::new(),
            });
        }

        decode(&url, response).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.url(path);
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Decode {
            url: url.clone(),
            detail: e.to_string(),
        })?;
        debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|source| TransportError::Network { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, message });
        }

        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, TransportError> {
    let bytes = response.bytes().await.map_err(|source| TransportError::Network {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot, TransportError> {
        self.get_json("/api/dashboard").await
    }

    async fn fetch_jobs(&self) -> Result<Vec<JobRecord>, TransportError> {
        match self.jobs_limit {
            Some(limit) => self.get_json(&format!("/api/jobs?limit={}", limit)).await,
            None => self.get_json("/api/jobs").await,
        }
    }

    async fn fetch_settings(&self) -> Result<RuntimeSettings, TransportError> {
        self.get_json("/api/settings").await
    }

    async fn save_settings(
        &self,
        update: &SettingsUpdate,
    ) -> Result<RuntimeSettings, TransportError> {
        let response = self.post_json("/api/settings", update).await?;
        decode(&self.url("/api/settings"), response).await
    }

    async fn start_run(&self, filters: &RunFilters) -> Result<(), TransportError> {
        // Body (if any) is not consumed; acceptance is the whole answer.
        self.post_json("/api/run", filters).await?;
        Ok(())
    }

    async fn fetch_health(&self) -> Result<Health, TransportError> {
        self.get_json("/health").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WriteOnly;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one canned response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                if request_complete(&raw) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else { return false };
        let head = text[..split].to_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    fn request_body(raw: &str) -> &str {
        raw.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
    }

    #[tokio::test]
    async fn test_fetch_dashboard_bypasses_cache() {
        let body = r#"{"total_applied":12,"applied_today":2,"failed_today":0,"skipped_today":1,"date":"2024-01-01"}"#;
        let (url, server) = serve_once("200 OK", body).await;
        let backend = HttpBackend::new(&url, None).unwrap();

        let snapshot = backend.fetch_dashboard().await.unwrap();
        assert_eq!(snapshot.total_applied, 12);
        assert_eq!(snapshot.date, "2024-01-01");

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("get /api/dashboard http/1.1"));
        assert!(raw.contains("cache-control: no-cache"));
        assert!(raw.contains("pragma: no-cache"));
    }

    #[tokio::test]
    async fn test_fetch_jobs_with_limit() {
        let body = r#"[{"id":1,"title":"Backend Engineer","company":"Acme","location":"Remote",
            "status":"applied","notes":"","applied_at":"2024-01-01T10:00:00Z"}]"#;
        let (url, server) = serve_once("200 OK", body).await;
        let backend = HttpBackend::new(&url, Some(50)).unwrap();

        let jobs = backend.fetch_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "Acme");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /api/jobs?limit=50 "));
    }

    #[tokio::test]
    async fn test_read_failure_carries_no_body() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let backend = HttpBackend::new(&url, None).unwrap();

        let err = backend.fetch_jobs().await.unwrap_err();
        match err {
            TransportError::Status { status, message } => {
                assert_eq!(status.as_u16(), 500);
                assert!(message.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_garbage_is_decode_error() {
        let (url, server) = serve_once("200 OK", "<html>").await;
        let backend = HttpBackend::new(&url, None).unwrap();

        let err = backend.fetch_settings().await.unwrap_err();
        assert!(matches!(err, TransportError::Decode { .. }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_save_settings_sends_json_and_hides_echoed_secrets() {
        let echo = r#"{"linkedin_email":"me@example.com","linkedin_password":"********",
            "openai_api_key":"","openai_model":"gpt-4o-mini","database_url":"sqlite:///./state.db"}"#;
        let (url, server) = serve_once("200 OK", echo).await;
        let backend = HttpBackend::new(&url, None).unwrap();

        let payload = SettingsUpdate {
            linkedin_email: Some("me@example.com".to_string()),
            linkedin_password: WriteOnly::new("pw"),
            openai_api_key: WriteOnly::default(),
            openai_model: Some("gpt-4o-mini".to_string()),
            database_url: None,
        };
        let saved = backend.save_settings(&payload).await.unwrap();
        assert!(saved.linkedin_password.is_blank());
        assert!(saved.linkedin_password.is_stored());
        assert!(!saved.openai_api_key.is_stored());

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/settings "));
        assert!(raw.to_lowercase().contains("content-type: application/json"));
        let sent: serde_json::Value = serde_json::from_str(request_body(&raw)).unwrap();
        assert_eq!(sent["linkedin_password"], "pw");
        assert!(sent["openai_api_key"].is_null());
        assert_eq!(sent["linkedin_email"], "me@example.com");
        assert!(sent["database_url"].is_null());
    }

    #[tokio::test]
    async fn test_write_failure_message_is_body_text() {
        let detail = r#"{"detail":"LinkedIn credentials are missing. Save them in dashboard settings first."}"#;
        let (url, server) = serve_once("400 Bad Request", detail).await;
        let backend = HttpBackend::new(&url, None).unwrap();

        let filters = RunFilters {
            positions: vec!["Backend Engineer".to_string()],
            locations: vec![],
            remote_only: true,
            easy_apply_only: true,
            posted_within_hours: 24,
            max_jobs_per_run: 20,
            keywords: vec![],
        };
        let err = backend.start_run(&filters).await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
        assert_eq!(err.to_string(), detail);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/run "));
        let sent: RunFilters = serde_json::from_str(request_body(&raw)).unwrap();
        assert_eq!(sent, filters);
    }

    #[tokio::test]
    async fn test_start_run_ignores_response_body() {
        let (url, server) = serve_once("200 OK", r#"{"started":true}"#).await;
        let backend = HttpBackend::new(&url, None).unwrap();
        let filters = crate::form::FilterForm {
            positions: "A".to_string(),
            locations: "B".to_string(),
            remote_only: false,
        }
        .to_filters();
        backend.start_run(&filters).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://{}/", addr), None).unwrap();
        assert_eq!(backend.base_url(), format!("http://{}", addr));
        let err = backend.fetch_health().await.unwrap_err();
        assert!(matches!(err, TransportError::Network { .. }));
    }
}
