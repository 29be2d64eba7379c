//! In-memory backend used by the controller, poller and UI tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::Backend;
use crate::error::TransportError;
use crate::models::{
    DashboardSnapshot, Health, JobRecord, RunFilters, RuntimeSettings, SettingsUpdate,
};

pub fn snapshot(total_applied: u64) -> DashboardSnapshot {
    DashboardSnapshot {
        total_applied,
        applied_today: 2,
        failed_today: 0,
        skipped_today: 1,
        date: "2024-01-01".to_string(),
    }
}

pub fn job(id: i64, title: &str) -> JobRecord {
    JobRecord {
        id,
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        status: "applied".to_string(),
        notes: String::new(),
        applied_at: "2024-01-01T10:00:00Z".to_string(),
    }
}

fn server_error(message: &str) -> TransportError {
    TransportError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.to_string(),
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "********" }
}

/// Behaves like the real backend: keeps secrets to itself and masks them
/// on every read.
pub struct FakeBackend {
    pub dashboard: Mutex<DashboardSnapshot>,
    pub jobs: Mutex<Vec<JobRecord>>,
    email: Mutex<String>,
    model: Mutex<String>,
    database_url: Mutex<String>,
    password: Mutex<String>,
    api_key: Mutex<String>,
    pub fail_dashboard: AtomicBool,
    pub fail_jobs: AtomicBool,
    pub fail_settings: AtomicBool,
    pub fail_save: AtomicBool,
    pub fail_run: AtomicBool,
    pub calls: AtomicUsize,
    pub saved: Mutex<Vec<serde_json::Value>>,
    pub runs: Mutex<Vec<RunFilters>>,
    /// Per-call dashboard latency, consumed front to back.
    pub dashboard_delays: Mutex<VecDeque<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            dashboard: Mutex::new(snapshot(12)),
            jobs: Mutex::new(vec![job(1, "Backend Engineer")]),
            email: Mutex::new("me@example.com".to_string()),
            model: Mutex::new("gpt-4o".to_string()),
            database_url: Mutex::new("sqlite:///./state.db".to_string()),
            password: Mutex::new("already-stored".to_string()),
            api_key: Mutex::new(String::new()),
            fail_dashboard: AtomicBool::new(false),
            fail_jobs: AtomicBool::new(false),
            fail_settings: AtomicBool::new(false),
            fail_save: AtomicBool::new(false),
            fail_run: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            dashboard_delays: Mutex::new(VecDeque::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(flag: &AtomicBool, failing: bool) {
        flag.store(failing, Ordering::SeqCst);
    }

    fn masked(&self) -> RuntimeSettings {
        let value = json!({
            "linkedin_email": self.email.lock().unwrap().clone(),
            "linkedin_password": mask(self.password.lock().unwrap().as_str()),
            "openai_api_key": mask(self.api_key.lock().unwrap().as_str()),
            "openai_model": self.model.lock().unwrap().clone(),
            "database_url": self.database_url.lock().unwrap().clone(),
        });
        serde_json::from_value(value).unwrap()
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot, TransportError> {
        self.hit();
        if self.fail_dashboard.load(Ordering::SeqCst) {
            return Err(server_error(""));
        }
        let snapshot = self.dashboard.lock().unwrap().clone();
        let delay = self.dashboard_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn fetch_jobs(&self) -> Result<Vec<JobRecord>, TransportError> {
        self.hit();
        if self.fail_jobs.load(Ordering::SeqCst) {
            return Err(server_error(""));
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn fetch_settings(&self) -> Result<RuntimeSettings, TransportError> {
        self.hit();
        if self.fail_settings.load(Ordering::SeqCst) {
            return Err(server_error(""));
        }
        Ok(self.masked())
    }

    async fn save_settings(
        &self,
        update: &SettingsUpdate,
    ) -> Result<RuntimeSettings, TransportError> {
        self.hit();
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(server_error("{\"detail\":\"settings store is read-only\"}"));
        }
        let sent = serde_json::to_value(update).unwrap();
        self.saved.lock().unwrap().push(sent.clone());

        // Same rule as the server: null means keep.
        let apply = |slot: &Mutex<String>, key: &str| {
            if let Some(v) = sent[key].as_str() {
                *slot.lock().unwrap() = v.trim().to_string();
            }
        };
        apply(&self.email, "linkedin_email");
        apply(&self.password, "linkedin_password");
        apply(&self.api_key, "openai_api_key");
        apply(&self.model, "openai_model");
        apply(&self.database_url, "database_url");
        Ok(self.masked())
    }

    async fn start_run(&self, filters: &RunFilters) -> Result<(), TransportError> {
        self.hit();
        if self.fail_run.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: StatusCode::CONFLICT,
                message: "{\"detail\":\"A run is already in progress.\"}".to_string(),
            });
        }
        self.runs.lock().unwrap().push(filters.clone());
        self.dashboard.lock().unwrap().total_applied += 1;
        Ok(())
    }

    async fn fetch_health(&self) -> Result<Health, TransportError> {
        self.hit();
        Ok(Health { ok: true, running: !self.runs.lock().unwrap().is_empty() })
    }
}
