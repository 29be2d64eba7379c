//! Client-held view state and the read/write protocols that keep it in
//! line with the backend.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::Backend;
use crate::config::PanelConfig;
use crate::error::TransportError;
use crate::form::{FilterForm, SettingsForm};
use crate::models::{DashboardSnapshot, JobRecord, RuntimeSettings};
use crate::poller::Poller;

pub const SETTINGS_SAVED: &str = "Settings saved. Secrets are now stored server-side.";

// --- Refresh cycles ---

/// Hands out refresh cycle numbers. Shared between the poller and the
/// write paths so every cycle, whoever started it, is ordered.
#[derive(Debug, Default)]
pub struct RefreshSequencer {
    issued: AtomicU64,
}

impl RefreshSequencer {
    pub fn next(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone)]
pub struct RefreshData {
    pub dashboard: DashboardSnapshot,
    pub jobs: Vec<JobRecord>,
    pub settings: RuntimeSettings,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub seq: u64,
    pub result: Result<RefreshData, TransportError>,
}

/// Run the three reads concurrently. Any failure fails the whole cycle.
pub async fn fetch_cycle<B: Backend + ?Sized>(backend: &B, seq: u64) -> RefreshOutcome {
    let result = tokio::try_join!(
        backend.fetch_dashboard(),
        backend.fetch_jobs(),
        backend.fetch_settings(),
    )
    .map(|(dashboard, jobs, settings)| RefreshData {
        dashboard,
        jobs,
        settings,
    });
    RefreshOutcome { seq, result }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Fresh,
    Stale,
    Failed,
}

// --- View state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: StatusLevel::Info, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: StatusLevel::Error, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub label: &'static str,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub status: &'a str,
    pub notes: &'a str,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    pub dashboard: Option<DashboardSnapshot>,
    pub jobs: Vec<JobRecord>,
    pub filters: FilterForm,
    pub settings: SettingsForm,
    pub status: Option<StatusMessage>,
    pub refresh_error: Option<String>,
    pub last_refreshed: Option<DateTime<Local>>,
}

impl ViewState {
    pub fn new(config: &PanelConfig) -> Self {
        let defaults = &config.defaults;
        Self {
            dashboard: None,
            jobs: Vec::new(),
            filters: FilterForm {
                positions: defaults.positions.clone(),
                locations: defaults.locations.clone(),
                remote_only: defaults.remote_only,
            },
            settings: SettingsForm::new(&defaults.openai_model),
            status: None,
            refresh_error: None,
            last_refreshed: None,
        }
    }

    /// Counter cards; zero until the first snapshot arrives.
    pub fn cards(&self) -> [Card; 4] {
        let d = self.dashboard.as_ref();
        [
            Card { label: "Total Applied", value: d.map_or(0, |d| d.total_applied) },
            Card { label: "Applied Today", value: d.map_or(0, |d| d.applied_today) },
            Card { label: "Failed Today", value: d.map_or(0, |d| d.failed_today) },
            Card { label: "Skipped Today", value: d.map_or(0, |d| d.skipped_today) },
        ]
    }

    /// Rows of the recent applications table, in backend order.
    pub fn job_rows(&self) -> Vec<JobRow<'_>> {
        self.jobs
            .iter()
            .map(|job| JobRow {
                title: &job.title,
                company: &job.company,
                status: &job.status,
                notes: &job.notes,
            })
            .collect()
    }
}

// --- Controller ---

pub struct Controller<B: Backend + 'static> {
    backend: Arc<B>,
    sequencer: Arc<RefreshSequencer>,
    last_applied: u64,
    refresh_interval: std::time::Duration,
    poller: Option<Poller>,
    state: ViewState,
}

impl<B: Backend + 'static> Controller<B> {
    pub fn new(backend: Arc<B>, config: &PanelConfig) -> Self {
        Self {
            backend,
            sequencer: Arc::new(RefreshSequencer::default()),
            last_applied: 0,
            refresh_interval: config.refresh_interval,
            poller: None,
            state: ViewState::new(config),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn is_active(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Start the recurring refresh. The first cycle is issued right away.
    /// Outcomes arrive on the returned channel and must be fed to
    /// [`Controller::apply`]. Activating again replaces the previous timer.
    pub fn activate(&mut self) -> mpsc::UnboundedReceiver<RefreshOutcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        let poller = Poller::spawn(
            Arc::clone(&self.backend),
            Arc::clone(&self.sequencer),
            self.refresh_interval,
            tx,
        );
        if let Some(old) = self.poller.replace(poller) {
            old.stop();
        }
        rx
    }

    /// Cancel the recurring refresh and any cycle it has in flight.
    pub fn teardown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
            info!("Refresh timer stopped");
        }
    }

    /// Apply one refresh outcome. Outcomes not newer than the last applied
    /// cycle are dropped; a failed cycle changes nothing but the error line.
    pub fn apply(&mut self, outcome: RefreshOutcome) -> Applied {
        if outcome.seq <= self.last_applied {
            warn!(seq = outcome.seq, last = self.last_applied, "Discarding stale refresh");
            return Applied::Stale;
        }

        match outcome.result {
            Ok(data) => {
                self.last_applied = outcome.seq;
                self.state.dashboard = Some(data.dashboard);
                self.state.jobs = data.jobs;
                self.state.settings.sync_from(&data.settings);
                self.state.refresh_error = None;
                self.state.last_refreshed = Some(Local::now());
                Applied::Fresh
            }
            Err(e) => {
                warn!(seq = outcome.seq, "Refresh failed: {}", e);
                self.state.refresh_error = Some(e.to_string());
                Applied::Failed
            }
        }
    }

    /// One refresh cycle, awaited and applied in place.
    pub async fn refresh(&mut self) -> Applied {
        let seq = self.sequencer.next();
        let outcome = fetch_cycle(self.backend.as_ref(), seq).await;
        self.apply(outcome)
    }

    /// Submit every settings field. Secrets are only cleared once the
    /// backend has accepted them.
    pub async fn save_settings(&mut self) -> Result<(), TransportError> {
        let payload = self.state.settings.to_update();
        info!(
            replaces_password = !payload.linkedin_password.is_blank(),
            replaces_api_key = !payload.openai_api_key.is_blank(),
            "Saving runtime settings"
        );

        match self.backend.save_settings(&payload).await {
            Ok(_) => {
                self.state.settings.clear_secrets();
                self.state.status = Some(StatusMessage::info(SETTINGS_SAVED));
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                warn!(status = ?e.status(), "Saving settings failed: {}", e);
                self.state.status = Some(StatusMessage::error(format!("Save failed: {}", e)));
                Err(e)
            }
        }
    }

    /// Ask the backend to start an automation run with the current filters.
    pub async fn start_run(&mut self) -> Result<(), TransportError> {
        let filters = self.state.filters.to_filters();
        info!(
            positions = filters.positions.len(),
            locations = filters.locations.len(),
            remote_only = filters.remote_only,
            "Starting run"
        );

        match self.backend.start_run(&filters).await {
            Ok(()) => {
                self.state.status = Some(StatusMessage::info("Run started."));
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                warn!(status = ?e.status(), "Starting run failed: {}", e);
                self.state.status = Some(StatusMessage::error(format!("Run not started: {}", e)));
                Err(e)
            }
        }
    }
}

impl<B: Backend + 'static> Drop for Controller<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
