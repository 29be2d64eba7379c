//! Editable form state backing the settings and filter panels.

use crate::models::{RunFilters, RuntimeSettings, SettingsUpdate, WriteOnly};

pub const EASY_APPLY_ONLY: bool = true;
pub const POSTED_WITHIN_HOURS: u32 = 24;
pub const MAX_JOBS_PER_RUN: u32 = 20;

/// Split comma-separated operator input, trimming each piece and dropping
/// empty ones. Order is preserved.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterForm {
    pub positions: String,
    pub locations: String,
    pub remote_only: bool,
}

impl FilterForm {
    /// Build the run command. The fixed fields never come from the form.
    pub fn to_filters(&self) -> RunFilters {
        RunFilters {
            positions: split_list(&self.positions),
            locations: split_list(&self.locations),
            remote_only: self.remote_only,
            easy_apply_only: EASY_APPLY_ONLY,
            posted_within_hours: POSTED_WITHIN_HOURS,
            max_jobs_per_run: MAX_JOBS_PER_RUN,
            keywords: Vec::new(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SettingsForm {
    pub linkedin_email: String,
    pub linkedin_password: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub database_url: String,
    pub password_stored: bool,
    pub api_key_stored: bool,
    /// Set once the server's values have been copied in.
    pub synced: bool,
}

impl SettingsForm {
    pub fn new(openai_model: &str) -> Self {
        Self {
            linkedin_email: String::new(),
            linkedin_password: String::new(),
            openai_api_key: String::new(),
            openai_model: openai_model.to_string(),
            database_url: String::new(),
            password_stored: false,
            api_key_stored: false,
            synced: false,
        }
    }

    /// Copy the server's non-secret values in. Secret inputs are left as
    /// the operator typed them.
    pub fn sync_from(&mut self, settings: &RuntimeSettings) {
        self.linkedin_email = settings.linkedin_email.clone();
        if !settings.openai_model.is_empty() {
            self.openai_model = settings.openai_model.clone();
        }
        self.database_url = settings.database_url.clone();
        self.password_stored = settings.linkedin_password.is_stored();
        self.api_key_stored = settings.openai_api_key.is_stored();
        self.synced = true;
    }

    /// The full form as a save payload. Blank secrets go out as `null`.
    /// Until the form has seen the server's values, blank plain fields do
    /// too, so an early save cannot wipe what the server already holds.
    pub fn to_update(&self) -> SettingsUpdate {
        let plain = |value: &str| {
            if self.synced || !value.trim().is_empty() {
                Some(value.to_string())
            } else {
                None
            }
        };
        SettingsUpdate {
            linkedin_email: plain(&self.linkedin_email),
            linkedin_password: WriteOnly::new(self.linkedin_password.clone()),
            openai_api_key: WriteOnly::new(self.openai_api_key.clone()),
            openai_model: plain(&self.openai_model),
            database_url: plain(&self.database_url),
        }
    }

    pub fn clear_secrets(&mut self) {
        self.linkedin_password.clear();
        self.openai_api_key.clear();
    }
}

impl std::fmt::Debug for SettingsForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsForm")
            .field("linkedin_email", &self.linkedin_email)
            .field("linkedin_password", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("openai_model", &self.openai_model)
            .field("database_url", &self.database_url)
            .field("synced", &self.synced)
            .finish()
    }
}
