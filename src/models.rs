use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub total_applied: u64,
    pub applied_today: u64,
    pub failed_today: u64,
    pub skipped_today: u64,
    pub date: String, // "YYYY-MM-DD", server's calendar date
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub status: String, // "queued", "processing", "applied", "skipped", "failed"
    #[serde(default)]
    pub notes: String,
    pub applied_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatusKind {
    Queued,
    Processing,
    Applied,
    Skipped,
    Failed,
    Other,
}

impl JobRecord {
    pub fn status_kind(&self) -> JobStatusKind {
        match self.status.as_str() {
            "queued" => JobStatusKind::Queued,
            "processing" => JobStatusKind::Processing,
            "applied" => JobStatusKind::Applied,
            "skipped" => JobStatusKind::Skipped,
            "failed" => JobStatusKind::Failed,
            _ => JobStatusKind::Other,
        }
    }
}

/// A credential the backend accepts on write but never hands back.
///
/// Reading one from JSON keeps only whether the server has something
/// stored; the text itself (usually a `********` mask) is dropped.
/// A blank value serializes as `null`, which the backend treats as
/// "leave the stored secret alone".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WriteOnly {
    value: Option<String>,
    stored: bool,
}

impl WriteOnly {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::default()
        } else {
            Self {
                value: Some(value),
                stored: false,
            }
        }
    }

    /// True when the server reported a stored secret on read.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_blank(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Debug for WriteOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.stored) {
            (Some(_), _) => f.write_str("WriteOnly(<redacted>)"),
            (None, true) => f.write_str("WriteOnly(<stored>)"),
            (None, false) => f.write_str("WriteOnly(<blank>)"),
        }
    }
}

impl Serialize for WriteOnly {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for WriteOnly {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(Self {
            value: None,
            stored: raw.is_some_and(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub linkedin_email: String,
    #[serde(default)]
    pub linkedin_password: WriteOnly,
    #[serde(default)]
    pub openai_api_key: WriteOnly,
    #[serde(default)]
    pub openai_model: String,
    #[serde(default)]
    pub database_url: String,
}

/// Save payload. `None` goes out as `null`, which the backend leaves
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsUpdate {
    pub linkedin_email: Option<String>,
    pub linkedin_password: WriteOnly,
    pub openai_api_key: WriteOnly,
    pub openai_model: Option<String>,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilters {
    pub positions: Vec<String>,
    pub locations: Vec<String>,
    pub remote_only: bool,
    pub easy_apply_only: bool,
    pub posted_within_hours: u32,
    pub max_jobs_per_run: u32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    #[serde(default)]
    pub running: bool,
}
