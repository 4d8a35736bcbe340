use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::session::Gender;

/// What the wizard records about a session, one JSON line per event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    SessionStarted {
        client: String,
    },
    ImageAcquired {
        source: String,
        mime_type: String,
    },
    AcquisitionFailed {
        source: String,
        error: String,
    },
    GenerationStarted {
        client: String,
        hero_name: String,
        gender: Gender,
        theme: String,
    },
    GenerationSucceeded {
        mime_type: String,
    },
    GenerationFailed {
        error: String,
        /// Credential problems the user has to fix before retrying.
        configuration: bool,
    },
    NavigatedBack,
    SessionReset,
    PosterSaved {
        path: String,
    },
}

impl WizardEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WizardEvent::SessionStarted { .. } => "session_started",
            WizardEvent::ImageAcquired { .. } => "image_acquired",
            WizardEvent::AcquisitionFailed { .. } => "acquisition_failed",
            WizardEvent::GenerationStarted { .. } => "generation_started",
            WizardEvent::GenerationSucceeded { .. } => "generation_succeeded",
            WizardEvent::GenerationFailed { .. } => "generation_failed",
            WizardEvent::NavigatedBack => "navigated_back",
            WizardEvent::SessionReset => "session_reset",
            WizardEvent::PosterSaved { .. } => "poster_saved",
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    session_id: &'a str,
    ts: String,
    #[serde(flatten)]
    event: &'a WizardEvent,
}

/// Session-scoped `events.jsonl` sink. The file is opened once, in append
/// mode, so several sessions can share one log.
#[derive(Debug)]
pub struct EventLog {
    session_id: String,
    sink: Option<(PathBuf, File)>,
}

impl EventLog {
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            session_id: session_id.into(),
            sink: Some((path, file)),
        })
    }

    /// A log that accepts events and drops them.
    pub fn disabled(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sink: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&mut self, event: &WizardEvent) -> Result<()> {
        let Some((path, file)) = self.sink.as_mut() else {
            return Ok(());
        };
        let mut line = serde_json::to_string(&EventLine {
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        })?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::*;

    fn read_lines(path: &Path) -> Result<Vec<Value>> {
        fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
            .collect()
    }

    #[test]
    fn events_are_tagged_and_stamped() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("events.jsonl");
        let mut log = EventLog::open(&path, "session-abc")?;

        log.record(&WizardEvent::GenerationStarted {
            client: "gemini".to_string(),
            hero_name: "Nightwatcher".to_string(),
            gender: Gender::NonBinary,
            theme: "Cyberpunk".to_string(),
        })?;
        log.record(&WizardEvent::SessionReset)?;

        let rows = read_lines(&path)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["type"], json!("generation_started"));
        assert_eq!(rows[0]["session_id"], json!("session-abc"));
        assert_eq!(rows[0]["gender"], json!("Non-binary"));
        assert_eq!(rows[0]["hero_name"], json!("Nightwatcher"));
        assert_eq!(rows[1]["type"], json!(WizardEvent::SessionReset.kind()));
        DateTime::parse_from_rfc3339(rows[1]["ts"].as_str().unwrap_or_default())?;
        Ok(())
    }

    #[test]
    fn failure_events_carry_configuration_flag() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let mut log = EventLog::open(&path, "session-1")?;
        log.record(&WizardEvent::GenerationFailed {
            error: "no image generated".to_string(),
            configuration: false,
        })?;

        let rows = read_lines(&path)?;
        assert_eq!(rows[0]["configuration"], json!(false));
        assert_eq!(rows[0]["error"], json!("no image generated"));
        Ok(())
    }

    #[test]
    fn reopened_log_appends_across_sessions() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        EventLog::open(&path, "session-1")?.record(&WizardEvent::NavigatedBack)?;
        EventLog::open(&path, "session-2")?.record(&WizardEvent::NavigatedBack)?;

        let sessions: Vec<String> = read_lines(&path)?
            .iter()
            .filter_map(|row| row["session_id"].as_str().map(str::to_string))
            .collect();
        assert_eq!(sessions, vec!["session-1", "session-2"]);
        Ok(())
    }

    #[test]
    fn disabled_log_has_no_path_and_accepts_events() -> Result<()> {
        let mut log = EventLog::disabled("session-9");
        log.record(&WizardEvent::SessionStarted {
            client: "scripted".to_string(),
        })?;
        assert!(log.path().is_none());
        assert_eq!(log.session_id(), "session-9");
        Ok(())
    }
}
