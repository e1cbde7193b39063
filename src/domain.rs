use std::fmt;
use std::io::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use tracing_error::SpanTrace;

pub const HELP_TEXT: &str = "
 Navigation
   ↑ ↓ ← →  / k j h l   move the cursor
   PgUp PgDn            move a page
   Home End / g G       first / last row
   Tab                  switch between the table and the custom grid

 Table
   s                    sort by the current column (again to flip)
   /                    filter the current column
   c                    clear all filters
   space                toggle the checkbox of the current row
   a                    toggle \"select all\" for the visible rows
   d                    delete the current row
   r                    reset sort and deletions
   Enter                show the row details
   y                    copy the selected rows
   w                    write the page markup to disk
   L                    reload both tables

 General
   ?                    this help
   Esc                  close popup / dismiss notification
   q                    quit
";

#[derive(Debug)]
pub enum FTError {
    IoError(Error),
    JsonError(serde_json::Error),
    Network(reqwest::Error, SpanTrace),
    HttpStatus { endpoint: String, status: u16 },
    MissingData(&'static str),
    Validation(Vec<FieldError>),
    UnknownColumn(String),
    InvalidInput(String),
    Clipboard(String),
}

/// A validation failure attached to a single form field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FTError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FTError::IoError(e) => write!(f, "io error: {e}"),
            FTError::JsonError(e) => write!(f, "malformed json: {e}"),
            FTError::Network(e, _) => write!(f, "network error: {e}"),
            FTError::HttpStatus { endpoint, status } => {
                write!(f, "failed to load {endpoint}: {status}")
            }
            FTError::MissingData(key) => write!(f, "no {key} found in storage"),
            FTError::Validation(errors) => {
                let fields = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<String>>();
                write!(f, "validation failed ({})", fields.join(", "))
            }
            FTError::UnknownColumn(key) => write!(f, "unknown column \"{key}\""),
            FTError::InvalidInput(msg) => write!(f, "{msg}"),
            FTError::Clipboard(msg) => write!(f, "clipboard error: {msg}"),
        }
    }
}

impl std::error::Error for FTError {}

impl From<Error> for FTError {
    fn from(err: Error) -> Self {
        FTError::IoError(err)
    }
}

impl From<serde_json::Error> for FTError {
    fn from(err: serde_json::Error) -> Self {
        FTError::JsonError(err)
    }
}

impl From<reqwest::Error> for FTError {
    fn from(err: reqwest::Error) -> Self {
        FTError::Network(err, SpanTrace::capture())
    }
}

impl From<arboard::Error> for FTError {
    fn from(err: arboard::Error) -> Self {
        FTError::Clipboard(err.to_string())
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct FTConfig {
    pub api_url: String,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub storage_dir: PathBuf,
    pub log_file: PathBuf,
    pub page_file: PathBuf,
    pub redirect_delay: u64,
    pub notification_timeout: u64,
    pub flight_limit: usize,
    pub use_seed: bool,
}

impl Default for FTConfig {
    fn default() -> Self {
        let storage_dir = PathBuf::from(shellexpand::tilde("~/.ft").as_ref());
        Self {
            api_url: "http://127.0.0.1:5001".to_string(),
            event_poll_time: 100,
            max_column_width: 40,
            log_file: storage_dir.join("ft.log"),
            page_file: storage_dir.join("tables.html"),
            storage_dir,
            redirect_delay: 3,
            notification_timeout: 5,
            flight_limit: 100,
            use_seed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A dismissible banner. Expires on its own after the configured timeout.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub created: Instant,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            created: Instant::now(),
        }
    }

    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.duration_since(self.created) >= timeout
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    FilterColumn,
}

#[derive(Debug, Clone)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    NextTable,
    Sort,
    Filter,
    ClearFilters,
    ToggleRow,
    ToggleSelectAll,
    Delete,
    Reset,
    Reload,
    CopyRows,
    WritePage,
    Enter,
    Exit,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_expire_after_timeout() {
        let note = Notification::error("Failed to load table data");
        let timeout = Duration::from_secs(5);
        assert!(!note.is_expired(timeout, note.created + Duration::from_secs(4)));
        assert!(note.is_expired(timeout, note.created + Duration::from_secs(5)));
        assert_eq!(note.label(), "error");
    }

    #[test]
    fn validation_errors_list_fields() {
        let err = FTError::Validation(vec![
            FieldError::new("email", "Please enter a valid email address"),
            FieldError::new("termsAccept", "Please accept the terms and conditions"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed (email: Please enter a valid email address, termsAccept: Please accept the terms and conditions)"
        );
    }

    #[test]
    fn config_setters_accept_into() {
        let config = FTConfig::default().api_url("http://localhost:9000").flight_limit(10usize);
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.flight_limit, 10);
        assert!(config.log_file.ends_with("ft.log"));
    }
}
