//! Category file logger. One file per day under ~/.violeta/logs:
//! - DIRECTIVE: sentinel commands extracted and dispatched
//! - MODEL: generative-language calls
//! - MEMORY: profile facts saved
//! - CONVERSATION: session lifecycle
//! - ERROR: failures of any kind

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Directive,
    Model,
    Memory,
    Conversation,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Directive => "DIRECTIVE",
            LogCategory::Model => "MODEL",
            LogCategory::Memory => "MEMORY",
            LogCategory::Conversation => "CONVERSATION",
            LogCategory::Error => "ERROR",
        }
    }
}

static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".violeta/logs")
}

fn log_dir() -> PathBuf {
    LOG_DIR
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(default_log_dir)
}

fn log_file_path() -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    log_dir().join(format!("violeta-{}.log", today))
}

/// Create the log directory. Call once at startup; an explicit directory
/// overrides the default (tests point this at a temp dir).
pub fn init_logging(dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let target = dir.unwrap_or_else(default_log_dir);
    fs::create_dir_all(&target)?;
    *LOG_DIR.lock().unwrap() = Some(target);

    log(LogCategory::Conversation, None, "Violeta logging initialized");
    Ok(())
}

pub fn log(category: LogCategory, conversation_id: Option<&str>, message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let conv_context = conversation_id
        .map(|id| format!("conversation={} | ", id))
        .unwrap_or_default();

    let line = format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        conv_context,
        message
    );

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path())
    {
        let _ = file.write_all(line.as_bytes());
    }
}

pub fn log_directive(conversation_id: Option<&str>, message: &str) {
    log(LogCategory::Directive, conversation_id, message);
}

pub fn log_model(conversation_id: Option<&str>, message: &str) {
    log(LogCategory::Model, conversation_id, message);
}

pub fn log_memory(conversation_id: Option<&str>, message: &str) {
    log(LogCategory::Memory, conversation_id, message);
}

pub fn log_conversation(conversation_id: Option<&str>, message: &str) {
    log(LogCategory::Conversation, conversation_id, message);
}

pub fn log_error(conversation_id: Option<&str>, message: &str) {
    log(LogCategory::Error, conversation_id, message);
}

/// Delete log files older than 7 days, returning how many were removed.
pub fn cleanup_old_logs() -> Result<usize, Box<dyn std::error::Error>> {
    let dir = log_dir();
    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);
    let mut deleted = 0;

    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(entry.path()).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The log directory is process-global, so these assertions live in one
    // test to avoid racing on it.
    #[test]
    fn lines_carry_category_and_conversation() {
        let dir = tempfile::tempdir().unwrap();
        init_logging(Some(dir.path().to_path_buf())).unwrap();

        log_directive(Some("7"), "tarea: Avance actualizado.");
        log_error(None, "algo falló");

        let content = fs::read_to_string(log_file_path()).unwrap();
        assert!(content.contains("[DIRECTIVE] conversation=7 | tarea: Avance actualizado."));
        assert!(content.contains("[ERROR] algo falló"));

        // Fresh files are untouched by cleanup
        assert_eq!(cleanup_old_logs().unwrap(), 0);
        assert!(log_file_path().exists());
    }
}
