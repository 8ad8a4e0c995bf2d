//! Append-only flat files backing the admin dashboard.
//!
//! `app.log` gets one access line per `/predict` call; `security.log` gets
//! one timestamped line per security event.

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

pub const APP_LOG: &str = "app.log";
pub const SECURITY_LOG: &str = "security.log";

#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("audit log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    app_log: PathBuf,
    security_log: PathBuf,
}

impl AuditLog {
    /// Creates the directory and both files if missing; existing content is kept.
    pub fn open(dir: &Path) -> Result<Self, AuditError> {
        std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        let log = Self {
            app_log: dir.join(APP_LOG),
            security_log: dir.join(SECURITY_LOG),
        };
        for path in [&log.app_log, &log.security_log] {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| io_error(path, source))?;
        }
        Ok(log)
    }

    pub fn security_log_path(&self) -> &Path {
        &self.security_log
    }

    /// Records one request in common-log style.
    pub async fn access(&self, client_ip: &str, method: &str, path: &str, status: u16) {
        let line = access_line(client_ip, method, path, status, &timestamp_clf());
        tracing::info!("{}", line);
        self.append(&self.app_log, &line).await;
    }

    pub async fn security(&self, message: &str) {
        let line = format!("{} - {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        tracing::warn!("{}", line);
        self.append(&self.security_log, &line).await;
    }

    pub async fn read_app_log(&self) -> Result<String, AuditError> {
        tokio::fs::read_to_string(&self.app_log)
            .await
            .map_err(|source| io_error(&self.app_log, source))
    }

    async fn append(&self, path: &Path, line: &str) {
        if let Err(err) = append_line(path, line).await {
            tracing::error!("failed writing audit line: {}", err);
        }
    }
}

async fn append_line(path: &Path, line: &str) -> Result<(), AuditError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| io_error(path, source))?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
        .await
        .map_err(|source| io_error(path, source))
}

fn access_line(client_ip: &str, method: &str, path: &str, status: u16, timestamp: &str) -> String {
    format!("{client_ip} - - [{timestamp}] \"{method} {path} HTTP/1.1\" {status} -")
}

fn timestamp_clf() -> String {
    Local::now().format("%d/%b/%Y %H:%M:%S").to_string()
}

fn io_error(path: &Path, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.display().to_string(),
        source,
    }
}
