//! Background message bus: a closed set of typed requests, each with exactly one
//! response shape. Unknown message types are reported, never ignored.

use std::collections::VecDeque;
use std::sync::Arc;

use collector_logging::{collector_debug, collector_error, collector_info, collector_warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use timeline_core::{now_millis, Millis, Settings, SettingsPatch};

use crate::last_export_store::LastExportStore;
use crate::settings_store::SettingsStore;
use crate::{LastExport, StoreError};

/// Oldest entries are dropped beyond this many.
pub const MAX_LOG_ENTRIES: usize = 500;

const REQUEST_TYPES: [&str; 7] = [
    "log",
    "getLogs",
    "clearLogs",
    "exportComplete",
    "getLastExport",
    "getSettings",
    "saveSettings",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: Millis,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BusRequest {
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    GetLogs,
    ClearLogs,
    ExportComplete {
        username: String,
        count: usize,
    },
    GetLastExport,
    GetSettings,
    SaveSettings {
        settings: SettingsPatch,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusResponse {
    Ack,
    Logs(Vec<LogEntry>),
    LastExport(Option<LastExport>),
    Settings(Settings),
}

impl BusResponse {
    pub fn to_value(&self) -> Value {
        match self {
            BusResponse::Ack => json!({"success": true}),
            BusResponse::Logs(logs) => json!({"success": true, "logs": logs}),
            BusResponse::LastExport(last) => json!({"success": true, "lastExport": last}),
            BusResponse::Settings(settings) => json!({"success": true, "settings": settings}),
        }
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("message has no type")]
    MissingType,
    #[error("unsupported message type: {0}")]
    Unsupported(String),
    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
    #[error("state store failed: {0}")]
    Store(#[from] StoreError),
}

/// Background-side handler for the message bus. Logs live in memory; settings and
/// the last export go through their stores.
pub struct Background {
    settings: Arc<dyn SettingsStore>,
    exports: Arc<dyn LastExportStore>,
    logs: VecDeque<LogEntry>,
}

impl Background {
    pub fn new(settings: Arc<dyn SettingsStore>, exports: Arc<dyn LastExportStore>) -> Self {
        Self {
            settings,
            exports,
            logs: VecDeque::new(),
        }
    }

    /// Validates the message type before decoding the payload, so version skew is
    /// reported as an unsupported type rather than a decoding failure.
    pub fn parse_request(raw: &Value) -> Result<BusRequest, BusError> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(BusError::MissingType)?;
        if !REQUEST_TYPES.contains(&kind) {
            return Err(BusError::Unsupported(kind.to_string()));
        }
        serde_json::from_value(raw.clone()).map_err(|source| BusError::Malformed {
            kind: kind.to_string(),
            source,
        })
    }

    pub async fn handle(&mut self, request: BusRequest) -> Result<BusResponse, BusError> {
        let response = match request {
            BusRequest::Log { level, message } => {
                self.push_log(level, message);
                BusResponse::Ack
            }
            BusRequest::GetLogs => BusResponse::Logs(self.logs.iter().cloned().collect()),
            BusRequest::ClearLogs => {
                self.logs.clear();
                BusResponse::Ack
            }
            BusRequest::ExportComplete { username, count } => {
                collector_info!("Export complete for @{}: {} items", username, count);
                let export = LastExport {
                    username,
                    count,
                    at: now_millis(),
                };
                self.exports.record(&export).await?;
                BusResponse::Ack
            }
            BusRequest::GetLastExport => BusResponse::LastExport(self.exports.load().await?),
            BusRequest::GetSettings => BusResponse::Settings(self.settings.get().await?),
            BusRequest::SaveSettings { settings } => {
                self.settings.set(settings).await?;
                BusResponse::Ack
            }
        };
        Ok(response)
    }

    /// Boundary entry point: every failure becomes `{"success": false, "error": ...}`.
    pub async fn handle_raw(&mut self, raw: &Value) -> Value {
        let result = match Self::parse_request(raw) {
            Ok(request) => self.handle(request).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(response) => response.to_value(),
            Err(err) => {
                collector_warn!("Bus request failed: {}", err);
                json!({"success": false, "error": err.to_string()})
            }
        }
    }

    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => collector_debug!("[content] {}", message),
            LogLevel::Info => collector_info!("[content] {}", message),
            LogLevel::Warn => collector_warn!("[content] {}", message),
            LogLevel::Error => collector_error!("[content] {}", message),
        }
        if self.logs.len() == MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            at: now_millis(),
            level,
            message,
        });
    }
}
