use std::collections::HashMap;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::AppError;

fn context_to_json(context: &HashMap<String, String>) -> Option<Value> {
    if context.is_empty() {
        None
    } else {
        let mut map = Map::with_capacity(context.len());
        for (key, value) in context {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Some(Value::Object(map))
    }
}

fn wrap_details(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "value": value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Family,
    Entities,
}

impl Area {
    pub const fn as_str(self) -> &'static str {
        match self {
            Area::Family => "family",
            Area::Entities => "entities",
        }
    }
}

/// Timed log span for one service call: `enter` at DEBUG, then exactly one
/// of success (INFO), validation failure (WARN) or failure (ERROR).
pub struct LogScope {
    cmd: &'static str,
    area: Area,
    record_id: Option<String>,
    start: Instant,
}

impl LogScope {
    pub fn new(cmd: &'static str, area: Area, record_id: Option<&str>) -> Self {
        let scope = Self {
            cmd,
            area,
            record_id: record_id.map(str::to_string),
            start: Instant::now(),
        };
        debug!(
            target: "fincent",
            area = scope.area.as_str(),
            cmd = scope.cmd,
            record_id = scope.record_id.as_deref(),
            details = %json!({ "stage": "enter" })
        );
        scope
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn success(&self, record_id: Option<&str>, details: Value) {
        info!(
            target: "fincent",
            area = self.area.as_str(),
            cmd = self.cmd,
            record_id = record_id.or(self.record_id.as_deref()),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn warn(&self, details: Value) {
        warn!(
            target: "fincent",
            area = self.area.as_str(),
            cmd = self.cmd,
            record_id = self.record_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn fail(&self, err: &AppError) {
        let mut map = Map::new();
        map.insert("code".into(), Value::String(err.code().to_string()));
        map.insert("message".into(), Value::String(err.message().to_string()));
        if let Some(context) = context_to_json(err.context()) {
            map.insert("context".into(), context);
        }

        if err.is_validation() {
            self.warn(Value::Object(map));
            return;
        }

        if let Some(cause) = err.cause() {
            map.insert("cause".into(), Value::String(cause.to_string()));
        }
        error!(
            target: "fincent",
            area = self.area.as_str(),
            cmd = self.cmd,
            record_id = self.record_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %serde_json::Value::Object(map)
        );
    }
}
