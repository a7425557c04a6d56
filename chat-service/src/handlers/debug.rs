use crate::startup::AppState;
use axum::{extract::State, http::Method, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;

const NOT_SET: &str = "NOT_SET";
const REDACTED: &str = "<redacted>";

/// Variables reported by the debug endpoint, with the preview prefix length.
const INSPECTED_VARS: &[(&str, usize)] = &[
    ("OPENAI_API_KEY", 10),
    ("MONGODB_URI", 20),
    ("MONGODB_READ_URI", 20),
];

const ENV_NAME_MARKERS: &[&str] = &["OPENAI", "MONGODB", "CHAT"];

#[derive(Debug, Serialize)]
pub struct EnvVarReport {
    pub exists: bool,
    pub length: usize,
    pub preview: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugResponse {
    pub message: &'static str,
    pub timestamp: String,
    pub method: String,
    pub environment: BTreeMap<&'static str, EnvVarReport>,
    pub all_env_vars: Vec<String>,
}

fn report(value: Option<&str>, prefix_len: usize, reveal: bool) -> EnvVarReport {
    match value {
        Some(v) if !v.is_empty() => EnvVarReport {
            exists: true,
            length: v.chars().count(),
            preview: if reveal {
                format!("{}...", v.chars().take(prefix_len).collect::<String>())
            } else {
                REDACTED.to_string()
            },
        },
        _ => EnvVarReport {
            exists: false,
            length: 0,
            preview: NOT_SET.to_string(),
        },
    }
}

#[tracing::instrument(skip(state))]
pub async fn debug_info(State(state): State<AppState>, method: Method) -> Json<DebugResponse> {
    let reveal = state.config.common.debug;

    let environment = INSPECTED_VARS
        .iter()
        .map(|(name, prefix_len)| {
            let value = env::var(name).ok();
            (*name, report(value.as_deref(), *prefix_len, reveal))
        })
        .collect();

    let mut all_env_vars: Vec<String> = env::vars_os()
        .map(|(key, _)| key.to_string_lossy().into_owned())
        .filter(|key| ENV_NAME_MARKERS.iter().any(|m| key.contains(m)))
        .collect();
    all_env_vars.sort();

    Json(DebugResponse {
        message: "Debug API is working!",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        method: method.to_string(),
        environment,
        all_env_vars,
    })
}
