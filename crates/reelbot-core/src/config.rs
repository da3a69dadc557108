use crate::app_config::{AppConfig, Environment};
use crate::slots::parse_posting_slots;
use crate::ConfigError;

const DEFAULT_POSTING_SLOTS: &str = "mon 18:00,wed 18:00,fri 18:00";
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com/v19.0";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` if required values are missing or invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REELBOT_ENV", "development"));

    let bind_addr = parse_addr("REELBOT_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("REELBOT_LOG_LEVEL", "info");
    let themes_path = PathBuf::from(or_default("REELBOT_THEMES_PATH", "./config/themes.yaml"));

    let db_max_connections = parse_u32("REELBOT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REELBOT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REELBOT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let publish_interval_secs = parse_positive_u64("REELBOT_PUBLISH_INTERVAL_SECS", "300")?;
    let publish_max_retries = parse_u32("REELBOT_PUBLISH_MAX_RETRIES", "3")?;
    if publish_max_retries == 0 {
        return Err(invalid(
            "REELBOT_PUBLISH_MAX_RETRIES",
            "must allow at least one attempt".to_string(),
        ));
    }
    let publish_backoff_base_secs = parse_u64("REELBOT_PUBLISH_BACKOFF_BASE_SECS", "300")?;
    let publish_backoff_max_secs = parse_u64("REELBOT_PUBLISH_BACKOFF_MAX_SECS", "21600")?;
    let publish_timeout_secs = parse_positive_u64("REELBOT_PUBLISH_TIMEOUT_SECS", "120")?;
    let publish_batch_limit = i64::try_from(parse_positive_u64("REELBOT_PUBLISH_BATCH_LIMIT", "25")?)
        .map_err(|e| invalid("REELBOT_PUBLISH_BATCH_LIMIT", e.to_string()))?;

    let metrics_interval_secs = parse_positive_u64("REELBOT_METRICS_INTERVAL_SECS", "10800")?;
    let metrics_maturation_secs = parse_u64("REELBOT_METRICS_MATURATION_SECS", "3600")?;
    let metrics_timeout_secs = parse_positive_u64("REELBOT_METRICS_TIMEOUT_SECS", "30")?;

    let selection_freshness_days = parse_u32("REELBOT_SELECTION_FRESHNESS_DAYS", "7")?;
    let selection_dampening = or_default("REELBOT_SELECTION_DAMPENING", "0.2")
        .parse::<f64>()
        .map_err(|e| invalid("REELBOT_SELECTION_DAMPENING", e.to_string()))?;
    if !(selection_dampening > 0.0 && selection_dampening <= 1.0) {
        return Err(invalid(
            "REELBOT_SELECTION_DAMPENING",
            format!("{selection_dampening} is outside (0, 1]"),
        ));
    }

    let generate_interval_secs = parse_positive_u64("REELBOT_GENERATE_INTERVAL_SECS", "21600")?;
    let queue_target = parse_u32("REELBOT_QUEUE_TARGET", "7")?;
    let queue_low_watermark = parse_u32("REELBOT_QUEUE_LOW_WATERMARK", "3")?;

    let posting_slots =
        parse_posting_slots(&or_default("REELBOT_POSTING_SLOTS", DEFAULT_POSTING_SLOTS))
            .map_err(|e| invalid("REELBOT_POSTING_SLOTS", e.to_string()))?;

    let render_command = optional("REELBOT_RENDER_COMMAND");
    let graph_access_token = optional("REELBOT_GRAPH_ACCESS_TOKEN");
    let graph_user_id = optional("REELBOT_GRAPH_USER_ID");
    let graph_base_url = or_default("REELBOT_GRAPH_BASE_URL", DEFAULT_GRAPH_BASE_URL);
    let media_base_url = optional("REELBOT_MEDIA_BASE_URL");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        themes_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        publish_interval_secs,
        publish_max_retries,
        publish_backoff_base_secs,
        publish_backoff_max_secs,
        publish_timeout_secs,
        publish_batch_limit,
        metrics_interval_secs,
        metrics_maturation_secs,
        metrics_timeout_secs,
        selection_freshness_days,
        selection_dampening,
        generate_interval_secs,
        queue_target,
        queue_low_watermark,
        posting_slots,
        render_command,
        graph_access_token,
        graph_user_id,
        graph_base_url,
        media_base_url,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
