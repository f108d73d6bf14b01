use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub session_secret: String,
    pub session_issuer: String,
    pub session_ttl_seconds: i64,
    pub allow_dev_sign_in: bool,
}

const DEFAULT_BIND: &str = "127.0.0.1:8443";
const DEFAULT_DATABASE_URL: &str = "sqlite://./data/curator.db";

/// Reads `server.toml` from the working directory, then the environment.
/// Fails when no session secret is configured anywhere.
pub fn load_settings() -> anyhow::Result<Settings> {
    let file = fs::read_to_string("server.toml").ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut server_bind = DEFAULT_BIND.to_string();
    let mut database_url = DEFAULT_DATABASE_URL.to_string();
    let mut session_secret: Option<String> = None;
    let mut session_issuer = "curator".to_string();
    let mut session_ttl_seconds: i64 = 7 * 24 * 3600;
    let mut allow_dev_sign_in = false;

    if let Some(raw) = file {
        let file_cfg: toml::Table = toml::from_str(raw).context("server.toml is not valid TOML")?;
        if let Some(v) = file_cfg.get("bind_addr").and_then(|v| v.as_str()) {
            server_bind = v.to_string();
        }
        if let Some(v) = file_cfg.get("database_url").and_then(|v| v.as_str()) {
            database_url = v.to_string();
        }
        if let Some(v) = file_cfg.get("session_secret").and_then(|v| v.as_str()) {
            session_secret = Some(v.to_string());
        }
        if let Some(v) = file_cfg.get("session_issuer").and_then(|v| v.as_str()) {
            session_issuer = v.to_string();
        }
        if let Some(v) = file_cfg.get("session_ttl_seconds") {
            session_ttl_seconds = v
                .as_integer()
                .context("session_ttl_seconds in server.toml must be an integer")?;
        }
        if let Some(v) = file_cfg.get("allow_dev_sign_in") {
            allow_dev_sign_in = v
                .as_bool()
                .context("allow_dev_sign_in in server.toml must be a boolean")?;
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        database_url = v;
    }

    if let Some(v) = env("SESSION_SECRET") {
        session_secret = Some(v);
    }
    if let Some(v) = env("APP__SESSION_SECRET") {
        session_secret = Some(v);
    }

    if let Some(v) = env("APP__SESSION_ISSUER") {
        session_issuer = v;
    }

    if let Some(v) = env("APP__SESSION_TTL_SECONDS") {
        session_ttl_seconds = v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("APP__SESSION_TTL_SECONDS is not an integer: {v:?}"))?;
    }
    if session_ttl_seconds <= 0 {
        bail!("session ttl must be positive, got {session_ttl_seconds}");
    }

    if let Some(v) = env("APP__ALLOW_DEV_SIGN_IN") {
        allow_dev_sign_in = parse_flag(&v)
            .with_context(|| format!("APP__ALLOW_DEV_SIGN_IN is not a boolean: {v:?}"))?;
    }

    let Some(session_secret) = session_secret.filter(|secret| !secret.trim().is_empty()) else {
        bail!("missing session secret: set SESSION_SECRET or session_secret in server.toml");
    };

    Ok(Settings {
        server_bind,
        database_url,
        session_secret,
        session_issuer,
        session_ttl_seconds,
        allow_dev_sign_in,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite://") {
        if is_windows_drive_path(path) {
            return format!("sqlite:{}", path.replace('\\', "/"));
        }
        return raw_database_url.to_string();
    }

    if raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        if is_windows_drive_path(&path) {
            return format!("sqlite:{path}");
        }
        return format!("sqlite://{path}");
    }

    let path = raw_database_url.replace('\\', "/");
    if is_windows_drive_path(&path) {
        return format!("sqlite:{path}");
    }
    format!("sqlite://{path}")
}

fn is_windows_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
