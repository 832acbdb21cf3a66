//! Daemon configuration from `ENTITLE_*` environment variables

use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_DB_PATH: &str = "~/.entitle/jobs.db";
const DEFAULT_EXPORT_DIR: &str = "~/.entitle/exports";
const DEFAULT_RPC_PORT: u16 = 9628;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_RETENTION_DAYS: i64 = 7;
const DEFAULT_MAINTENANCE_INTERVAL_HOURS: u64 = 24;
const MAX_RETENTION_DAYS: i64 = 36_500;
const MAX_MAINTENANCE_INTERVAL_HOURS: u64 = 8_760;

/// Console log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("unknown log format '{}' (expected json or pretty)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_port: u16,
    pub workers: usize,
    pub export_dir: PathBuf,
    pub retention_days: i64,
    pub maintenance_interval_hours: u64,
    pub log_format: LogFormat,
    /// Daily rolling log files are written here when set
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = match lookup("ENTITLE_DB_PATH") {
            // sqlx connection strings pass through untouched
            Some(url) if url.starts_with("sqlite:") => url,
            Some(path) => expand(&path),
            None => expand(DEFAULT_DB_PATH),
        };

        let workers = parse_or(&lookup, "ENTITLE_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            bail!("ENTITLE_WORKERS must be at least 1");
        }

        let retention_days = parse_or(&lookup, "ENTITLE_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        if !(0..=MAX_RETENTION_DAYS).contains(&retention_days) {
            bail!(
                "ENTITLE_RETENTION_DAYS must be between 0 and {}",
                MAX_RETENTION_DAYS
            );
        }

        let maintenance_interval_hours = parse_or(
            &lookup,
            "ENTITLE_MAINTENANCE_INTERVAL_HOURS",
            DEFAULT_MAINTENANCE_INTERVAL_HOURS,
        )?;
        if maintenance_interval_hours > MAX_MAINTENANCE_INTERVAL_HOURS {
            bail!(
                "ENTITLE_MAINTENANCE_INTERVAL_HOURS must be at most {}",
                MAX_MAINTENANCE_INTERVAL_HOURS
            );
        }

        Ok(Self {
            db_path,
            rpc_port: parse_or(&lookup, "ENTITLE_RPC_PORT", DEFAULT_RPC_PORT)?,
            workers,
            export_dir: expand(
                &lookup("ENTITLE_EXPORT_DIR").unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string()),
            )
            .into(),
            retention_days,
            maintenance_interval_hours,
            log_format: parse_or(&lookup, "ENTITLE_LOG_FORMAT", LogFormat::Pretty)?,
            log_dir: lookup("ENTITLE_LOG_DIR").map(|dir| expand(&dir).into()),
        })
    }
}

fn expand(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value '{}' for {}", raw, key)),
    }
}
