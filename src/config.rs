use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3003";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub min_lead_minutes: i64,
    pub refresh_interval: Duration,
    pub store_poll_interval: Duration,
    pub cors_origin: String,
}

impl Settings {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = parse_or(&lookup, "BIND_ADDR", || {
            SocketAddr::from(([0, 0, 0, 0], 8000))
        })?;
        let min_lead_minutes = parse_or(&lookup, "MIN_LEAD_MINUTES", || {
            crate::care::schedule::DEFAULT_MIN_LEAD_MINUTES
        })?;
        if min_lead_minutes < 0 {
            return Err(ConfigError::Invalid {
                name: "MIN_LEAD_MINUTES",
                value: min_lead_minutes.to_string(),
            });
        }
        let refresh_secs = positive(
            parse_or(&lookup, "REFRESH_INTERVAL_SECS", || 60)?,
            "REFRESH_INTERVAL_SECS",
        )?;
        let poll_secs = positive(
            parse_or(&lookup, "STORE_POLL_INTERVAL_SECS", || 5)?,
            "STORE_POLL_INTERVAL_SECS",
        )?;
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string());

        Ok(Self {
            database_url,
            bind_addr,
            min_lead_minutes,
            refresh_interval: Duration::from_secs(refresh_secs),
            store_poll_interval: Duration::from_secs(poll_secs),
            cors_origin,
        })
    }
}

fn parse_or<T, F, D>(lookup: &F, name: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
    D: FnOnce() -> T,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default()),
    }
}

fn positive(value: u64, name: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/plants")]).unwrap();
        assert_eq!(s.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(s.min_lead_minutes, 1);
        assert_eq!(s.refresh_interval, Duration::from_secs(60));
        assert_eq!(s.store_poll_interval, Duration::from_secs(5));
        assert_eq!(s.cors_origin, DEFAULT_CORS_ORIGIN);
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(settings(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn bad_values_are_reported_by_name() {
        let err = settings(&[
            ("DATABASE_URL", "postgres://localhost/plants"),
            ("REFRESH_INTERVAL_SECS", "soon"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "REFRESH_INTERVAL_SECS has an invalid value 'soon'"
        );

        let err = settings(&[
            ("DATABASE_URL", "postgres://localhost/plants"),
            ("STORE_POLL_INTERVAL_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE_POLL_INTERVAL_SECS", .. }));
    }
}
