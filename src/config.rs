use std::str::FromStr;

use anyhow::{anyhow, Context};
use url::Url;

use crate::AppResult;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    /// Base of every share link handed out.
    pub public_url: Url,
    pub db_max_connections: u32,
    pub session_inactivity_minutes: i64,
    pub feed_capacity: usize,
    pub max_image_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_owned(),
            database_url: "sqlite://confessio.db?mode=rwc".to_owned(),
            public_url: Url::parse("http://localhost:8080").expect("static url"),
            db_max_connections: 16,
            session_inactivity_minutes: 60,
            feed_capacity: 256,
            max_image_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let defaults = Config::default();

        let public_url = match lookup("PUBLIC_URL") {
            Some(raw) => {
                let url = Url::parse(&raw).with_context(|| format!("invalid PUBLIC_URL {raw:?}"))?;
                if url.cannot_be_a_base() {
                    return Err(anyhow!("PUBLIC_URL {raw:?} can't be a base url").into());
                }
                url
            }
            None => defaults.public_url,
        };

        Ok(Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            public_url,
            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            session_inactivity_minutes: parse(&lookup, "SESSION_INACTIVITY_MINUTES", defaults.session_inactivity_minutes)?,
            feed_capacity: parse(&lookup, "FEED_CAPACITY", defaults.feed_capacity)?,
            max_image_bytes: parse(&lookup, "MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key} {raw:?}: {e}").into()),
        None => Ok(default),
    }
}
