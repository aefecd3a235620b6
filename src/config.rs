use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 4000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    /// Insert the default users into an empty database on startup
    pub seed_users: bool,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let bind = match lookup("COURIER_BIND") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("COURIER_BIND is not an IP address: {raw}"))?,
            None => IpAddr::from([0, 0, 0, 0]),
        };

        // We default to ~/.courier/courier.db
        let db_path = match lookup("COURIER_DB") {
            Some(raw) => PathBuf::from(raw),
            None => {
                let home_dir = lookup("HOME").unwrap_or_else(|| ".".into());
                PathBuf::from(home_dir).join(".courier").join("courier.db")
            }
        };

        let seed_users = match lookup("COURIER_SEED_USERS") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("COURIER_SEED_USERS is not a boolean: {raw}"))?,
            None => true,
        };

        Ok(Self {
            bind,
            port,
            db_path,
            seed_users,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
