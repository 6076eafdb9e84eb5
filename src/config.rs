// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : roostoo_dashboard — account dashboard for the Roostoo exchange
Module  : config.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Signs and sends read-only Roostoo REST calls (server time,
          exchange info, balance, order query), serves a small browser
          dashboard with TTL-cached snapshots, and exposes Prometheus metrics.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::env;
use std::net::IpAddr;

use clap::Parser;
use dotenvy::dotenv;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Flag runtime (bukan rahasia). Kredensial tetap dari ENV / .env.
#[derive(Parser, Debug, Clone)]
#[command(name = "roostoo_dashboard", version, about = "Roostoo account dashboard")]
pub struct Cli {
    /// Address the dashboard listens on
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: IpAddr,

    #[arg(long, default_value_t = 8501)]
    pub port: u16,

    /// Snapshot cache TTL; also the browser auto-refresh cadence
    #[arg(long, default_value_t = 60)]
    pub cache_ttl_secs: u64,

    /// Fetch one snapshot, print it as JSON and exit
    #[arg(long)]
    pub once: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("BASE_URL {value:?} is not a valid http(s) URL: {reason}")]
    InvalidBaseUrl { value: String, reason: String },
}

/// API credentials. The secret is only ever exposed to the signer.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: Url,
}

impl Config {
    /// Build from any key lookup. `load()` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // ENV utama dulu, lalu nama lama (ROOSTOO_*) dari dashboard sebelumnya
        let api_key = first_set(&lookup, &["API_KEY", "ROOSTOO_API_KEY"])
            .ok_or(ConfigError::Missing("API_KEY"))?;
        let api_secret = first_set(&lookup, &["API_SECRET", "ROOSTOO_API_SECRET"])
            .ok_or(ConfigError::Missing("API_SECRET"))?;
        let raw_base = first_set(&lookup, &["BASE_URL"]).ok_or(ConfigError::Missing("BASE_URL"))?;

        Ok(Config {
            credentials: Credentials {
                api_key,
                api_secret: SecretString::from(api_secret),
            },
            base_url: parse_base_url(&raw_base)?,
        })
    }

    /// Base URL without trailing slash, ready for `format!("{base}/v3/..")`.
    pub fn base(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

/// First non-blank value among `keys`.
fn first_set<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|&k| lookup(k))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("no host".to_string()));
    }
    Ok(url)
}

pub fn load() -> Result<Config, ConfigError> {
    // Pastikan .env dibaca (API_KEY, API_SECRET, BASE_URL)
    let _ = dotenv();
    Config::from_lookup(|k| env::var(k).ok())
}
