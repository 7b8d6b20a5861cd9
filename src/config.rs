//! Server configuration resolved from CLI flags, then environment, then defaults.

use anyhow::{Result, anyhow};
use std::net::IpAddr;

use crate::identity::MIN_KEY_LEN;

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

pub const USAGE: &str = "Global Safety Server\n\nUSAGE:\n  globalsafety_server [--bind ADDR] [--http-port N] [--session-secret S] [--session-ttl-hours N] [--secure-cookies [bool]|--insecure-cookies]\n\nOPTIONS:\n  --bind ADDR              Listen address (env: GLOBALSAFETY_BIND, default 0.0.0.0)\n  --http-port N            HTTP port (env: GLOBALSAFETY_HTTP_PORT, default 3000)\n  --session-secret S       Session signing secret, at least 32 bytes (env: GLOBALSAFETY_SESSION_SECRET, default random per process)\n  --session-ttl-hours N    Session lifetime in hours (env: GLOBALSAFETY_SESSION_TTL_HOURS, default 24)\n  --secure-cookies [bool]  Mark the session cookie Secure (env: GLOBALSAFETY_SECURE_COOKIES, default true)\n  --insecure-cookies       Disable the Secure cookie flag (plain-HTTP development).\n";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub http_port: u16,
    pub session_secret: Option<String>,
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            http_port: DEFAULT_HTTP_PORT,
            session_secret: None,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            secure_cookies: true,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_secure_arg(args: &[String]) -> Option<bool> {
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if a == "--insecure-cookies" {
            return Some(false);
        }
        if a == "--secure-cookies" {
            // Presence enables unless followed by an explicit boolean
            if let Some(next) = args.get(i + 1) {
                if !next.starts_with('-') {
                    return Some(parse_bool(next).unwrap_or(true));
                }
            }
            return Some(true);
        }
        i += 1;
    }
    None
}

impl ServerConfig {
    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::from_sources(args, |name| std::env::var(name).ok())
    }

    /// Resolve each setting as CLI flag > `env(name)` > default.
    pub fn from_sources<F>(args: &[String], env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = ServerConfig::default();

        let bind = match arg_value(args, "--bind").or_else(|| env("GLOBALSAFETY_BIND")) {
            Some(v) => v.parse::<IpAddr>().map_err(|e| anyhow!("invalid bind address '{}': {}", v, e))?,
            None => d.bind,
        };
        let http_port = match arg_value(args, "--http-port").or_else(|| env("GLOBALSAFETY_HTTP_PORT")) {
            Some(v) => v.parse::<u16>().map_err(|e| anyhow!("invalid http port '{}': {}", v, e))?,
            None => d.http_port,
        };
        let session_ttl_hours = match arg_value(args, "--session-ttl-hours").or_else(|| env("GLOBALSAFETY_SESSION_TTL_HOURS")) {
            Some(v) => v.parse::<i64>().map_err(|e| anyhow!("invalid session ttl '{}': {}", v, e))?,
            None => d.session_ttl_hours,
        };
        if session_ttl_hours <= 0 || session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(anyhow!("session ttl must be between 1 and {} hours, got {}", MAX_SESSION_TTL_HOURS, session_ttl_hours));
        }
        let session_secret = arg_value(args, "--session-secret").or_else(|| env("GLOBALSAFETY_SESSION_SECRET"));
        if let Some(s) = &session_secret {
            if s.len() < MIN_KEY_LEN {
                return Err(anyhow!("session secret must be at least {} bytes", MIN_KEY_LEN));
            }
        }
        let secure_cookies = parse_secure_arg(args)
            .or_else(|| env("GLOBALSAFETY_SECURE_COOKIES").and_then(|v| parse_bool(&v)))
            .unwrap_or(d.secure_cookies);

        Ok(Self { bind, http_port, session_secret, session_ttl_hours, secure_cookies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| m.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = ServerConfig::from_sources(&[], env_of(&[])).unwrap();
        assert_eq!(c.http_port, 3000);
        assert_eq!(c.session_ttl_hours, 24);
        assert!(c.secure_cookies);
        assert!(c.session_secret.is_none());
        assert_eq!(c.bind.to_string(), "0.0.0.0");
    }

    #[test]
    fn args_override_env() {
        let env = env_of(&[("GLOBALSAFETY_HTTP_PORT", "8080"), ("GLOBALSAFETY_SESSION_TTL_HOURS", "2")]);
        let c = ServerConfig::from_sources(&args(&["srv", "--http-port", "9090"]), env).unwrap();
        assert_eq!(c.http_port, 9090);
        assert_eq!(c.session_ttl_hours, 2);
    }

    #[test]
    fn cookie_security_flags() {
        let c = ServerConfig::from_sources(&args(&["--insecure-cookies"]), env_of(&[])).unwrap();
        assert!(!c.secure_cookies);
        let c = ServerConfig::from_sources(&args(&["--secure-cookies", "false"]), env_of(&[("GLOBALSAFETY_SECURE_COOKIES", "true")])).unwrap();
        assert!(!c.secure_cookies);
        let c = ServerConfig::from_sources(&[], env_of(&[("GLOBALSAFETY_SECURE_COOKIES", "off")])).unwrap();
        assert!(!c.secure_cookies);
        let c = ServerConfig::from_sources(&args(&["--secure-cookies", "--http-port", "1"]), env_of(&[])).unwrap();
        assert!(c.secure_cookies);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServerConfig::from_sources(&args(&["--http-port", "nope"]), env_of(&[])).is_err());
        assert!(ServerConfig::from_sources(&args(&["--session-ttl-hours", "0"]), env_of(&[])).is_err());
        assert!(ServerConfig::from_sources(&args(&["--session-ttl-hours", "100000"]), env_of(&[])).is_err());
        assert!(ServerConfig::from_sources(&args(&["--bind", "localhost:1"]), env_of(&[])).is_err());
        assert!(ServerConfig::from_sources(&[], env_of(&[("GLOBALSAFETY_SESSION_SECRET", "short")])).is_err());
        let long = "x".repeat(32);
        let c = ServerConfig::from_sources(&[], env_of(&[("GLOBALSAFETY_SESSION_SECRET", long.as_str())])).unwrap();
        assert_eq!(c.session_secret.as_deref(), Some(long.as_str()));
    }
}
