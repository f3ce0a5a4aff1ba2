use crate::lifecycle::ReadyGate;
use anyhow::bail;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "pricedesk-shell")]
pub struct Args {
    /// Path to the worker executable
    #[arg(long, default_value = "")]
    pub worker: String,
    /// Writable per-user data directory handed to the worker
    #[arg(long, default_value = "")]
    pub app_data_dir: String,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    /// Grace period before a hung worker is killed on quit
    #[arg(long, default_value_t = 3)]
    pub grace_seconds: u64,
    /// Splash display time before the main window may appear
    #[arg(long, default_value_t = 1500)]
    pub splash_ms: u64,
    /// Release feed URL; empty disables the background update check
    #[arg(long, default_value = "")]
    pub update_feed: String,
    #[arg(long, default_value_t = 60)]
    pub update_interval_minutes: u64,
    /// Gate the main window on the worker's ready handshake instead of the
    /// splash timer
    #[arg(long, default_value_t = false)]
    pub handshake_gate: bool,
}

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub worker_path: PathBuf,
    pub app_data_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub grace_period: Duration,
    pub splash_delay: Duration,
    pub update_feed: Option<String>,
    pub update_interval: Duration,
    pub ready_gate: ReadyGate,
}

pub fn load(args: Args) -> anyhow::Result<ShellConfig> {
    Ok(ShellConfig {
        worker_path: resolve_worker(&args.worker)?,
        app_data_dir: resolve_app_data_dir(&args.app_data_dir),
        log_dir: resolve_log_dir(&args.log_dir),
        grace_period: Duration::from_secs(args.grace_seconds),
        splash_delay: Duration::from_millis(args.splash_ms),
        update_feed: resolve_update_feed(&args.update_feed),
        update_interval: Duration::from_secs(args.update_interval_minutes * 60),
        ready_gate: resolve_ready_gate(args.handshake_gate),
    })
}

fn resolve_worker(flag: &str) -> anyhow::Result<PathBuf> {
    if !flag.trim().is_empty() {
        return Ok(PathBuf::from(flag));
    }
    if let Ok(value) = env::var("PRICEDESK_WORKER") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    bail!("no worker executable configured; pass --worker or set PRICEDESK_WORKER");
}

fn resolve_app_data_dir(flag: &str) -> PathBuf {
    if !flag.trim().is_empty() {
        return PathBuf::from(flag);
    }
    if let Ok(value) = env::var("PRICEDESK_DATA_DIR") {
        if !value.trim().is_empty() {
            return PathBuf::from(value);
        }
    }
    if let Ok(value) = env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return PathBuf::from(value).join("pricedesk");
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home).join(".local/share/pricedesk");
        }
    }
    PathBuf::from("pricedesk-data")
}

fn resolve_log_dir(flag: &str) -> Option<PathBuf> {
    if !flag.trim().is_empty() {
        return Some(PathBuf::from(flag));
    }
    match env::var("PRICEDESK_LOG_DIR") {
        Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

fn resolve_update_feed(flag: &str) -> Option<String> {
    if !flag.trim().is_empty() {
        return Some(flag.to_string());
    }
    match env::var("PRICEDESK_UPDATE_FEED") {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn resolve_ready_gate(handshake_flag: bool) -> ReadyGate {
    if handshake_flag {
        return ReadyGate::WorkerHandshake;
    }
    match env::var("PRICEDESK_READY_GATE").as_deref() {
        Ok("handshake") => ReadyGate::WorkerHandshake,
        _ => ReadyGate::Timer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_take_precedence() {
        let config = load(Args {
            worker: "/opt/pricedesk/worker".to_string(),
            app_data_dir: "/var/lib/pricedesk".to_string(),
            log_dir: "/var/log/pricedesk".to_string(),
            grace_seconds: 5,
            splash_ms: 900,
            update_feed: "https://releases.example/feed.json".to_string(),
            update_interval_minutes: 30,
            handshake_gate: true,
        })
        .expect("load");

        assert_eq!(config.worker_path, PathBuf::from("/opt/pricedesk/worker"));
        assert_eq!(config.app_data_dir, PathBuf::from("/var/lib/pricedesk"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/pricedesk")));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.splash_delay, Duration::from_millis(900));
        assert_eq!(
            config.update_feed.as_deref(),
            Some("https://releases.example/feed.json")
        );
        assert_eq!(config.update_interval, Duration::from_secs(1800));
        assert_eq!(config.ready_gate, ReadyGate::WorkerHandshake);
    }

    #[test]
    fn empty_update_feed_flag_disables_the_check() {
        assert_eq!(resolve_update_feed("   "), None);
    }

    #[test]
    fn timer_gate_is_the_default() {
        assert_eq!(resolve_ready_gate(false), ReadyGate::Timer);
    }
}
