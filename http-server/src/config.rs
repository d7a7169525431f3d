use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    /// Idle time after which a session is dropped
    pub session_timeout: Duration,
    /// How often idle sessions are swept
    pub session_sweep_interval: Duration,

    pub snapshot_path: PathBuf,
    pub snapshot_interval: Duration,

    /// Pending fill notifications before new ones are dropped
    pub notify_queue: usize,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "0.0.0.0".to_string(),
            port: 6957,
            session_timeout: Duration::from_secs(30 * 60),
            session_sweep_interval: Duration::from_secs(60),
            snapshot_path: PathBuf::from("cross_snapshot.json"),
            snapshot_interval: Duration::from_secs(300),
            notify_queue: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let defaults = Settings::default();

    let session_timeout_secs = parsed_or(
        "CROSS_SESSION_TIMEOUT_SECS",
        defaults.session_timeout.as_secs(),
    );
    let sweep_secs = parsed_or(
        "CROSS_SESSION_SWEEP_SECS",
        defaults.session_sweep_interval.as_secs(),
    );
    let snapshot_secs = parsed_or(
        "CROSS_SNAPSHOT_INTERVAL_SECS",
        defaults.snapshot_interval.as_secs(),
    );

    Settings {
        host: env::var("CROSS_HOST").unwrap_or(defaults.host),
        port: parsed_or("CROSS_PORT", defaults.port),
        session_timeout: Duration::from_secs(session_timeout_secs),
        // tokio intervals panic on a zero period
        session_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
        snapshot_path: env::var("CROSS_SNAPSHOT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_path),
        snapshot_interval: Duration::from_secs(snapshot_secs.max(1)),
        notify_queue: parsed_or("CROSS_NOTIFY_QUEUE", defaults.notify_queue).max(1),
        log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
    }
}
