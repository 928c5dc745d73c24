use std::time::Duration;

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default period between two harvests.
pub const DEFAULT_HARVEST_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on buffered items (or distinct series) per batch.
pub const DEFAULT_MAX_PENDING: usize = 10_000;

/// How long `stop` waits for the final harvest by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for a whole HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of idle pooled connections kept per host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Default time an idle pooled connection is kept alive.
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

lazy_static::lazy_static! {
    pub static ref USER_AGENT: String = format!("NewRelic-Rust-TelemetrySDK/{}", VERSION);
}
