use std::env;
use std::time::Duration;

use newrelic_telemetry_core::{ClientOptions, ProxyConfig, DEFAULT_HARVEST_INTERVAL};

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Apply default client options.
///
/// Extends the given `ClientOptions` with default options such as the
/// license key, ingest host, harvest interval and proxy read from the
/// environment.  Options that are already set are left alone.
///
/// The following environment variables are read:
///
/// - `NEW_RELIC_LICENSE_KEY`, falling back to `NEW_RELIC_INSERT_KEY`
/// - `NEW_RELIC_HOST`
/// - `NEW_RELIC_HARVEST_INTERVAL`, in (fractional) seconds, only if the
///   interval is still the default
/// - `HTTPS_PROXY` or `https_proxy`
///
/// # Examples
///
/// ```
/// std::env::set_var("NEW_RELIC_LICENSE_KEY", "my-license-key");
/// let options = newrelic_telemetry::apply_defaults(Default::default());
/// assert_eq!(options.license_key.as_deref(), Some("my-license-key"));
/// ```
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    if opts.license_key.is_none() {
        opts.license_key = non_empty_var("NEW_RELIC_LICENSE_KEY")
            .or_else(|| non_empty_var("NEW_RELIC_INSERT_KEY"));
    }
    if opts.host.is_none() {
        opts.host = non_empty_var("NEW_RELIC_HOST");
    }
    if opts.harvest_interval == DEFAULT_HARVEST_INTERVAL {
        if let Some(raw) = non_empty_var("NEW_RELIC_HARVEST_INTERVAL") {
            let interval = raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            match interval {
                Some(interval) if !interval.is_zero() => opts.harvest_interval = interval,
                _ => log::warn!("Ignoring invalid NEW_RELIC_HARVEST_INTERVAL `{raw}`"),
            }
        }
    }
    if opts.proxy.is_none() {
        opts.proxy = non_empty_var("HTTPS_PROXY")
            .or_else(|| non_empty_var("https_proxy"))
            .map(ProxyConfig::new);
    }
    opts
}
