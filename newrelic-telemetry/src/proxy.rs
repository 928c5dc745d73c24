use reqwest::Proxy;
use url::Url;

use newrelic_telemetry_core::{Error, ProxyConfig};

/// Resolves the basic auth credentials of a proxy.
///
/// Explicit credentials win over the userinfo of the URL.  Credentials from
/// the URL are used as they appear there, percent-encoding included.
pub(crate) fn credentials(config: &ProxyConfig, url: &Url) -> Option<(String, String)> {
    if let Some(ref username) = config.username {
        return Some((username.clone(), config.password.clone().unwrap_or_default()));
    }
    if url.username().is_empty() {
        return None;
    }
    Some((
        url.username().to_owned(),
        url.password().unwrap_or_default().to_owned(),
    ))
}

/// Builds the proxy for a configuration, or `None` if the proxy cannot be
/// used.
///
/// Only `http://` proxies are supported, requests to https endpoints are
/// tunnelled with `CONNECT`.  Other schemes are ignored with a warning.
pub(crate) fn build_proxy(config: &ProxyConfig) -> Result<Option<Proxy>, Error> {
    let mut url = Url::parse(&config.url)
        .map_err(|err| Error::InvalidConfig(format!("invalid proxy url: {err}")))?;

    if url.scheme() != "http" {
        log::warn!(
            "Contacting https destinations through {} proxies is not supported.",
            url.scheme()
        );
        return Ok(None);
    }
    log::info!(
        "Using proxy host={:?} port={:?}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default()
    );

    let auth = credentials(config, &url);
    // credentials are sent through basic_auth only
    let _ = url.set_username("");
    let _ = url.set_password(None);

    let mut proxy = Proxy::all(url.as_str())
        .map_err(|err| Error::InvalidConfig(format!("invalid proxy url: {err}")))?;
    if let Some((username, password)) = auth {
        proxy = proxy.basic_auth(&username, &password);
    }
    Ok(Some(proxy))
}
