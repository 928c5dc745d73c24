use std::fmt;
use std::io::Write;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError, RwLock};

use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::blocking::Client as ReqwestClient;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use url::Url;
use uuid::Uuid;

use newrelic_telemetry_core::{
    ClientOptions, Error, MetricSnapshot, Response, Snapshot, Transport,
};
use newrelic_telemetry_types::{
    encode_payload, Common, Event, Log, Metric, Span, TelemetryItem, TelemetryKind,
};

use crate::proxy;

/// Sends metrics to the Metric API.
pub type MetricClient = HttpClient<Metric>;
/// Sends custom events to the Event API.
pub type EventClient = HttpClient<Event>;
/// Sends spans to the Trace API.
pub type SpanClient = HttpClient<Span>;
/// Sends log lines to the Log API.
pub type LogClient = HttpClient<Log>;

/// The default ingest host for a kind of telemetry.
pub fn default_host(kind: TelemetryKind) -> &'static str {
    match kind {
        TelemetryKind::Metric => "metric-api.newrelic.com",
        TelemetryKind::Event => "insights-collector.newrelic.com",
        TelemetryKind::Span => "trace-api.newrelic.com",
        TelemetryKind::Log => "log-api.newrelic.com",
    }
}

/// The request path for a kind of telemetry.
pub fn default_path(kind: TelemetryKind) -> &'static str {
    match kind {
        TelemetryKind::Metric => "/metric/v1",
        TelemetryKind::Event => "/v1/accounts/events",
        TelemetryKind::Span => "/trace/v1",
        TelemetryKind::Log => "/log/v1",
    }
}

fn endpoint_url(options: &ClientOptions, kind: TelemetryKind) -> Result<Url, Error> {
    let host = options.host.as_deref().unwrap_or(default_host(kind));
    let (scheme, host) = if let Some(host) = host.strip_prefix("http://") {
        ("http", host)
    } else if let Some(host) = host.strip_prefix("https://") {
        ("https", host)
    } else {
        ("https", host)
    };
    let host = host.trim_end_matches('/');

    if scheme == "http" && !options.allow_plaintext {
        return Err(Error::InvalidConfig(format!(
            "plaintext endpoint http://{host} requires allow_plaintext"
        )));
    }

    let mut url = Url::parse(&format!("{scheme}://{host}{}", default_path(kind)))
        .map_err(|err| Error::InvalidConfig(format!("invalid host `{host}`: {err}")))?;
    if let Some(port) = options.port {
        url.set_port(Some(port))
            .map_err(|_| Error::InvalidConfig(format!("cannot set port on `{host}`")))?;
    }
    Ok(url)
}

fn build_client(options: &ClientOptions) -> Result<ReqwestClient, Error> {
    let mut builder = ReqwestClient::builder()
        .no_proxy()
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .pool_max_idle_per_host(options.pool_max_idle_per_host)
        .pool_idle_timeout(options.pool_idle_timeout);

    if let Some(ref config) = options.proxy {
        if let Some(proxy) = proxy::build_proxy(config)? {
            builder = builder.proxy(proxy);
        }
    }

    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    {
        for pem in &options.ca_certificates {
            let certificate = reqwest::Certificate::from_pem(pem).map_err(|err| {
                Error::InvalidConfig(format!("invalid CA certificate: {err}"))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        if options.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|err| Error::InvalidConfig(format!("failed to build HTTP client: {err}")))
}

/// Gzips a request body.
pub fn gzip(body: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
    encoder.write_all(body).map_err(Error::transport)?;
    encoder.finish().map_err(Error::transport)
}

/// A blocking HTTP client for one of the ingest APIs.
///
/// The API is picked from the item type: use the [`MetricClient`],
/// [`EventClient`], [`SpanClient`] and [`LogClient`] aliases.  Every client
/// keeps its own connection pool, which is released by [`close`].
///
/// [`close`]: HttpClient::close
///
/// # Examples
///
/// ```no_run
/// use newrelic_telemetry::{ClientOptions, Event, EventClient};
///
/// let client = EventClient::new(&ClientOptions::new().license_key("my-license-key"))?;
/// let response = client.send(Event::new("RateLimitEvent").with_attribute("path", "/v1"))?;
/// assert!(response.ok());
/// # Ok::<(), newrelic_telemetry::Error>(())
/// ```
pub struct HttpClient<T> {
    client: Mutex<Option<ReqwestClient>>,
    url: Url,
    license_key: String,
    user_agent: RwLock<String>,
    compress: bool,
    _item: PhantomData<fn(&T)>,
}

impl<T: TelemetryItem> HttpClient<T> {
    /// Creates a new client from the options.
    pub fn new(options: &ClientOptions) -> Result<Self, Error> {
        Self::new_internal(options, None)
    }

    /// Creates a new client that uses the specified [`ReqwestClient`].
    ///
    /// Proxy, TLS and pool settings of the options are ignored in favor of
    /// the given client.
    pub fn with_client(options: &ClientOptions, client: ReqwestClient) -> Result<Self, Error> {
        Self::new_internal(options, Some(client))
    }

    fn new_internal(options: &ClientOptions, client: Option<ReqwestClient>) -> Result<Self, Error> {
        let license_key = match options.license_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key.to_owned(),
            _ => return Err(Error::InvalidConfig("invalid license key".into())),
        };
        let url = endpoint_url(options, T::KIND)?;
        let client = match client {
            Some(client) => client,
            None => build_client(options)?,
        };

        Ok(HttpClient {
            client: Mutex::new(Some(client)),
            url,
            license_key,
            user_agent: RwLock::new(options.user_agent.to_string()),
            compress: options.compress,
            _item: PhantomData,
        })
    }

    /// The full URL requests are posted to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The current `User-Agent` header value.
    pub fn user_agent(&self) -> String {
        self.user_agent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Appends ` product/version` to the `User-Agent` header.
    pub fn add_version_info(&self, product: &str, version: &str) {
        let mut user_agent = self
            .user_agent
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        user_agent.push_str(&format!(" {product}/{version}"));
    }

    /// Sends a single item.
    pub fn send<I: Into<T>>(&self, item: I) -> Result<Response, Error> {
        self.send_batch(&[item.into()], None)
    }

    /// Sends a list of items with an optional common block.
    ///
    /// The common block is ignored by the event client.  Large lists are not
    /// split; chunking is up to the caller.
    pub fn send_batch(&self, items: &[T], common: Option<&Common>) -> Result<Response, Error> {
        self.post(items, common, Uuid::new_v4())
    }

    /// Closes the connection pool.  Sending afterwards fails.
    pub fn close(&self) {
        if self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            log::debug!("[{}] Closed client for {}", T::KIND.as_str(), self.url);
        }
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn post(&self, items: &[T], common: Option<&Common>, request_id: Uuid) -> Result<Response, Error> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::transport("client closed"))?;

        let mut body = encode_payload(items, common)?;
        if self.compress {
            body = gzip(&body)?;
        }

        let mut request = client
            .post(self.url.clone())
            .header("Api-Key", &self.license_key)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, self.user_agent())
            .header("x-request-id", request_id.to_string());
        if self.compress {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        let response = request.body(body).send().map_err(Error::transport)?;

        let status = response.status().as_u16();
        let mut headers = Vec::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.push((name.as_str().to_owned(), value.to_owned()));
            }
        }
        let body = response.bytes().map_err(Error::transport)?;

        let response = headers
            .into_iter()
            .fold(Response::new(status, body.to_vec()), |response, (name, value)| {
                response.with_header(name, value)
            });
        if !response.ok() {
            log::debug!(
                "[{}] Request {} answered with {}: `{}`",
                T::KIND.as_str(),
                request_id,
                status,
                response.text()
            );
        }
        Ok(response)
    }
}

impl HttpClient<Metric> {
    /// Sends a metric snapshot, using its batch id as request id.
    pub fn send_snapshot(&self, snapshot: &MetricSnapshot) -> Result<Response, Error> {
        self.post(snapshot.metrics(), Some(snapshot.common()), snapshot.batch_id())
    }
}

macro_rules! impl_send_snapshot {
    ($item:ty) => {
        impl HttpClient<$item> {
            /// Sends a snapshot, using its batch id as request id.
            pub fn send_snapshot(&self, snapshot: &Snapshot<$item>) -> Result<Response, Error> {
                self.post(snapshot.items(), snapshot.common(), snapshot.batch_id())
            }
        }

        impl Transport<Snapshot<$item>> for HttpClient<$item> {
            fn send_batch(&self, snapshot: &Snapshot<$item>) -> Result<Response, Error> {
                self.send_snapshot(snapshot)
            }

            fn close(&self) {
                HttpClient::close(self)
            }
        }
    };
}

impl_send_snapshot!(Event);
impl_send_snapshot!(Span);
impl_send_snapshot!(Log);

impl Transport<MetricSnapshot> for HttpClient<Metric> {
    fn send_batch(&self, snapshot: &MetricSnapshot) -> Result<Response, Error> {
        self.send_snapshot(snapshot)
    }

    fn close(&self) {
        HttpClient::close(self)
    }
}

impl<T: TelemetryItem> fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("kind", &T::KIND)
            .field("url", &self.url.as_str())
            .field("user_agent", &self.user_agent())
            .field("compress", &self.compress)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn options() -> ClientOptions {
        ClientOptions::new().license_key("key")
    }

    #[test]
    fn test_default_urls() {
        let cases = [
            (TelemetryKind::Metric, "https://metric-api.newrelic.com/metric/v1"),
            (TelemetryKind::Span, "https://trace-api.newrelic.com/trace/v1"),
            (TelemetryKind::Log, "https://log-api.newrelic.com/log/v1"),
            (
                TelemetryKind::Event,
                "https://insights-collector.newrelic.com/v1/accounts/events",
            ),
        ];
        for (kind, expected) in cases {
            assert_eq!(endpoint_url(&options(), kind).unwrap().as_str(), expected);
        }
    }

    #[test]
    fn test_host_and_port_override() {
        let options = options().host("metric-api.eu.newrelic.com").port(8443);
        assert_eq!(
            endpoint_url(&options, TelemetryKind::Metric).unwrap().as_str(),
            "https://metric-api.eu.newrelic.com:8443/metric/v1"
        );
    }

    #[test]
    fn test_plaintext_requires_opt_in() {
        let options = options().host("http://localhost");
        assert!(matches!(
            endpoint_url(&options, TelemetryKind::Log),
            Err(Error::InvalidConfig(_))
        ));
        let options = options.allow_plaintext(true).port(8080);
        assert_eq!(
            endpoint_url(&options, TelemetryKind::Log).unwrap().as_str(),
            "http://localhost:8080/log/v1"
        );
    }

    #[test]
    fn test_gzip() {
        let compressed = gzip(br#"[{"logs":[]}]"#).unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        let mut decoded = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, r#"[{"logs":[]}]"#);
    }

    #[test]
    fn test_missing_license_key() {
        for options in [ClientOptions::new(), ClientOptions::new().license_key("  ")] {
            match LogClient::new(&options) {
                Err(Error::InvalidConfig(msg)) => assert_eq!(msg, "invalid license key"),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let client = SpanClient::new(&options()).unwrap();
        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());
        match client.send(Span::new("after close")) {
            Err(Error::Transport(err)) => assert_eq!(err.to_string(), "client closed"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_add_version_info() {
        let client = MetricClient::new(&options()).unwrap();
        client.add_version_info("my-product", "1.2.3");
        assert!(client.user_agent().starts_with("NewRelic-Rust-TelemetrySDK/"));
        assert!(client.user_agent().ends_with(" my-product/1.2.3"));
    }
}
