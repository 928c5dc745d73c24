use std::sync::Arc;

use newrelic_telemetry_core::{
    ClientOptions, Error, EventBatch, Harvester, LogBatch, MetricBatch, SpanBatch,
};

use crate::client::{EventClient, LogClient, MetricClient, SpanClient};
use crate::defaults::apply_defaults;

/// Helper struct that is returned from `init`.
///
/// It gives access to one batch per kind of telemetry.  When this is dropped
/// the harvester is stopped, which sends whatever is still buffered.
#[must_use = "when the init guard is dropped the harvester is stopped and no further \
              telemetry is sent."]
pub struct TelemetryGuard {
    metrics: Arc<MetricBatch>,
    events: Arc<EventBatch>,
    spans: Arc<SpanBatch>,
    logs: Arc<LogBatch>,
    harvester: Harvester,
}

impl TelemetryGuard {
    /// The batch for counts, gauges and summaries.
    pub fn metrics(&self) -> &Arc<MetricBatch> {
        &self.metrics
    }

    /// The batch for custom events.
    pub fn events(&self) -> &Arc<EventBatch> {
        &self.events
    }

    /// The batch for spans.
    pub fn spans(&self) -> &Arc<SpanBatch> {
        &self.spans
    }

    /// The batch for log lines.
    pub fn logs(&self) -> &Arc<LogBatch> {
        &self.logs
    }

    /// The harvester delivering the batches.
    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    /// Stops the harvester now, returning whether the final harvest finished
    /// in time.
    pub fn shutdown(self) -> bool {
        self.harvester.stop()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        log::debug!("dropping telemetry guard -> stopping harvester");
        self.harvester.stop();
    }
}

/// Creates a batch and a client for every kind of telemetry and starts a
/// harvester delivering them.
///
/// Options are completed with [`apply_defaults`] first, so the license key
/// may come from the environment.
///
/// # Examples
///
/// ```no_run
/// use newrelic_telemetry::{attributes, ClientOptions};
///
/// let telemetry = newrelic_telemetry::init(ClientOptions::new().license_key("my-license-key"))?;
/// telemetry
///     .metrics()
///     .record_count("jobs.done", 1.0, attributes! { "queue" => "default" })?;
/// # Ok::<(), newrelic_telemetry::Error>(())
/// ```
pub fn init(options: ClientOptions) -> Result<TelemetryGuard, Error> {
    let options = apply_defaults(options);

    let metrics = Arc::new(MetricBatch::from_options(&options));
    let events = Arc::new(EventBatch::from_options(&options));
    let spans = Arc::new(SpanBatch::from_options(&options));
    let logs = Arc::new(LogBatch::from_options(&options));

    let harvester = Harvester::new(&options);
    harvester.register(metrics.clone(), Arc::new(MetricClient::new(&options)?))?;
    harvester.register(events.clone(), Arc::new(EventClient::new(&options)?))?;
    harvester.register(spans.clone(), Arc::new(SpanClient::new(&options)?))?;
    harvester.register(logs.clone(), Arc::new(LogClient::new(&options)?))?;
    harvester.start()?;

    log::debug!("started harvester with an interval of {:?}", harvester.interval());
    Ok(TelemetryGuard {
        metrics,
        events,
        spans,
        logs,
        harvester,
    })
}
