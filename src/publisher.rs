use crate::{
    error::Error,
    gauge::{CyclingGauge, Timestamps},
    line::Series,
    throttle::LogThrottle,
    transport::{HttpTransport, SendError, Transport, UdpTransport},
};
use crossbeam::channel::{Receiver, TryRecvError, select};
use std::{
    ffi::OsString,
    io,
    time::{Duration, Instant, SystemTime},
};

/// Collector endpoint used when none is configured.
pub const DEFAULT_URL: &str = "http://telegraf:8186/telegraf";

/// Builder for the [`Publisher`].
#[derive(Debug, Clone)]
pub struct Builder {
    url: String,
    measurement: String,
    tags: Vec<(String, String)>,
    step: f64,
    modulus: f64,
    pacing_interval: Duration,
    summary_interval: Duration,
    failure_log_interval: Duration,
    timeout: Option<Duration>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            url: DEFAULT_URL.to_owned(),
            measurement: "value".to_owned(),
            tags: vec![],
            step: 0.1,
            modulus: 10.0,
            pacing_interval: Duration::from_millis(100),
            summary_interval: Duration::from_secs(5),
            failure_log_interval: Duration::ZERO,
            timeout: Some(Duration::from_secs(1)),
        }
    }

    /// Collector endpoint receiving the POST requests.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Measurement name of the series.
    ///
    /// Default is `value`.
    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    /// Add a static tag attached to every sample.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Add a `hostname` tag with the name of this machine, if it can be
    /// resolved.
    pub fn hostname_tag(self) -> Self {
        self.resolved_hostname_tag(hostname::get())
    }

    fn resolved_hostname_tag(self, resolved: io::Result<OsString>) -> Self {
        match resolved.map(|name| name.into_string()) {
            Ok(Ok(name)) if name.is_empty() => {
                tracing::warn!("Hostname is empty, skipping tag");
                self
            }
            Ok(Ok(name)) => self.tag("hostname", name),
            Ok(Err(raw)) => {
                tracing::warn!("Hostname {:?} is not valid UTF-8, skipping tag", raw);
                self
            }
            Err(err) => {
                tracing::warn!("Could not resolve hostname, skipping tag: {}", err);
                self
            }
        }
    }

    /// Amount added to the gauge after every successful send.
    ///
    /// Default is 0.1.
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Value at which the gauge wraps back to zero.
    ///
    /// Default is 10.
    pub fn modulus(mut self, modulus: f64) -> Self {
        self.modulus = modulus;
        self
    }

    /// Change the delay between two sends.
    ///
    /// Default is 0.1s.
    pub fn pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    /// Minimum time between two "published N measurements" lines.
    ///
    /// Default is 5s.
    pub fn summary_interval(mut self, interval: Duration) -> Self {
        self.summary_interval = interval;
        self
    }

    /// Minimum time between two logged send failures. Zero logs every
    /// failure.
    ///
    /// Default is zero.
    pub fn failure_log_interval(mut self, interval: Duration) -> Self {
        self.failure_log_interval = interval;
        self
    }

    /// Upper bound for one whole request, or for one blocking datagram
    /// send over UDP. `None` never times out.
    ///
    /// Default is 1s.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a publisher sending over HTTP.
    pub fn build(self) -> Result<Publisher<HttpTransport>, Error> {
        validate_url(&self.url)?;
        let transport = HttpTransport::new(self.url.clone(), self.timeout);
        self.build_with_transport(transport)
    }

    /// Build a publisher sending one datagram per sample to `addr`, a
    /// `host:port` pair such as the collector's socket listener.
    pub fn build_udp(self, addr: &str) -> Result<Publisher<UdpTransport>, Error> {
        let transport =
            UdpTransport::new(addr, self.timeout).map_err(|err| Error::InvalidAddress {
                addr: addr.to_owned(),
                reason: err.to_string(),
            })?;
        self.build_with_transport(transport)
    }

    /// Build a publisher around any transport.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<Publisher<T>, Error> {
        if self.measurement.is_empty() {
            return Err(Error::EmptyMeasurement);
        }

        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::InvalidStep(self.step));
        }

        if !(self.modulus.is_finite() && self.modulus > 0.0) {
            return Err(Error::InvalidModulus(self.modulus));
        }

        reject_control(&self.measurement)?;

        let mut series = Series::new(self.measurement);
        for (key, value) in self.tags {
            if key.is_empty() || value.is_empty() {
                return Err(Error::InvalidTag { key, value });
            }
            reject_control(&key)?;
            reject_control(&value)?;
            series = series.with_tag(key, value);
        }

        let now = Instant::now();

        Ok(Publisher {
            transport,
            series,
            gauge: CyclingGauge::new(self.step, self.modulus),
            timestamps: Timestamps::new(),
            publish_count: 0,
            attempts: 0,
            summary: LogThrottle::new(self.summary_interval, now),
            failures: LogThrottle::new(self.failure_log_interval, now),
            pacing_interval: self.pacing_interval,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// A newline would split the record on the wire.
fn reject_control(raw: &str) -> Result<(), Error> {
    if raw.chars().any(char::is_control) {
        return Err(Error::ControlCharacter(raw.to_owned()));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), Error> {
    let invalid = |reason: &str| Error::InvalidUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let uri: ureq::http::Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;

    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("missing scheme")),
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }

    Ok(())
}

/// Result of one publish attempt.
#[derive(Debug)]
pub enum Outcome {
    Published { value: f64, timestamp_ns: i64 },
    Failed(SendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopping,
}

/// What a finished [`Publisher::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub attempts: u64,
    pub published: u64,
    pub interrupted: bool,
}

/// Publishes the cycling gauge to the collector, one sample per iteration.
pub struct Publisher<T: Transport> {
    transport: T,
    series: Series,
    gauge: CyclingGauge,
    timestamps: Timestamps,
    publish_count: u64,
    attempts: u64,
    summary: LogThrottle,
    failures: LogThrottle,
    pacing_interval: Duration,
}

impl<T: Transport> Publisher<T> {
    /// Number of samples the collector accepted at transport level.
    pub fn publish_count(&self) -> u64 {
        self.publish_count
    }

    /// Number of send attempts, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Value the next sample will carry.
    pub fn value(&self) -> f64 {
        self.gauge.value()
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one sample stamped with `now`.
    ///
    /// Only a successful send advances the gauge and the publish count.
    pub fn publish_once(&mut self, now: SystemTime) -> Outcome {
        self.attempts += 1;

        let value = self.gauge.value();
        let timestamp_ns = self.timestamps.next(now);
        let line = self.series.format_line(value, timestamp_ns);

        match self.transport.send(&line) {
            Ok(()) => {
                self.gauge.advance();
                self.publish_count += 1;
                Outcome::Published {
                    value,
                    timestamp_ns,
                }
            }
            Err(err) => Outcome::Failed(err),
        }
    }

    fn report(&mut self, outcome: &Outcome, now: Instant) {
        match outcome {
            Outcome::Published { .. } => {
                if self.summary.ready(now) {
                    tracing::info!("published {} measurements", self.publish_count);
                }
            }
            Outcome::Failed(err) => {
                if self.failures.ready(now) {
                    let suppressed = self.failures.take_suppressed();
                    if suppressed > 0 {
                        tracing::error!("Send failed: {} ({} more not shown)", err, suppressed);
                    } else {
                        tracing::error!("Send failed: {}", err);
                    }
                } else {
                    self.failures.suppress();
                }
            }
        }
    }

    /// Publish until a message arrives on `shutdown` or, if given,
    /// `max_iterations` attempts were made.
    ///
    /// Shutdown is observed between iterations only, so an in-flight send
    /// always completes first. Disconnecting every sender also stops the
    /// loop.
    pub fn run(&mut self, shutdown: &Receiver<()>, max_iterations: Option<u64>) -> RunSummary {
        let mut state = RunState::Running;
        let mut interrupted = false;
        let mut iterations = 0u64;
        let limit_reached = |iterations: u64| max_iterations.is_some_and(|max| iterations >= max);

        while state == RunState::Running {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => {
                    interrupted = true;
                    state = RunState::Stopping;
                    continue;
                }
                Err(TryRecvError::Empty) => {}
            }

            if limit_reached(iterations) {
                break;
            }

            let outcome = self.publish_once(SystemTime::now());
            self.report(&outcome, Instant::now());
            iterations += 1;

            if limit_reached(iterations) {
                break;
            }

            select! {
                recv(shutdown) -> _ => {
                    interrupted = true;
                    state = RunState::Stopping;
                },
                default(self.pacing_interval) => {},
            }
        }

        if interrupted {
            tracing::info!("Shutting down.");
        } else {
            tracing::info!("Stopping after {} iterations.", iterations);
        }

        RunSummary {
            attempts: self.attempts,
            published: self.publish_count,
            interrupted,
        }
    }

    /// Release the transport and with it the collector connection.
    pub fn close(self) {
        tracing::debug!("Closing publisher after {} samples", self.publish_count);
        drop(self.transport);
    }
}
