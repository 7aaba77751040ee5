//! Push-event subscriptions.
//!
//! A [`Subscription`] is the receiving end of one event stream. The owning
//! thread drains it with [`Subscription::poll`] or [`Subscription::wait`];
//! producers run elsewhere (a reader thread for [`HttpEventFeed`], any
//! caller for [`EventBus`]). Dropping the subscription cancels the producer
//! side and discards anything still queued.

use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::PushEvent;
use super::codec::decode_line;
use crate::remote::RemoteError;
use crate::remote::http::{join_segments, map_ureq_error, parse_base_url};

/// Anything that can open an event stream for an authenticated user.
pub trait EventSource {
    /// Open a stream keyed by the session's bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the stream cannot be opened or the token
    /// is refused.
    fn subscribe(&self, token: &str) -> Result<Subscription, RemoteError>;
}

/// Result of polling a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Event(PushEvent),
    /// Nothing queued right now.
    Idle,
    /// The producer is gone; no further events will arrive.
    Closed,
}

/// Receiving end of one event stream.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<PushEvent>,
    cancel: Arc<AtomicBool>,
    source: String,
}

impl Subscription {
    fn new(rx: Receiver<PushEvent>, cancel: Arc<AtomicBool>, source: String) -> Self {
        Self { rx, cancel, source }
    }

    /// Human label of where events come from (URL or bus name).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Take the next queued event without blocking.
    #[must_use]
    pub fn poll(&self) -> Delivery {
        match self.rx.try_recv() {
            Ok(event) => Delivery::Event(event),
            Err(TryRecvError::Empty) => Delivery::Idle,
            Err(TryRecvError::Disconnected) => Delivery::Closed,
        }
    }

    /// Block up to `timeout` for the next event.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Delivery {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Delivery::Event(event),
            Err(RecvTimeoutError::Timeout) => Delivery::Idle,
            Err(RecvTimeoutError::Disconnected) => Delivery::Closed,
        }
    }

    /// Release the stream. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        debug!(source = %self.source, "event subscription released");
    }
}

// ---------------------------------------------------------------------------
// In-process bus
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BusSubscriber {
    tx: Sender<PushEvent>,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct BusInner {
    subscribers: Vec<BusSubscriber>,
    required_token: Option<String>,
}

/// In-process event source: every published event reaches every live
/// subscription in publish order.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept subscriptions presenting `token`.
    #[must_use]
    pub fn requiring_token(token: impl Into<String>) -> Self {
        let bus = Self::default();
        bus.lock().required_token = Some(token.into());
        bus
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` to all live subscriptions. Returns how many got it.
    pub fn publish(&self, event: &PushEvent) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|sub| {
            !sub.cancel.load(Ordering::Acquire) && sub.tx.send(event.clone()).is_ok()
        });
        inner.subscribers.len()
    }

    /// Number of subscriptions that have not been released.
    #[must_use]
    pub fn live_subscribers(&self) -> usize {
        let mut inner = self.lock();
        inner
            .subscribers
            .retain(|sub| !sub.cancel.load(Ordering::Acquire));
        inner.subscribers.len()
    }

    /// Drop every subscription's producer side, closing their streams.
    pub fn close(&self) {
        self.lock().subscribers.clear();
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, token: &str) -> Result<Subscription, RemoteError> {
        let mut inner = self.lock();
        if inner
            .required_token
            .as_deref()
            .is_some_and(|required| required != token)
        {
            return Err(RemoteError::Rejected {
                status: 401,
                message: "Unauthorized".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        inner.subscribers.push(BusSubscriber {
            tx,
            cancel: Arc::clone(&cancel),
        });
        Ok(Subscription::new(rx, cancel, "bus".to_string()))
    }
}

// ---------------------------------------------------------------------------
// HTTP stream
// ---------------------------------------------------------------------------

/// Upper bound on how long a released HTTP stream keeps its connection.
///
/// Each socket read gives up after this long so the reader thread can see
/// the release and drop the response.
pub const STREAM_READ_POLL: Duration = Duration::from_secs(1);

/// Event stream read from a long-lived HTTP response, one event per line.
#[derive(Debug, Clone)]
pub struct HttpEventFeed {
    agent: ureq::Agent,
    url: Url,
}

impl HttpEventFeed {
    /// Build a feed for `path` under `base_url`.
    ///
    /// Connecting is bounded by `connect_timeout`. The stream itself stays
    /// open until the server closes it or the subscription is dropped, at
    /// which point the connection is closed within [`STREAM_READ_POLL`].
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] for an invalid base URL.
    pub fn new(
        base_url: &str,
        path: &str,
        connect_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base = parse_base_url(base_url)?;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(STREAM_READ_POLL)
            .build();
        Ok(Self {
            agent,
            url: join_segments(&base, &segments),
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl EventSource for HttpEventFeed {
    fn subscribe(&self, token: &str) -> Result<Subscription, RemoteError> {
        let response = self
            .agent
            .get(self.url.as_str())
            .set("Accept", "application/x-ndjson")
            .set("Authorization", &format!("Bearer {token}"))
            .call()
            .map_err(map_ureq_error)?;

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let reader_cancel = Arc::clone(&cancel);
        let reader = BufReader::new(response.into_reader());
        let source = self.url.to_string();
        let thread_source = source.clone();

        thread::Builder::new()
            .name("tally-events".to_string())
            .spawn(move || {
                let forwarded = forward_lines(reader, &tx, &reader_cancel);
                info!(source = %thread_source, forwarded, "event stream ended");
            })
            .map_err(|err| RemoteError::Transport(format!("failed to start event reader: {err}")))?;

        info!(source = %source, "subscribed to event stream");
        Ok(Subscription::new(rx, cancel, source))
    }
}

/// Decode lines from `reader` and forward events until EOF, a read error,
/// cancellation, or the receiver going away. Malformed lines are skipped.
///
/// Read timeouts are not errors: they only give the loop a chance to notice
/// cancellation. A line split across a timeout is kept and completed by the
/// next read.
fn forward_lines<R: BufRead>(mut reader: R, tx: &Sender<PushEvent>, cancel: &AtomicBool) -> usize {
    let mut forwarded = 0;
    let mut buf = Vec::new();
    while !cancel.load(Ordering::Acquire) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => {
                warn!("event stream read failed: {err}");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        match decode_line(&line) {
            Ok(Some(event)) => {
                if tx.send(event).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(err) => warn!("skipping malformed event line: {err}"),
        }
        buf.clear();
    }
    forwarded
}
