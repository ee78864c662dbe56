//! Connection session management.
//!
//! A [`SessionManager`] owns the lifecycle of one logical connection to a
//! sensor: it opens the transport stream in the background, runs a read loop
//! on it, decodes each record and publishes [`SessionEvent`]s.
//!
//! ```text
//!          connect()            open ok
//!   Idle ─────────────▶ Connecting ─────────▶ Connected
//!    ▲                      │                     │
//!    └──────────────────────┴─────────────────────┘
//!        stop(), open failed, stream failed
//! ```
//!
//! # Cancellation
//!
//! Every connection attempt gets a generation number and a
//! [`CancellationToken`]. `connect`, `attach` and `stop` cancel the current
//! worker and bump the generation under the session lock before anything
//! else happens. A worker only touches session state after re-checking its
//! generation under the same lock, so a superseded attempt can never flip the
//! state back to `Connected` or report a failure that was caused by its own
//! cancellation.
//!
//! # Event ordering
//!
//! State changes are published inside the locked step that performs them, so
//! subscribers observe transitions in the order they happened. Readings come
//! from a single read loop per connection and keep the order of the stream.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use esplink_types::{ConnectionState, DecodeError, DeviceRef, Reading, decode_detailed};

use crate::codec::{Record, RecordCodec};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, SessionEvent};
use crate::metrics::{AtomicSessionMetrics, SessionMetrics};
use crate::options::SessionOptions;
use crate::transport::{BoxedStream, Transport};

type RecordStream = FramedRead<BoxedStream, RecordCodec>;

/// A background task bound to one connection attempt.
struct Worker {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

impl Worker {
    fn cancel(self) {
        self.cancel.cancel();
    }
}

/// Bookkeeping guarded by the session lock.
#[derive(Default)]
struct Session {
    state: ConnectionState,
    device: Option<DeviceRef>,
    generation: u64,
    connector: Option<Worker>,
    reader: Option<Worker>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    options: SessionOptions,
    runtime: Handle,
    events: EventDispatcher,
    metrics: AtomicSessionMetrics,
    session: Mutex<Session>,
}

/// Manager for a single sensor connection.
///
/// All methods are synchronous and may be called from any thread; the
/// background work runs on the tokio runtime captured at construction.
///
/// `SessionManager` intentionally does not implement `Clone`. Wrap it in an
/// `Arc` to share it; dropping it tears the session down.
///
/// # Example
///
/// ```no_run
/// use esplink_core::{SessionEvent, SessionManager, SessionOptions, TcpTransport};
/// use esplink_types::DeviceRef;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let session = SessionManager::new(TcpTransport::new(), SessionOptions::default())?;
///     let mut events = session.subscribe();
///
///     session.connect(DeviceRef::new("192.168.4.1:3333", "Greenhouse"));
///     while let Some(event) = events.recv().await {
///         if let SessionEvent::Reading { reading, .. } = event {
///             println!("{}", reading);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.lock();
        f.debug_struct("SessionManager")
            .field("transport", &self.inner.transport.name())
            .field("state", &session.state)
            .field("device", &session.device)
            .field("generation", &session.generation)
            .finish()
    }
}

impl SessionManager {
    /// Create a session manager on the current tokio runtime.
    ///
    /// Returns [`Error::NoRuntime`] when called outside a runtime, and
    /// [`Error::InvalidConfig`] when `options` do not validate.
    pub fn new(transport: impl Transport, options: SessionOptions) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Self::with_runtime(transport, options, runtime)
    }

    /// Create a session manager that spawns its workers on `runtime`.
    ///
    /// Use this when the manager is created from a thread that is not
    /// running inside the runtime, e.g. a UI thread.
    pub fn with_runtime(
        transport: impl Transport,
        options: SessionOptions,
        runtime: Handle,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                options,
                runtime,
                events: EventDispatcher::new(),
                metrics: AtomicSessionMetrics::new(),
                session: Mutex::new(Session::default()),
            }),
        })
    }

    /// Subscribe to session events published from now on.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// The device of the current attempt or connection, if any.
    pub fn device(&self) -> Option<DeviceRef> {
        self.inner.lock().device.clone()
    }

    /// Snapshot of the session counters.
    pub fn metrics(&self) -> SessionMetrics {
        self.inner.metrics.snapshot()
    }

    /// The options this manager was created with.
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Connect to `device`, replacing any current attempt or connection.
    ///
    /// The previous stream is closed and its worker cancelled first. The
    /// `Connecting` state is published before this returns; the outcome
    /// arrives later as `Connected` or as `Idle` plus `ConnectionFailed`.
    /// Failed attempts are not retried.
    pub fn connect(&self, device: DeviceRef) {
        let inner = &self.inner;
        inner.metrics.record_connect_request();

        let mut session = inner.lock();
        inner.teardown(&mut session);
        session.device = Some(device.clone());
        inner.set_state(&mut session, ConnectionState::Connecting);
        info!("Connecting to {} via {}", device, inner.transport.name());

        let generation = session.generation;
        let cancel = CancellationToken::new();
        let handle = inner.runtime.spawn(Arc::clone(inner).run_connect(
            device,
            generation,
            cancel.clone(),
        ));
        session.connector = Some(Worker {
            cancel,
            _handle: handle,
        });
    }

    /// Adopt an already-open stream to `device`.
    ///
    /// Behaves like a `connect` whose open succeeded immediately: any current
    /// attempt or connection is replaced, then `Connecting` and `Connected`
    /// are published and the read loop starts on `stream`.
    pub fn attach(&self, device: DeviceRef, stream: BoxedStream) {
        let inner = &self.inner;
        inner.metrics.record_connect_request();

        let mut session = inner.lock();
        inner.teardown(&mut session);
        session.device = Some(device.clone());
        inner.set_state(&mut session, ConnectionState::Connecting);
        let generation = session.generation;
        inner.install(&mut session, generation, device, stream);
    }

    /// Close the stream, cancel any worker and return to `Idle`.
    ///
    /// Safe to call in any state; calling it while idle does nothing.
    pub fn stop(&self) {
        let mut session = self.inner.lock();
        if session.state == ConnectionState::Idle
            && session.connector.is_none()
            && session.reader.is_none()
        {
            debug!("stop() while idle");
            return;
        }
        info!("Stopping session");
        self.inner.teardown(&mut session);
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let mut session = self.inner.lock();
        self.inner.teardown(&mut session);
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session is only mutated in short, non-panicking steps.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, session: &mut Session, state: ConnectionState) {
        if session.state == state {
            return;
        }
        debug_assert!(
            session.state.can_transition_to(state),
            "illegal transition {} -> {}",
            session.state,
            state
        );
        info!("State {} -> {}", session.state, state);
        session.state = state;
        self.events.send(SessionEvent::StateChanged { state });
    }

    /// Cancel every worker, invalidate their generation and go idle.
    fn teardown(&self, session: &mut Session) {
        session.generation += 1;
        for worker in [session.connector.take(), session.reader.take()]
            .into_iter()
            .flatten()
        {
            worker.cancel();
            self.metrics.record_cancelled_attempt();
        }
        self.set_state(session, ConnectionState::Idle);
        session.device = None;
    }

    /// Start the read loop on `stream` and go `Connected`.
    fn install(
        self: &Arc<Self>,
        session: &mut Session,
        generation: u64,
        device: DeviceRef,
        stream: BoxedStream,
    ) {
        if let Some(reader) = session.reader.take() {
            reader.cancel();
        }

        let cancel = CancellationToken::new();
        let records = FramedRead::new(stream, RecordCodec::new(self.options.max_line_length));
        let handle = self.runtime.spawn(Arc::clone(self).run_reader(
            device.clone(),
            generation,
            records,
            cancel.clone(),
        ));
        session.reader = Some(Worker {
            cancel,
            _handle: handle,
        });
        self.set_state(session, ConnectionState::Connected);
        info!("Connected to {}", device);
    }

    async fn open(&self, device: &DeviceRef) -> Result<BoxedStream> {
        match self.options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.open(device))
                .await
                .map_err(|_| Error::timeout(format!("open {}", device.address()), limit))?,
            None => self.transport.open(device).await,
        }
    }

    async fn run_connect(self: Arc<Self>, device: DeviceRef, generation: u64, cancel: CancellationToken) {
        let started = Instant::now();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Connect attempt to {} cancelled", device);
                return;
            }
            opened = self.open(&device) => opened,
        };

        match opened {
            Ok(stream) => {
                self.metrics.connect.record_success(started.elapsed());
                let mut session = self.lock();
                if session.generation != generation {
                    debug!("Discarding stream to {}: attempt superseded", device);
                    return;
                }
                session.connector = None;
                self.install(&mut session, generation, device, stream);
            }
            Err(e) => {
                self.metrics.connect.record_failure(started.elapsed());
                let mut session = self.lock();
                if session.generation != generation {
                    debug!("Ignoring outcome of superseded attempt to {}: {}", device, e);
                    return;
                }
                session.connector = None;
                warn!("Connection to {} failed: {}", device, e);
                self.fail(&mut session, device, &e);
            }
        }
    }

    async fn run_reader(
        self: Arc<Self>,
        device: DeviceRef,
        generation: u64,
        mut records: RecordStream,
        cancel: CancellationToken,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Reader for {} cancelled", device);
                    return;
                }
                next = self.next_record(&mut records) => next,
            };

            match next {
                Ok(Some(Record::Line(line))) => self.handle_line(generation, &line),
                Ok(Some(Record::Oversized { len })) => {
                    self.metrics.record_oversized();
                    let err = DecodeError::too_long(len, self.options.max_line_length);
                    warn!("Dropping record from {}: {}", device, err);
                }
                Ok(None) => {
                    let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
                    self.connection_lost(generation, device, Error::Io(eof));
                    return;
                }
                Err(e) => {
                    self.connection_lost(generation, device, e);
                    return;
                }
            }
        }
    }

    async fn next_record(&self, records: &mut RecordStream) -> Result<Option<Record>> {
        let next = match self.options.read_timeout {
            Some(limit) => tokio::time::timeout(limit, records.next())
                .await
                .map_err(|_| Error::timeout("read record", limit))?,
            None => records.next().await,
        };
        Ok(next.transpose()?)
    }

    fn handle_line(&self, generation: u64, line: &str) {
        self.metrics.record_line();
        match decode_detailed(line) {
            Ok(decoded) => {
                for miss in &decoded.misses {
                    debug!("Field {} kept its default: unparsable value {:?}", miss.field, miss.value);
                }
                self.deliver(generation, decoded.reading);
                self.metrics.record_reading(decoded.misses.len());
            }
            Err(e) => {
                self.metrics.record_decode_error();
                warn!("Dropping record {:?}: {}", line, e);
            }
        }
    }

    fn deliver(&self, generation: u64, reading: Reading) {
        let session = self.lock();
        if session.generation != generation || !session.state.is_connected() {
            debug!("Dropping reading from superseded stream");
            return;
        }
        debug!("Reading: {}", reading);
        self.events.send(SessionEvent::Reading {
            reading,
            received_at: OffsetDateTime::now_utc(),
        });
    }

    fn connection_lost(&self, generation: u64, device: DeviceRef, err: Error) {
        let mut session = self.lock();
        if session.generation != generation {
            debug!("Ignoring loss of superseded stream to {}: {}", device, err);
            return;
        }
        session.reader = None;
        self.metrics.record_connection_lost();
        warn!("Connection to {} lost: {}", device, err);
        self.fail(&mut session, device, &err);
    }

    /// Go idle and report `err` as a connection failure.
    fn fail(&self, session: &mut Session, device: DeviceRef, err: &Error) {
        self.set_state(session, ConnectionState::Idle);
        session.device = None;
        self.events.send(SessionEvent::ConnectionFailed {
            device: Some(device),
            reason: err.failure_reason(),
        });
    }
}
