//! Request correlator.
//!
//! Maps in-flight message ids to pending completion handles. Ids are
//! drawn from a wrapping 16-bit counter; an id is never reissued while
//! its request is still pending. The same outbound request expects
//! exactly one of two reply shapes, stated at registration time:
//!
//! - [`RequestKind::ResponseOnly`] resolves on a RESPONSE frame with the
//!   request's id.
//! - [`RequestKind::DataResponse`] resolves on a non-RESPONSE frame
//!   sharing the request's id (profile-load style replies). An OK
//!   RESPONSE for such an entry is not its reply and leaves it pending;
//!   a non-OK RESPONSE fails it.
//!
//! The map is the only structure shared between the read loop and the
//! sender path; the mutex is held only across map operations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::error::{BlynkError, Result};
use crate::protocol::{Frame, ResponseCode};

/// Which reply shape a pending request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Expects a RESPONSE frame carrying a status code.
    ResponseOnly,
    /// Expects a command-shaped frame carrying a payload.
    DataResponse,
}

/// What a resolved request yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status code from a RESPONSE frame. Non-OK codes are delivered
    /// here too; the caller decides how to surface them.
    Code(ResponseCode),
    /// The command frame that answered a data request.
    Data(Frame),
}

/// Completion handle returned by [`Correlator::allocate`].
///
/// The correlator owns the resolver end; the awaiting caller holds only
/// this receiver.
pub struct PendingHandle {
    rx: oneshot::Receiver<Result<Reply>>,
}

impl PendingHandle {
    /// Wait for the request to settle.
    pub async fn wait(self) -> Result<Reply> {
        match self.rx.await {
            Ok(reply) => reply,
            // Resolver dropped without settling: the correlator itself
            // went away mid-request.
            Err(_) => Err(BlynkError::Cancelled),
        }
    }
}

struct Pending {
    kind: RequestKind,
    deadline: Instant,
    resolver: oneshot::Sender<Result<Reply>>,
}

struct Inner {
    next_id: u16,
    pending: HashMap<u16, Pending>,
}

/// In-memory table mapping message ids to pending completion handles.
pub struct Correlator {
    inner: Mutex<Inner>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                pending: HashMap::new(),
            }),
        }
    }

    /// Allocate the next message id and register a pending entry.
    ///
    /// The counter increments modulo 2^16, wrapping through 0. Ids still
    /// pending are skipped; with the whole space pending, allocation
    /// fails with [`BlynkError::Saturated`].
    pub fn allocate(&self, kind: RequestKind, timeout: Duration) -> Result<(u16, PendingHandle)> {
        let mut inner = self.inner.lock().expect("correlator mutex poisoned");

        let mut candidate = inner.next_id;
        for _ in 0..=u16::MAX as u32 {
            candidate = candidate.wrapping_add(1);
            if !inner.pending.contains_key(&candidate) {
                let (tx, rx) = oneshot::channel();
                inner.next_id = candidate;
                inner.pending.insert(
                    candidate,
                    Pending {
                        kind,
                        deadline: Instant::now() + timeout,
                        resolver: tx,
                    },
                );
                return Ok((candidate, PendingHandle { rx }));
            }
        }
        Err(BlynkError::Saturated)
    }

    /// Deliver a RESPONSE frame's status code.
    ///
    /// Returns `true` if a pending entry was settled by it. A
    /// *DataResponse* entry at the same id stays pending on OK (its
    /// reply is the command frame still to come) and fails on non-OK.
    pub fn resolve_response(&self, id: u16, code: ResponseCode) -> bool {
        let mut inner = self.inner.lock().expect("correlator mutex poisoned");

        match inner.pending.get(&id).map(|p| p.kind) {
            Some(RequestKind::ResponseOnly) => {
                let entry = inner.pending.remove(&id).expect("entry just observed");
                let _ = entry.resolver.send(Ok(Reply::Code(code)));
                true
            }
            Some(RequestKind::DataResponse) => {
                if code.is_ok() {
                    false
                } else {
                    let entry = inner.pending.remove(&id).expect("entry just observed");
                    let _ = entry.resolver.send(Err(BlynkError::Server(code)));
                    true
                }
            }
            None => false,
        }
    }

    /// Deliver a command frame to a *DataResponse* entry at its id.
    ///
    /// Returns `None` if the frame was consumed; otherwise hands the
    /// frame back so the router can treat it as a domain event.
    pub fn resolve_data(&self, frame: Frame) -> Option<Frame> {
        let mut inner = self.inner.lock().expect("correlator mutex poisoned");

        let id = frame.message_id();
        match inner.pending.get(&id).map(|p| p.kind) {
            Some(RequestKind::DataResponse) => {
                let entry = inner.pending.remove(&id).expect("entry just observed");
                let _ = entry.resolver.send(Ok(Reply::Data(frame)));
                None
            }
            _ => Some(frame),
        }
    }

    /// Drop a pending entry without settling it.
    ///
    /// Used when the caller stops waiting (its own timeout fired); a
    /// late reply for the id then routes as an unsolicited event.
    pub fn cancel(&self, id: u16) {
        let _ = self
            .inner
            .lock()
            .expect("correlator mutex poisoned")
            .pending
            .remove(&id);
    }

    /// Settle every pending entry with the supplied error.
    ///
    /// Invoked on disconnect, before a new transport is created.
    pub fn fail_all(&self, make_error: impl Fn() -> BlynkError) {
        let drained: Vec<Pending> = {
            let mut inner = self.inner.lock().expect("correlator mutex poisoned");
            inner.pending.drain().map(|(_, p)| p).collect()
        };
        for entry in drained {
            let _ = entry.resolver.send(Err(make_error()));
        }
    }

    /// Settle entries whose deadline has passed with `Timeout`.
    pub fn expire_deadlines(&self, now: Instant) {
        let expired: Vec<Pending> = {
            let mut inner = self.inner.lock().expect("correlator mutex poisoned");
            let ids: Vec<u16> = inner
                .pending
                .iter()
                .filter(|(_, p)| p.deadline <= now)
                .map(|(&id, _)| id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.pending.remove(&id))
                .collect()
        };
        for entry in expired {
            let _ = entry.resolver.send(Err(BlynkError::Timeout));
        }
    }

    /// Number of currently pending requests.
    pub fn pending_len(&self) -> usize {
        self.inner
            .lock()
            .expect("correlator mutex poisoned")
            .pending
            .len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
