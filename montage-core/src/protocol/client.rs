//! Commission client.
//!
//! Tracks in-flight commissions in a `HashMap<Rn, (Action, RequestSender)>`
//! pending table. The transport is a [`crate::sync::BiChannel`], and the
//! per-request slot is always a `tokio::sync::oneshot::Sender` since every
//! commission resolves exactly once.

use super::{Action, CommissionRequest, CommissionResponse, Rn};
use crate::error::ProtocolError;
use crate::sync::BiChannel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

type PendingSlot = (Action, oneshot::Sender<Result<CommissionResponse, ProtocolError>>);

struct Inner {
    next_rn: AtomicU64,
    pending: Mutex<HashMap<Rn, PendingSlot>>,
    /// Named waiter lists for long-running setup actions. Resolving a name wakes every
    /// waiter registered so far and marks the name resolved so later
    /// `wait_for` calls return immediately.
    waiters: Mutex<HashMap<String, WaiterState>>,
    transport: BiChannel<CommissionResponse, CommissionRequest>,
}

enum WaiterState {
    Pending(Vec<oneshot::Sender<()>>),
    Resolved,
}

/// Client-side half of the commission protocol, one per service connection.
#[derive(Clone)]
pub struct CommissionClient {
    inner: Arc<Inner>,
}

impl CommissionClient {
    pub fn new(transport: BiChannel<CommissionResponse, CommissionRequest>) -> Self {
        Self {
            inner: Arc::new(Inner {
                next_rn: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                waiters: Mutex::new(HashMap::new()),
                transport,
            }),
        }
    }

    /// Dispatch `action` with `props`, returning the worker's response.
    /// With `overwrite_request = true`, any prior pending commission for
    /// the same action is rejected with [`ProtocolError::Superseded`]
    /// before this one is sent.
    pub async fn commission(
        &self,
        action: Action,
        props: serde_json::Value,
        overwrite_request: bool,
    ) -> Result<CommissionResponse, ProtocolError> {
        if overwrite_request {
            self.supersede_pending(action);
        }

        let rn = self.inner.next_rn.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(rn, (action, tx));

        if self
            .inner
            .transport
            .send(CommissionRequest { action, rn, props })
            .is_err()
        {
            self.inner.pending.lock().remove(&rn);
            return Err(ProtocolError::ChannelClosed);
        }

        rx.await.unwrap_or(Err(ProtocolError::ChannelClosed))
    }

    fn supersede_pending(&self, action: Action) {
        let mut pending = self.inner.pending.lock();
        let superseded: Vec<Rn> = pending
            .iter()
            .filter(|(_, (a, _))| *a == action)
            .map(|(rn, _)| *rn)
            .collect();
        for rn in superseded {
            if let Some((_, tx)) = pending.remove(&rn) {
                let _ = tx.send(Err(ProtocolError::Superseded));
            }
        }
    }

    /// Feed one response received off the transport into the pending
    /// table. Call this from the loop that owns `transport.receiver`.
    /// Responses with no matching `rn` (`cache-signals` notifications, or
    /// a genuinely orphaned response) are logged and dropped.
    pub fn handle_response(&self, response: CommissionResponse) {
        let Some(rn) = response.rn else {
            log::debug!(target: "montage::protocol", "dropping rn-less notification for {:?}", response.action);
            return;
        };
        match self.inner.pending.lock().remove(&rn) {
            Some((_, tx)) => {
                let _ = tx.send(Ok(response));
            }
            None => {
                log::warn!(target: "montage::protocol", "orphaned response for rn {rn}");
            }
        }
    }

    /// Register to be woken when `name` resolves, or return immediately if
    /// it already has.
    pub async fn wait_for(&self, name: &str) {
        let rx = {
            let mut waiters = self.inner.waiters.lock();
            match waiters.get(name) {
                Some(WaiterState::Resolved) => None,
                _ => {
                    let (tx, rx) = oneshot::channel();
                    match waiters
                        .entry(name.to_string())
                        .or_insert_with(|| WaiterState::Pending(Vec::new()))
                    {
                        WaiterState::Pending(list) => list.push(tx),
                        WaiterState::Resolved => unreachable!(),
                    }
                    Some(rx)
                }
            }
        };
        if let Some(rx) = rx {
            let _ = rx.await;
        }
    }

    /// Resolve a named waiter list, waking every waiter registered so far
    /// and marking later `wait_for` calls immediate.
    pub fn resolve_waiters(&self, name: &str) {
        let mut waiters = self.inner.waiters.lock();
        if let Some(WaiterState::Pending(list)) =
            waiters.insert(name.to_string(), WaiterState::Resolved)
        {
            for tx in list {
                let _ = tx.send(());
            }
        }
    }

    pub fn transport(&self) -> &BiChannel<CommissionResponse, CommissionRequest> {
        &self.inner.transport
    }
}
