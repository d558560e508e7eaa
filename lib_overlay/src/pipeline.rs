//! # Pipeline
//!
//! The sequential message handler: decode, compare against the held snapshot,
//! dispatch the delta. One event is fully handled before the next one starts,
//! and nothing here blocks or awaits. The async side (transport, timers,
//! signals) lives with the caller, which feeds events in arrival order.
//!
//! Reconnect behaviour is an explicit [`ReconnectPolicy`]. With the default,
//! the first frame after a reconnect is compared against the last snapshot
//! seen before the drop, so a brief disconnect does not blank the overlay.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::bindings::BindingSet;
use crate::decoder::{DecodeError, Decoder};
use crate::render::{Animator, RenderDispatcher, RenderSink, Tweener};
use crate::state_store::{Delta, StateStore};
use crate::transport::{ConnectionState, RawMessage, TransportEvent};

/// What happens to the held snapshot when the transport comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Keep it; the first post-reconnect delta only carries real changes.
    #[default]
    KeepLastSnapshot,
    /// Drop it and forget what was rendered; the first post-reconnect frame is
    /// treated like stream start and repaints every bound element.
    ResetOnReconnect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub messages: u64,
    pub decode_errors: u64,
    /// Non-empty deltas.
    pub deltas: u64,
    pub changes: u64,
    pub render_ops: u64,
    pub reconnects: u64,
    pub transport_errors: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages={} decode_errors={} deltas={} changes={} render_ops={} reconnects={} transport_errors={}",
            self.messages,
            self.decode_errors,
            self.deltas,
            self.changes,
            self.render_ops,
            self.reconnects,
            self.transport_errors
        )
    }
}

pub struct Pipeline<S, A> {
    decoder: Decoder,
    store: StateStore,
    dispatcher: RenderDispatcher<S, A>,
    policy: ReconnectPolicy,
    stats: PipelineStats,
    connection: ConnectionState,
    // A session was lost and the transport has not reopened yet.
    lost_session: bool,
}

impl<S: RenderSink, A: Animator> Pipeline<S, A> {
    pub fn new(bindings: Arc<BindingSet>, sink: S, animator: A) -> Self {
        Self {
            decoder: Decoder::new(),
            store: StateStore::new(Arc::clone(&bindings)),
            dispatcher: RenderDispatcher::new(bindings, sink, animator),
            policy: ReconnectPolicy::default(),
            stats: PipelineStats::default(),
            connection: ConnectionState::Connecting,
            lost_session: false,
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Handles one transport event. Returns the number of changes dispatched.
    pub fn handle_event(&mut self, event: TransportEvent) -> usize {
        match event {
            TransportEvent::State(state) => {
                self.on_state(state);
                0
            }
            TransportEvent::Message(raw) => match self.handle_message(&raw) {
                Ok(delta) => delta.len(),
                Err(e) => {
                    log::warn!("Discarding frame ({} bytes): {}", raw.len(), e);
                    0
                }
            },
            TransportEvent::Error(e) => {
                self.stats.transport_errors += 1;
                log::debug!("Transport error: {}", e);
                0
            }
        }
    }

    /// Decodes one frame and dispatches whatever changed. Returns the delta.
    pub fn handle_message(&mut self, raw: &RawMessage) -> Result<Delta, DecodeError> {
        self.stats.messages += 1;
        let snapshot = match self.decoder.decode(raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.decode_errors += 1;
                return Err(e);
            }
        };

        let delta = self.store.compare(snapshot);
        if !delta.is_empty() {
            let issued = self.dispatcher.dispatch(&delta);
            log::trace!("Delta of {} changes, {} render ops", delta.len(), issued);
            self.stats.deltas += 1;
            self.stats.changes += delta.len() as u64;
            self.stats.render_ops += issued as u64;
        }
        Ok(delta)
    }

    fn on_state(&mut self, state: ConnectionState) {
        log::debug!("Connection {} -> {}", self.connection, state);
        match state {
            ConnectionState::Reconnecting => self.lost_session = true,
            ConnectionState::Open if self.lost_session => {
                self.lost_session = false;
                self.stats.reconnects += 1;
                if self.policy == ReconnectPolicy::ResetOnReconnect {
                    log::info!("Reconnected, clearing held snapshot and repainting");
                    self.store.clear();
                    self.dispatcher.reset();
                } else {
                    log::info!("Reconnected, keeping last snapshot");
                }
            }
            _ => {}
        }
        self.connection = state;
    }

    /// Cancels in-flight animations and flushes the sink.
    pub fn shutdown(&mut self) {
        self.dispatcher.cancel_all();
        self.dispatcher.flush();
        log::info!("Pipeline stopped: {}", self.stats);
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &RenderDispatcher<S, A> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut RenderDispatcher<S, A> {
        &mut self.dispatcher
    }
}

impl<S: RenderSink> Pipeline<S, Tweener> {
    /// One frame of the external timing loop: advance tweens, then flush.
    pub fn frame(&mut self, now: Instant) {
        let (tweener, sink) = self.dispatcher.parts_mut();
        tweener.advance(now, sink);
        sink.flush();
    }
}
