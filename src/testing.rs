//! In-memory transport with scripted failures, for exercising the delivery
//! engine without sockets.
//!
//! Test support only. It is public so integration tests can reach it, is
//! hidden from the docs, and is not part of the supported API.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::TransportMode;
use crate::transport::{Endpoint, Transport, TransportError};

type FramePredicate = Box<dyn Fn(&Value) -> bool + Send>;

#[derive(Default)]
struct Script {
    open: bool,
    opens: usize,
    send_attempts: usize,
    refuse_connections: bool,
    fail_all_sends: bool,
    fail_next_sends: usize,
    reject: Option<FramePredicate>,
    frames: Vec<Vec<u8>>,
}

/// Shared view of a [`ScriptedTransport`], usable after the transport has
/// been moved into an engine.
#[derive(Clone, Default)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    pub fn fail_all_sends(&self, fail: bool) {
        self.lock().fail_all_sends = fail;
    }

    /// Fail the next `n` sends, whatever they carry.
    pub fn fail_next_sends(&self, n: usize) {
        self.lock().fail_next_sends = n;
    }

    /// Permanently fail any frame whose decoded record matches `predicate`.
    pub fn reject_when(&self, predicate: impl Fn(&Value) -> bool + Send + 'static) {
        self.lock().reject = Some(Box::new(predicate));
    }

    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn send_attempts(&self) -> usize {
        self.lock().send_attempts
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Accepted frames decoded back into JSON.
    pub fn records(&self) -> Vec<Value> {
        self.lock()
            .frames
            .iter()
            .filter_map(|frame| serde_json::from_slice(frame).ok())
            .collect()
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    handle: ScriptHandle,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ScriptHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let mut script = self.handle.lock();
        if script.open {
            return Ok(());
        }
        if script.refuse_connections {
            return Err(TransportError::Connect {
                address: "scripted:0".to_string(),
                reason: "connection refused".to_string(),
            });
        }
        script.open = true;
        script.opens += 1;
        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let mut script = self.handle.lock();
        if !script.open {
            return Err(TransportError::BrokenChannel(
                "channel is not open".to_string(),
            ));
        }
        script.send_attempts += 1;

        let rejected = script.reject.as_ref().is_some_and(|predicate| {
            serde_json::from_slice::<Value>(frame)
                .map(|record| predicate(&record))
                .unwrap_or(false)
        });

        let fail = if script.fail_next_sends > 0 {
            script.fail_next_sends -= 1;
            true
        } else {
            script.fail_all_sends || rejected
        };

        if fail {
            script.open = false;
            return Err(TransportError::BrokenChannel(
                "connection reset by peer".to_string(),
            ));
        }

        script.frames.push(frame.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.handle.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.handle.lock().open
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: "scripted".to_string(),
            port: 0,
            mode: TransportMode::Reliable,
        }
    }
}
