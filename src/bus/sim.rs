//! In-memory I2C adapter.
//!
//! `SimAdapter` stands in for the bridge chip: it answers reads from
//! programmed replies, models multiplexer control registers, and records
//! every operation it is asked to perform together with the mux state the
//! bus was in at that moment. The recording is shared through [`SimLog`] so
//! it can be inspected while the adapter is owned by a [`Bridge`](crate::bus::Bridge).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::bus::{BridgeSettings, I2cAdapter, I2cAddress};
use crate::errors::{BusError, BusResult};

/// One operation as seen by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    Write { address: I2cAddress, bytes: Vec<u8> },
    Read { address: I2cAddress, length: usize },
    WriteRead { address: I2cAddress, bytes: Vec<u8>, length: usize },
}

impl BusOp {
    pub fn address(&self) -> I2cAddress {
        match self {
            BusOp::Write { address, .. }
            | BusOp::Read { address, .. }
            | BusOp::WriteRead { address, .. } => *address,
        }
    }
}

/// A recorded operation plus the mux control registers at the time it ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRecord {
    pub op: BusOp,
    pub mux_state: BTreeMap<I2cAddress, u8>,
}

impl SimRecord {
    /// Control byte latched in `mux` when this operation ran
    pub fn latched(&self, mux: I2cAddress) -> Option<u8> {
        self.mux_state.get(&mux).copied()
    }
}

#[derive(Default)]
struct SimState {
    configured: Option<BridgeSettings>,
    reject_configure: Option<String>,
    records: Vec<SimRecord>,
    replies: HashMap<I2cAddress, Vec<u8>>,
    command_replies: HashMap<(I2cAddress, Vec<u8>), Vec<u8>>,
    queued: HashMap<I2cAddress, VecDeque<Vec<u8>>>,
    last_write: HashMap<I2cAddress, Vec<u8>>,
    failures: HashMap<I2cAddress, BusError>,
    muxes: BTreeMap<I2cAddress, u8>,
    attachments: Vec<(I2cAddress, I2cAddress, u8)>,
}

impl SimState {
    fn begin(&mut self, op: BusOp) -> BusResult<()> {
        let address = op.address();
        self.records.push(SimRecord {
            op,
            mux_state: self.muxes.clone(),
        });

        if let Some(err) = self.failures.get(&address) {
            return Err(err.clone());
        }
        if !self.reachable(address) {
            return Err(BusError::Nack { address });
        }
        Ok(())
    }

    /// Devices attached behind a mux only answer while that mux routes to them
    fn reachable(&self, address: I2cAddress) -> bool {
        let mut routes = self
            .attachments
            .iter()
            .filter(|(target, _, _)| *target == address)
            .peekable();
        if routes.peek().is_none() {
            return true;
        }
        routes.any(|(_, mux, select)| self.muxes.get(mux) == Some(select))
    }

    fn apply_write(&mut self, address: I2cAddress, bytes: &[u8]) {
        if let Some(latch) = self.muxes.get_mut(&address) {
            if let [control] = bytes {
                *latch = *control;
            }
        }
        self.last_write.insert(address, bytes.to_vec());
    }

    fn fill(&mut self, address: I2cAddress, buf: &mut [u8]) {
        let reply = self.reply_for(address);
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = reply.get(i).copied().unwrap_or(0);
        }
    }

    fn reply_for(&mut self, address: I2cAddress) -> Vec<u8> {
        if let Some(reply) = self.queued.get_mut(&address).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(command) = self.last_write.get(&address) {
            if let Some(reply) = self.command_replies.get(&(address, command.clone())) {
                return reply.clone();
            }
        }
        if let Some(&latch) = self.muxes.get(&address) {
            return vec![latch];
        }
        self.replies.get(&address).cloned().unwrap_or_default()
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated bridge chip
pub struct SimAdapter {
    state: Arc<Mutex<SimState>>,
    latency: Option<Duration>,
}

impl Default for SimAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            latency: None,
        }
    }

    /// Handle for inspecting what the adapter saw
    pub fn log(&self) -> SimLog {
        SimLog {
            state: Arc::clone(&self.state),
        }
    }

    /// Fixed reply for reads from `address`
    pub fn respond(self, address: I2cAddress, reply: &[u8]) -> Self {
        lock(&self.state).replies.insert(address, reply.to_vec());
        self
    }

    /// Reply used when the last bytes written to `address` were `command`
    pub fn respond_to(self, address: I2cAddress, command: &[u8], reply: &[u8]) -> Self {
        lock(&self.state)
            .command_replies
            .insert((address, command.to_vec()), reply.to_vec());
        self
    }

    /// One-shot replies, consumed in order before any fixed reply
    pub fn queue_response(self, address: I2cAddress, reply: &[u8]) -> Self {
        lock(&self.state)
            .queued
            .entry(address)
            .or_default()
            .push_back(reply.to_vec());
        self
    }

    /// Every operation against `address` fails with a NACK
    pub fn nack(self, address: I2cAddress) -> Self {
        self.fail(address, BusError::Nack { address })
    }

    pub fn fail(self, address: I2cAddress, error: BusError) -> Self {
        lock(&self.state).failures.insert(address, error);
        self
    }

    /// Treat `address` as a channel multiplexer with a one-byte control register
    pub fn mux(self, address: I2cAddress) -> Self {
        lock(&self.state).muxes.insert(address, 0);
        self
    }

    /// `target` only answers while `mux` has `select` latched
    pub fn attach(self, target: I2cAddress, mux: I2cAddress, select: u8) -> Self {
        lock(&self.state).attachments.push((target, mux, select));
        self
    }

    pub fn reject_configure(self, what: &str) -> Self {
        lock(&self.state).reject_configure = Some(what.to_string());
        self
    }

    /// Sleep inside every operation, widening the window for interleaving
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn settle(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl I2cAdapter for SimAdapter {
    fn describe(&self) -> String {
        "sim".to_string()
    }

    fn configure(&mut self, settings: &BridgeSettings) -> BusResult<()> {
        let mut state = lock(&self.state);
        if let Some(what) = state.reject_configure.clone() {
            return Err(BusError::Unsupported { what });
        }
        state.configured = Some(settings.clone());
        Ok(())
    }

    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        self.settle();
        let mut state = lock(&self.state);
        state.begin(BusOp::Write {
            address,
            bytes: bytes.to_vec(),
        })?;
        state.apply_write(address, bytes);
        Ok(())
    }

    fn read(&mut self, address: I2cAddress, buf: &mut [u8]) -> BusResult<()> {
        self.settle();
        let mut state = lock(&self.state);
        state.begin(BusOp::Read {
            address,
            length: buf.len(),
        })?;
        state.fill(address, buf);
        Ok(())
    }

    fn write_read(&mut self, address: I2cAddress, bytes: &[u8], buf: &mut [u8]) -> BusResult<()> {
        self.settle();
        let mut state = lock(&self.state);
        state.begin(BusOp::WriteRead {
            address,
            bytes: bytes.to_vec(),
            length: buf.len(),
        })?;
        state.apply_write(address, bytes);
        state.fill(address, buf);
        Ok(())
    }
}

/// Shared view of a [`SimAdapter`]'s recording
#[derive(Clone)]
pub struct SimLog {
    state: Arc<Mutex<SimState>>,
}

impl SimLog {
    pub fn records(&self) -> Vec<SimRecord> {
        lock(&self.state).records.clone()
    }

    pub fn ops(&self) -> Vec<BusOp> {
        lock(&self.state)
            .records
            .iter()
            .map(|record| record.op.clone())
            .collect()
    }

    /// Operations addressed to one device
    pub fn ops_to(&self, address: I2cAddress) -> Vec<BusOp> {
        self.ops()
            .into_iter()
            .filter(|op| op.address() == address)
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.state).records.clear();
    }

    pub fn configured(&self) -> Option<BridgeSettings> {
        lock(&self.state).configured.clone()
    }
}
