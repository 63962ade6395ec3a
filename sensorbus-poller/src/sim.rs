//! In-memory bus and control output for tests and dry runs.
//!
//! [`SimBus`] plays scripted slaves: each slave maps a request to a
//! [`Behaviour`], resolved when the first response byte is read. Every
//! transfer takes `unit_delay` of tokio time, so deadline tests run under a
//! paused clock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::bus::{Address, Bus, BusError};
use crate::exchange::{PAD, TERMINATOR};
use crate::recovery::{ControlOutput, Level, OutputError};

const NO_DEVICE: i32 = 121;
const IO_ERROR: i32 = 5;

/// How a simulated slave answers one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behaviour {
    /// Send these bytes, then pad bytes forever.
    Reply(Vec<u8>),
    /// Send pad bytes forever.
    Stall,
    /// Never complete a read.
    Hang,
    /// Fail every read.
    Fail(BusError),
}

impl Behaviour {
    /// A terminated text reply.
    pub fn reply(text: &str) -> Self {
        Self::padded(0, text)
    }

    /// A terminated text reply preceded by `pads` pad bytes.
    pub fn padded(pads: usize, text: &str) -> Self {
        let mut bytes = vec![PAD; pads];
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(TERMINATOR);
        Behaviour::Reply(bytes)
    }
}

#[derive(Debug)]
enum Pending {
    Bytes(VecDeque<u8>),
    Stall,
    Hang,
    Fail(BusError),
}

#[derive(Debug, Default)]
struct Slave {
    script: HashMap<Vec<u8>, Behaviour>,
    request: Vec<u8>,
    pending: Option<Pending>,
}

#[derive(Debug, Default)]
struct BusState {
    slaves: HashMap<Address, Slave>,
    touched: Vec<Address>,
}

/// Scripted bus. Clones share state, so a test can keep a handle to
/// reconfigure slaves or inspect traffic while the bus is in use.
#[derive(Debug, Clone)]
pub struct SimBus {
    state: Arc<Mutex<BusState>>,
    unit_delay: Duration,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// An empty bus with a 1 ms transfer time.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            unit_delay: Duration::from_millis(1),
        }
    }

    /// Add a slave at `address` answering the given requests.
    pub fn with_device<'a, I>(self, address: Address, script: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Behaviour)>,
    {
        self.set_device(address, script);
        self
    }

    /// Set the time each byte transfer takes.
    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    /// Add or replace the slave at `address`.
    pub fn set_device<'a, I>(&self, address: Address, script: I)
    where
        I: IntoIterator<Item = (&'a str, Behaviour)>,
    {
        let script = script
            .into_iter()
            .map(|(request, behaviour)| (request.as_bytes().to_vec(), behaviour))
            .collect();
        self.lock().slaves.insert(
            address,
            Slave {
                script,
                ..Slave::default()
            },
        );
    }

    /// Remove the slave at `address`.
    pub fn remove_device(&self, address: Address) {
        self.lock().slaves.remove(&address);
    }

    /// Every address a transfer was attempted on, in order.
    pub fn touched(&self) -> Vec<Address> {
        self.lock().touched.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_step(&self, address: Address) -> Result<Option<u8>, BusError> {
        let mut state = self.lock();
        state.touched.push(address);

        let slave = state.slaves.get_mut(&address).ok_or_else(no_device)?;

        if slave.pending.is_none() {
            let request = std::mem::take(&mut slave.request);
            slave.pending = Some(match slave.script.get(&request) {
                Some(Behaviour::Reply(bytes)) => Pending::Bytes(bytes.iter().copied().collect()),
                Some(Behaviour::Stall) => Pending::Stall,
                Some(Behaviour::Hang) => Pending::Hang,
                Some(Behaviour::Fail(e)) => Pending::Fail(e.clone()),
                None => Pending::Fail(BusError::with_code(IO_ERROR, "Input/output error")),
            });
        }

        match slave.pending.as_mut() {
            Some(Pending::Bytes(bytes)) => Ok(Some(bytes.pop_front().unwrap_or(PAD))),
            Some(Pending::Fail(e)) => Err(e.clone()),
            Some(Pending::Hang) => Ok(None),
            Some(Pending::Stall) | None => Ok(Some(PAD)),
        }
    }
}

fn no_device() -> BusError {
    BusError::with_code(NO_DEVICE, "Remote I/O error")
}

impl Bus for SimBus {
    async fn write_byte(&mut self, address: Address, byte: u8) -> Result<(), BusError> {
        tokio::time::sleep(self.unit_delay).await;

        let mut state = self.lock();
        state.touched.push(address);

        let slave = state.slaves.get_mut(&address).ok_or_else(no_device)?;
        if slave.pending.take().is_some() {
            slave.request.clear();
        }
        slave.request.push(byte);
        Ok(())
    }

    async fn read_byte(&mut self, address: Address) -> Result<u8, BusError> {
        tokio::time::sleep(self.unit_delay).await;

        match self.read_step(address)? {
            Some(byte) => Ok(byte),
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
struct OutputState {
    events: Vec<(Instant, Level)>,
    successes_before_failure: usize,
    failures: usize,
}

/// Control output that records every level it is driven to.
#[derive(Debug, Clone, Default)]
pub struct SimOutput {
    state: Arc<Mutex<OutputState>>,
}

impl SimOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_after(0, count);
    }

    /// Let `successes` writes through, then fail the following `count`.
    pub fn fail_after(&self, successes: usize, count: usize) {
        let mut state = self.lock();
        state.successes_before_failure = successes;
        state.failures = count;
    }

    /// Levels successfully applied, in order.
    pub fn levels(&self) -> Vec<Level> {
        self.lock().events.iter().map(|(_, level)| *level).collect()
    }

    /// Levels successfully applied, with the time they were applied.
    pub fn events(&self) -> Vec<(Instant, Level)> {
        self.lock().events.clone()
    }

    /// The last level applied.
    pub fn level(&self) -> Option<Level> {
        self.lock().events.last().map(|(_, level)| *level)
    }

    fn lock(&self) -> MutexGuard<'_, OutputState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ControlOutput for SimOutput {
    async fn set_level(&mut self, level: Level) -> Result<(), OutputError> {
        let mut state = self.lock();
        if state.successes_before_failure > 0 {
            state.successes_before_failure -= 1;
        } else if state.failures > 0 {
            state.failures -= 1;
            return Err(OutputError::Other(format!("simulated failure driving {}", level)));
        }
        state.events.push((Instant::now(), level));
        Ok(())
    }
}
