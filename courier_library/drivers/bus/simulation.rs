//! Simulation bus driver
//!
//! A [`SimulationBus`] is an in-memory bus segment. Drivers attach to it at
//! an address; a transmission addressed to an attached driver is handed to
//! that driver's receive callback on the sending thread, the way a bus
//! interrupt preempts the receiver. Every transmission is also kept in a log
//! for inspection.

use courier_core::error::{CourierError, CourierResult};
use courier_core::transport::{BusDriver, BusReader, BusReceiveCallback, DriverStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One frame written onto the simulated bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// Sender address
    pub from: u8,
    /// Destination address
    pub to: u8,
    pub bytes: Vec<u8>,
}

type CallbackSlot = Arc<Mutex<Option<BusReceiveCallback>>>;

#[derive(Default)]
struct Medium {
    nodes: Mutex<HashMap<u8, CallbackSlot>>,
    log: Mutex<Vec<Transmission>>,
    nack: AtomicBool,
}

impl Medium {
    fn deliver(slot: &CallbackSlot, frame: &[u8]) -> bool {
        let mut callback = slot.lock();
        match callback.as_mut() {
            Some(callback) => {
                let mut reader = SliceReader { remaining: frame };
                callback(&mut reader, frame.len());
                true
            }
            None => false,
        }
    }

    fn slot(&self, address: u8) -> Option<CallbackSlot> {
        self.nodes.lock().get(&address).cloned()
    }
}

struct SliceReader<'a> {
    remaining: &'a [u8],
}

impl BusReader for SliceReader<'_> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.remaining.len());
        buf[..n].copy_from_slice(&self.remaining[..n]);
        self.remaining = &self.remaining[n..];
        n
    }
}

/// Shared in-memory bus segment
#[derive(Clone, Default)]
pub struct SimulationBus {
    medium: Arc<Medium>,
}

impl SimulationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a driver answering to `address`
    pub fn attach(&self, address: u8) -> CourierResult<SimulationBusDriver> {
        let mut nodes = self.medium.nodes.lock();
        if nodes.contains_key(&address) {
            return Err(CourierError::driver(format!(
                "bus address 0x{:02x} is already attached",
                address
            )));
        }
        let slot: CallbackSlot = Arc::new(Mutex::new(None));
        nodes.insert(address, Arc::clone(&slot));
        Ok(SimulationBusDriver {
            address,
            medium: Arc::clone(&self.medium),
            slot,
            status: DriverStatus::Uninitialized,
            pending: None,
            tx_limit: None,
        })
    }

    /// Handle for injecting frames into the segment and inspecting traffic
    pub fn peer(&self) -> SimulationBusPeer {
        SimulationBusPeer {
            medium: Arc::clone(&self.medium),
        }
    }
}

/// Test-side view of a [`SimulationBus`]
///
/// Cloneable and `Send`, so frames can be injected from another thread.
#[derive(Clone)]
pub struct SimulationBusPeer {
    medium: Arc<Medium>,
}

impl SimulationBusPeer {
    /// Raise a receive notification at `address`.
    ///
    /// Returns false when nothing is attached there or the driver has no
    /// callback installed yet.
    pub fn inject(&self, address: u8, frame: &[u8]) -> bool {
        match self.medium.slot(address) {
            Some(slot) => Medium::deliver(&slot, frame),
            None => false,
        }
    }

    /// All transmissions so far, oldest first
    pub fn transmissions(&self) -> Vec<Transmission> {
        self.medium.log.lock().clone()
    }

    /// Drain the transmission log
    pub fn take_transmissions(&self) -> Vec<Transmission> {
        std::mem::take(&mut *self.medium.log.lock())
    }

    /// Make every following `end_transmission` fail as if unacknowledged
    pub fn set_nack(&self, nack: bool) {
        self.medium.nack.store(nack, Ordering::Relaxed);
    }
}

/// Simulation bus driver
///
/// Created through [`SimulationBus::attach`], or [`SimulationBusDriver::new`]
/// for a driver alone on its own segment.
pub struct SimulationBusDriver {
    address: u8,
    medium: Arc<Medium>,
    slot: CallbackSlot,
    status: DriverStatus,
    /// Destination and bytes of the frame being assembled
    pending: Option<(u8, Vec<u8>)>,
    /// Per-frame transmit buffer size, unlimited when `None`
    tx_limit: Option<usize>,
}

impl SimulationBusDriver {
    /// Driver on a private bus segment
    pub fn new(address: u8) -> Self {
        let medium = Arc::new(Medium::default());
        let slot: CallbackSlot = Arc::new(Mutex::new(None));
        medium.nodes.lock().insert(address, Arc::clone(&slot));
        Self {
            address,
            medium,
            slot,
            status: DriverStatus::Uninitialized,
            pending: None,
            tx_limit: None,
        }
    }

    /// Cap how many bytes one frame can carry, like a fixed transmit buffer
    pub fn with_tx_limit(mut self, limit: usize) -> Self {
        self.tx_limit = Some(limit);
        self
    }

    /// Handle on this driver's bus segment
    pub fn peer(&self) -> SimulationBusPeer {
        SimulationBusPeer {
            medium: Arc::clone(&self.medium),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn init(&mut self) -> CourierResult<()> {
        self.status = DriverStatus::Ready;
        Ok(())
    }

    pub fn shutdown(&mut self) -> CourierResult<()> {
        self.pending = None;
        *self.slot.lock() = None;
        self.status = DriverStatus::Shutdown;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        true
    }

    fn check_ready(&self) -> CourierResult<()> {
        if !self.status.is_operational() {
            return Err(CourierError::driver("Driver not initialized"));
        }
        Ok(())
    }
}

impl BusDriver for SimulationBusDriver {
    fn name(&self) -> &'static str {
        "simulation-bus"
    }

    fn begin_transmission(&mut self, address: u8) -> CourierResult<()> {
        self.check_ready()?;
        self.pending = Some((address, Vec::new()));
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> CourierResult<usize> {
        self.check_ready()?;
        let (_, frame) = self
            .pending
            .as_mut()
            .ok_or_else(|| CourierError::driver("write outside a transmission"))?;
        let room = match self.tx_limit {
            Some(limit) => limit.saturating_sub(frame.len()),
            None => bytes.len(),
        };
        let accepted = bytes.len().min(room);
        frame.extend_from_slice(&bytes[..accepted]);
        Ok(accepted)
    }

    fn end_transmission(&mut self) -> CourierResult<()> {
        self.check_ready()?;
        let (to, bytes) = self
            .pending
            .take()
            .ok_or_else(|| CourierError::driver("no transmission in progress"))?;
        self.status = DriverStatus::Running;

        if self.medium.nack.load(Ordering::Relaxed) {
            return Err(CourierError::driver(format!(
                "address 0x{:02x} did not acknowledge",
                to
            )));
        }

        if let Some(slot) = self.medium.slot(to) {
            Medium::deliver(&slot, &bytes);
        }
        self.medium.log.lock().push(Transmission {
            from: self.address,
            to,
            bytes,
        });
        Ok(())
    }

    fn set_receive_callback(&mut self, callback: BusReceiveCallback) {
        *self.slot.lock() = Some(callback);
    }

    fn status(&self) -> DriverStatus {
        self.status.clone()
    }
}
