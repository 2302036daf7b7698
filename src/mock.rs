//! Host-side doubles for the peripheral collaborators.
//!
//! Each mock records every register-level operation into a [`heapless::Vec`]
//! log and lets tests inject pending events, so the interrupt handlers can be
//! driven deterministically without hardware.

use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::hal::{CaptureTimer, CtEvent, Edge, I2cBus, I2cEvent};

/// Operation log capacity. Large enough for a full-length exchange plus the
/// surrounding configuration traffic.
const OP_LOG_CAPACITY: usize = 8192;

/// One recorded capture-timer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TimerOp {
    SetCounterMode,
    SetTopValue(u32),
    ResetCount,
    SelectCaptureEdge(Edge),
    SelectInterruptEdge(Edge),
    DisableEvents(CtEvent),
    EnableEvents(CtEvent),
    EnableIrq,
    Start,
}

/// Scriptable [`CaptureTimer`] double.
pub struct MockTimer {
    /// Every configuration and runtime operation, in call order.
    pub ops: Vec<TimerOp, 64>,
    pending: CtEvent,
    capture_value: u32,
    frequency: u32,
}

impl MockTimer {
    /// New mock counting at `frequency` Hz.
    pub fn new(frequency: u32) -> Self {
        Self {
            ops: Vec::new(),
            pending: CtEvent::empty(),
            capture_value: 0,
            frequency,
        }
    }

    /// Latch the value the next capture read returns.
    pub fn set_capture_value(&mut self, value: u32) {
        self.capture_value = value;
    }

    /// Mark events pending, as the hardware would.
    pub fn raise(&mut self, events: CtEvent) {
        self.pending |= events;
    }

    /// Number of recorded [`TimerOp::ResetCount`] calls.
    pub fn count_resets(&self) -> usize {
        self.ops.iter().filter(|op| **op == TimerOp::ResetCount).count()
    }

    /// Record one operation.
    fn log(&mut self, op: TimerOp) {
        self.ops.push(op).expect("timer op log full");
    }
}

impl CaptureTimer for MockTimer {
    fn set_counter_mode(&mut self) {
        self.log(TimerOp::SetCounterMode);
    }

    fn set_top_value(&mut self, top: u32) {
        self.log(TimerOp::SetTopValue(top));
    }

    fn reset_count(&mut self) {
        self.log(TimerOp::ResetCount);
    }

    fn select_capture_edge(&mut self, edge: Edge) {
        self.log(TimerOp::SelectCaptureEdge(edge));
    }

    fn select_interrupt_edge(&mut self, edge: Edge) {
        self.log(TimerOp::SelectInterruptEdge(edge));
    }

    fn disable_events(&mut self, events: CtEvent) {
        self.log(TimerOp::DisableEvents(events));
    }

    fn enable_events(&mut self, events: CtEvent) {
        self.log(TimerOp::EnableEvents(events));
    }

    fn enable_irq(&mut self) {
        self.log(TimerOp::EnableIrq);
    }

    fn start(&mut self) {
        self.log(TimerOp::Start);
    }

    fn captured_value(&self) -> u32 {
        self.capture_value
    }

    fn take_events(&mut self) -> CtEvent {
        let events = self.pending;
        self.pending = CtEvent::empty();
        events
    }

    fn base_frequency(&self) -> u32 {
        self.frequency
    }
}

/// One recorded I2C bus operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BusOp {
    Enable,
    Disable,
    AbortTransfer,
    SetFollowerAddress {
        /// Address written to the target register.
        address: u16,
        /// Whether 10-bit framing was selected.
        ten_bit: bool,
    },
    SetTxThreshold(u8),
    SetRxThreshold(u8),
    WriteDataCmd(u16),
    ReadData,
    SelectReadDirection,
    SelectEvents(I2cEvent),
    ClearEvents(I2cEvent),
    MaskInterrupts,
    UnmaskInterrupts,
}

/// Scriptable [`I2cBus`] double.
///
/// Bytes popped with [`I2cBus::read_data`] come from the scripted source set
/// with [`MockBus::set_read_data`]; once that runs out, byte `k` of the
/// transaction reads back as `k + 1`, mirroring the fill pattern a loopback
/// follower would echo.
pub struct MockBus {
    /// Every register-level operation, in call order.
    pub ops: Vec<BusOp, OP_LOG_CAPACITY>,
    pending: I2cEvent,
    read_source: Vec<u8, 64>,
    reads: usize,
}

impl MockBus {
    /// New idle mock bus.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            pending: I2cEvent::empty(),
            read_source: Vec::new(),
            reads: 0,
        }
    }

    /// Script the first bytes returned by [`I2cBus::read_data`].
    pub fn set_read_data(&mut self, data: &[u8]) {
        self.read_source.clear();
        self.read_source
            .extend_from_slice(data)
            .expect("read script too long");
        self.reads = 0;
    }

    /// Mark events pending, as the hardware would.
    pub fn raise(&mut self, events: I2cEvent) {
        self.pending |= events;
    }

    /// Recorded data/command register writes, in order.
    pub fn data_cmd_writes(&self) -> impl Iterator<Item = u16> + '_ {
        self.ops.iter().filter_map(|op| match op {
            BusOp::WriteDataCmd(word) => Some(*word),
            _ => None,
        })
    }

    /// Number of receive-register pops so far.
    pub fn read_count(&self) -> usize {
        self.reads
    }

    /// Record one operation.
    fn log(&mut self, op: BusOp) {
        self.ops.push(op).expect("bus op log full");
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cBus for MockBus {
    fn enable(&mut self) {
        self.log(BusOp::Enable);
    }

    fn disable(&mut self) {
        self.log(BusOp::Disable);
    }

    fn abort_transfer(&mut self) {
        self.log(BusOp::AbortTransfer);
    }

    fn set_follower_address(&mut self, address: u16, ten_bit: bool) {
        self.log(BusOp::SetFollowerAddress { address, ten_bit });
    }

    fn set_tx_threshold(&mut self, level: u8) {
        self.log(BusOp::SetTxThreshold(level));
    }

    fn set_rx_threshold(&mut self, level: u8) {
        self.log(BusOp::SetRxThreshold(level));
    }

    fn write_data_cmd(&mut self, word: u16) {
        self.log(BusOp::WriteDataCmd(word));
    }

    fn read_data(&mut self) -> u8 {
        self.log(BusOp::ReadData);
        let byte = match self.read_source.get(self.reads) {
            Some(byte) => *byte,
            None => (self.reads as u8).wrapping_add(1),
        };
        self.reads += 1;
        byte
    }

    fn select_read_direction(&mut self) {
        self.log(BusOp::SelectReadDirection);
    }

    fn select_events(&mut self, events: I2cEvent) {
        self.log(BusOp::SelectEvents(events));
    }

    fn clear_events(&mut self, events: I2cEvent) {
        self.pending &= !events;
        self.log(BusOp::ClearEvents(events));
    }

    fn mask_interrupts(&mut self) {
        self.log(BusOp::MaskInterrupts);
    }

    fn unmask_interrupts(&mut self) {
        self.log(BusOp::UnmaskInterrupts);
    }

    fn pending_events(&self) -> I2cEvent {
        self.pending
    }
}

/// [`DelayNs`] double recording each requested delay in microseconds.
#[derive(Default)]
pub struct MockDelay {
    /// Requested delays, in µs.
    pub delays_us: Vec<u32, 8>,
}

impl MockDelay {
    /// New mock delay provider.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delays_us
            .push(ns / 1_000)
            .expect("delay log full");
    }
}
