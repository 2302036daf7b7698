//! Edge timer driver: falling-edge timestamps in, signal period out.
//!
//! The interrupt handler appends captured counter values to a two-slot
//! buffer; once the buffer fills, a measurement is ready and the foreground
//! converts the pair into a period in microseconds, correcting for a single
//! counter wraparound between the captures.

// SPDX-License-Identifier: Apache-2.0

#[allow(unused_imports)]
use log::trace;
use log::warn;

use crate::hal::{CaptureTimer, CtEvent, Edge};

/// Timestamps collected per measurement.
pub const EDGE_BUFFER_CAPACITY: usize = 2;

/// Match value the counter free-runs to before wrapping to zero.
pub const TOP_VALUE: u32 = 0xFFFF_FFFF;

/// Counter-extension latch.
///
/// The two peak events always arrive in a fixed pairing: counter 1 peaks
/// first, then counter 0. Observing the counter 0 peak while the latch holds
/// the first event resets the hardware count register, extending the usable
/// range past one free-run cycle for long inter-edge intervals.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OverflowLatch {
    /// No overflow pending.
    #[default]
    Idle,
    /// Counter 1 peak seen; waiting on the counter 0 peak.
    PeakSeen,
}

/// Driver for one capture timer instance.
///
/// The timestamp buffer and its cursor are written only from
/// [`on_interrupt`](Self::on_interrupt); the ready flag is cleared only from
/// [`take_period_us`](Self::take_period_us). Cross-context visibility comes
/// from the critical-section mutex the owning binary keeps the driver in.
pub struct EdgeTimer<T: CaptureTimer> {
    timer: T,
    captures: [u32; EDGE_BUFFER_CAPACITY],
    cursor: usize,
    ready: bool,
    latch: OverflowLatch,
    latest_capture: Option<u32>,
}

impl<T: CaptureTimer> EdgeTimer<T> {
    /// Wrap a configured-but-idle capture timer.
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            captures: [0; EDGE_BUFFER_CAPACITY],
            cursor: 0,
            ready: false,
            latch: OverflowLatch::Idle,
            latest_capture: None,
        }
    }

    /// One-time hardware configuration. Not re-entrant.
    ///
    /// Selects 32-bit periodic up-counting against the full-range match
    /// value, arms capture and interrupt on the falling edge, and starts the
    /// counter. The base clock must already be configured by the board
    /// support code and be a whole number of MHz.
    pub fn init(&mut self) {
        debug_assert!(
            self.timer.base_frequency() >= 1_000_000,
            "capture timer must be clocked at 1 MHz or faster"
        );

        self.timer.set_counter_mode();
        self.timer.reset_count();
        self.timer.set_top_value(TOP_VALUE);

        let events = CtEvent::EDGE_CAPTURE | CtEvent::COUNTER0_PEAK | CtEvent::COUNTER1_PEAK;
        self.timer.disable_events(events);
        self.timer.enable_events(events);
        self.timer.enable_irq();

        self.timer.select_interrupt_edge(Edge::Falling);
        self.timer.select_capture_edge(Edge::Falling);
        self.timer.start();
    }

    /// Interrupt-context event servicing.
    ///
    /// A new capture cycle begins as soon as the cursor wraps, whether or not
    /// the previous measurement was consumed: captures arriving while the
    /// ready flag is still set overwrite the buffer from slot 0.
    pub fn on_interrupt(&mut self) {
        let events = self.timer.take_events();

        if events.contains(CtEvent::COUNTER1_PEAK) {
            self.latch = OverflowLatch::PeakSeen;
        }
        if events.contains(CtEvent::COUNTER0_PEAK) && self.latch == OverflowLatch::PeakSeen {
            self.timer.reset_count();
            self.latch = OverflowLatch::Idle;
        }

        if events.contains(CtEvent::EDGE_CAPTURE) {
            let value = self.timer.captured_value();
            #[cfg(feature = "trace_captures")]
            trace!("edge capture {} at slot {}", value, self.cursor);

            self.captures[self.cursor] = value;
            self.latest_capture = Some(value);
            self.cursor += 1;
            if self.cursor >= EDGE_BUFFER_CAPACITY {
                self.cursor = 0;
                if self.ready {
                    warn!("previous period measurement was never consumed");
                }
                self.ready = true;
            }
        }
    }

    /// Consume a pending measurement, in microseconds.
    ///
    /// Returns `None` until a full pair of captures has been collected.
    /// With timestamps `t0` (older) and `t1` (newer), the elapsed tick count
    /// is `t1 - t0`, or `TOP_VALUE - t0 + 1 + t1` when the counter wrapped
    /// once in between. Division by the ticks-per-µs ratio truncates.
    pub fn take_period_us(&mut self) -> Option<u32> {
        if !self.ready {
            return None;
        }
        self.ready = false;

        let ticks = ticks_between(self.captures[0], self.captures[1]);
        Some(ticks / (self.timer.base_frequency() / 1_000_000))
    }

    /// Consume the most recent raw capture value.
    ///
    /// Independent of the period buffer: one value is latched per edge and
    /// reading it does not disturb a measurement in progress.
    pub fn take_raw_capture(&mut self) -> Option<u32> {
        self.latest_capture.take()
    }

    /// Current counter-extension latch state.
    pub fn overflow_latch(&self) -> OverflowLatch {
        self.latch
    }

    /// Whether a full measurement is waiting to be consumed.
    pub fn measurement_ready(&self) -> bool {
        self.ready
    }

    /// Access the underlying timer collaborator.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

/// Elapsed ticks from `t0` to `t1`, correcting one counter wraparound.
fn ticks_between(t0: u32, t1: u32) -> u32 {
    if t1 < t0 {
        TOP_VALUE - t0 + 1 + t1
    } else {
        t1 - t0
    }
}
