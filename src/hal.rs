//! Peripheral collaborator interfaces.
//!
//! The capture timer and the I2C block are vendor peripherals driven through
//! register-level operations. Everything the drivers in [`capture`](crate::capture)
//! and [`i2c`](crate::i2c) need from them is collected into the two traits
//! below, so the drivers stay portable and can be exercised on the host with
//! the [`mock`](crate::mock) implementations. Pin muxing and clock-tree setup
//! stay outside this boundary with the board support code.

// SPDX-License-Identifier: Apache-2.0

use bitflags::bitflags;

bitflags! {
    /// Event bits reported by the capture timer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CtEvent: u32 {
        /// An input edge matched the configured capture event.
        const EDGE_CAPTURE = 1 << 0;
        /// Counter 0 reached its match value.
        const COUNTER0_PEAK = 1 << 1;
        /// Counter 1 reached its match value.
        const COUNTER1_PEAK = 1 << 2;
    }
}

bitflags! {
    /// Event bits reported by the I2C block.
    ///
    /// Bit positions follow the DesignWare `IC_INTR_STAT` layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct I2cEvent: u32 {
        /// Receive FIFO reached its threshold.
        const RECEIVE_FULL = 1 << 2;
        /// Transmit FIFO drained to its threshold.
        const TRANSMIT_EMPTY = 1 << 4;
    }
}

/// Read command bit of the I2C data/command register.
///
/// Writing a word with this bit set requests one byte from the follower
/// instead of transmitting the low byte.
pub const DATA_CMD_READ: u16 = 1 << 8;

/// Stop condition bit of the I2C data/command register.
///
/// Combined into the same write as the final data byte or read command so the
/// hardware ends the bus transaction right after it.
pub const DATA_CMD_STOP: u16 = 1 << 9;

/// Input edge selection for capture and interrupt events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Low-to-high transition.
    Rising,
    /// High-to-low transition.
    Falling,
}

/// A free-running counter with input capture, as seen by [`EdgeTimer`].
///
/// One-time configuration calls are only made from
/// [`EdgeTimer::init`](crate::capture::EdgeTimer::init); runtime calls may
/// come from interrupt context.
///
/// [`EdgeTimer`]: crate::capture::EdgeTimer
pub trait CaptureTimer {
    /// Select 32-bit periodic up-counting mode.
    fn set_counter_mode(&mut self);

    /// Set the match value the counter free-runs to before wrapping.
    fn set_top_value(&mut self, top: u32);

    /// Reset the count register to zero.
    fn reset_count(&mut self);

    /// Select the input edge that latches a capture.
    fn select_capture_edge(&mut self, edge: Edge);

    /// Select the input edge that raises [`CtEvent::EDGE_CAPTURE`].
    fn select_interrupt_edge(&mut self, edge: Edge);

    /// Stop the given events from interrupting.
    fn disable_events(&mut self, events: CtEvent);

    /// Let the given events interrupt.
    fn enable_events(&mut self, events: CtEvent);

    /// Enable the peripheral's line at the interrupt controller.
    fn enable_irq(&mut self);

    /// Start the counter.
    fn start(&mut self);

    /// Read the most recently captured counter value.
    fn captured_value(&self) -> u32;

    /// Read and clear the pending event set.
    fn take_events(&mut self) -> CtEvent;

    /// Counting frequency in Hz.
    fn base_frequency(&self) -> u32;
}

/// Register-level I2C leader operations, as seen by [`I2cEngine`].
///
/// [`I2cEngine`]: crate::i2c::I2cEngine
pub trait I2cBus {
    /// Enable the peripheral.
    fn enable(&mut self);

    /// Disable the peripheral. Address and threshold updates require the
    /// block to be disabled.
    fn disable(&mut self);

    /// Abort any in-flight transfer.
    fn abort_transfer(&mut self);

    /// Set the follower address, selecting 10-bit framing when `ten_bit`.
    fn set_follower_address(&mut self, address: u16, ten_bit: bool);

    /// Transmit FIFO level that raises [`I2cEvent::TRANSMIT_EMPTY`].
    fn set_tx_threshold(&mut self, level: u8);

    /// Receive FIFO level that raises [`I2cEvent::RECEIVE_FULL`].
    fn set_rx_threshold(&mut self, level: u8);

    /// Write the data/command register.
    ///
    /// The low byte is the data to shift out; [`DATA_CMD_READ`] and
    /// [`DATA_CMD_STOP`] may be combined into the same word.
    fn write_data_cmd(&mut self, word: u16);

    /// Pop one byte from the receive data register.
    fn read_data(&mut self) -> u8;

    /// Configure the shifter for reading from the follower.
    fn select_read_direction(&mut self);

    /// Choose which events raise the peripheral interrupt.
    fn select_events(&mut self, events: I2cEvent);

    /// Clear the given pending events.
    fn clear_events(&mut self, events: I2cEvent);

    /// Mask the peripheral's line at the interrupt controller.
    fn mask_interrupts(&mut self);

    /// Unmask the peripheral's line at the interrupt controller.
    fn unmask_interrupts(&mut self);

    /// Currently pending event set.
    fn pending_events(&self) -> I2cEvent;
}
