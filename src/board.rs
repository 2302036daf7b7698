//! RP2040 bindings for the peripheral collaborator traits.
//!
//! The capture side runs on the 1 MHz system timer, reading the low counter
//! word when the probe pin's falling-edge interrupt fires. The I2C side
//! drives the I2C0 block's DesignWare registers directly; the data/command
//! word layout in [`hal`](crate::hal) matches this hardware bit for bit.

// SPDX-License-Identifier: Apache-2.0

use rp2040_hal::gpio::{bank0::Gpio15, FunctionSioInput, Interrupt as PinInterrupt, Pin, PullUp};
use rp2040_hal::pac;

use crate::hal::{CaptureTimer, CtEvent, Edge, I2cBus, I2cEvent};

/// The probe signal input.
pub type ProbePin = Pin<Gpio15, FunctionSioInput, PullUp>;

/// Capture timer over the system timer and the probe pin.
pub struct CtTimer {
    pin: ProbePin,
}

impl CtTimer {
    /// Wrap the probe pin. The system timer must already be released from
    /// reset (done by `Timer::new` in the binary).
    pub fn new(pin: ProbePin) -> Self {
        Self { pin }
    }

    /// Shared access to the timer register block.
    fn regs(&self) -> &pac::timer::RegisterBlock {
        unsafe { &*pac::TIMER::ptr() }
    }

    /// GPIO event for an edge selection.
    fn pin_event(edge: Edge) -> PinInterrupt {
        match edge {
            Edge::Rising => PinInterrupt::EdgeHigh,
            Edge::Falling => PinInterrupt::EdgeLow,
        }
    }
}

impl CaptureTimer for CtTimer {
    fn set_counter_mode(&mut self) {
        // Fixed-function free-running up-counter; nothing to select.
    }

    fn set_top_value(&mut self, _top: u32) {
        // The low counter word wraps at the full 32-bit range; there is no
        // match register to program.
    }

    fn reset_count(&mut self) {
        // TIMELW is latched into the counter when TIMEHW is written.
        self.regs().timelw().write(|w| unsafe { w.bits(0) });
        self.regs().timehw().write(|w| unsafe { w.bits(0) });
    }

    fn select_capture_edge(&mut self, _edge: Edge) {
        // The timestamp is read at interrupt time; the interrupt edge
        // selection covers both roles on this part.
    }

    fn select_interrupt_edge(&mut self, edge: Edge) {
        self.pin.set_interrupt_enabled(Self::pin_event(edge), true);
    }

    fn disable_events(&mut self, events: CtEvent) {
        if events.contains(CtEvent::EDGE_CAPTURE) {
            self.pin.set_interrupt_enabled(PinInterrupt::EdgeLow, false);
            self.pin.set_interrupt_enabled(PinInterrupt::EdgeHigh, false);
        }
    }

    fn enable_events(&mut self, _events: CtEvent) {
        // Edge events are armed through `select_interrupt_edge`; the peak
        // pair is never produced here, the 64-bit counter's high word
        // already extends the range.
    }

    fn enable_irq(&mut self) {
        unsafe { pac::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0) };
    }

    fn start(&mut self) {
        // Free-running from reset.
    }

    fn captured_value(&self) -> u32 {
        self.regs().timerawl().read().bits()
    }

    fn take_events(&mut self) -> CtEvent {
        let mut events = CtEvent::empty();
        for pin_event in [PinInterrupt::EdgeLow, PinInterrupt::EdgeHigh] {
            if self.pin.interrupt_status(pin_event) {
                self.pin.clear_interrupt(pin_event);
                events |= CtEvent::EDGE_CAPTURE;
            }
        }
        events
    }

    fn base_frequency(&self) -> u32 {
        // One tick per µs from the watchdog tick generator.
        1_000_000
    }
}

/// Leader-mode shim over the I2C0 DesignWare register block.
pub struct DwI2c {
    i2c: pac::I2C0,
}

impl DwI2c {
    /// Release the block from reset and apply the fixed leader-mode
    /// configuration: fast mode, restarts enabled, SCL counts derived from
    /// the system clock.
    pub fn new(i2c: pac::I2C0, resets: &mut pac::RESETS, sys_hz: u32, bus_hz: u32) -> Self {
        resets.reset().modify(|_, w| w.i2c0().set_bit());
        resets.reset().modify(|_, w| w.i2c0().clear_bit());
        while resets.reset_done().read().i2c0().bit_is_clear() {}

        i2c.ic_enable().write(|w| w.enable().clear_bit());
        i2c.ic_con().write(|w| {
            w.master_mode().set_bit();
            w.ic_slave_disable().set_bit();
            w.ic_restart_en().set_bit();
            w.speed().fast()
        });

        // SCL low stretches slightly longer than high.
        let period = sys_hz / bus_hz;
        let lcnt = period * 3 / 5;
        let hcnt = period - lcnt;
        i2c.ic_fs_scl_hcnt()
            .write(|w| unsafe { w.ic_fs_scl_hcnt().bits(hcnt as u16) });
        i2c.ic_fs_scl_lcnt()
            .write(|w| unsafe { w.ic_fs_scl_lcnt().bits(lcnt as u16) });
        i2c.ic_sda_hold()
            .modify(|_, w| unsafe { w.ic_sda_tx_hold().bits((sys_hz * 3 / 10_000_000) as u16) });

        Self { i2c }
    }
}

impl I2cBus for DwI2c {
    fn enable(&mut self) {
        self.i2c.ic_enable().modify(|_, w| w.enable().set_bit());
    }

    fn disable(&mut self) {
        self.i2c.ic_enable().modify(|_, w| w.enable().clear_bit());
    }

    fn abort_transfer(&mut self) {
        self.i2c.ic_enable().modify(|_, w| w.abort().set_bit());
        let _ = self.i2c.ic_clr_tx_abrt().read();
    }

    fn set_follower_address(&mut self, address: u16, ten_bit: bool) {
        self.i2c.ic_con().modify(|_, w| {
            if ten_bit {
                w.ic_10bitaddr_master().set_bit()
            } else {
                w.ic_10bitaddr_master().clear_bit()
            }
        });
        self.i2c
            .ic_tar()
            .modify(|_, w| unsafe { w.ic_tar().bits(address) });
    }

    fn set_tx_threshold(&mut self, level: u8) {
        self.i2c.ic_tx_tl().write(|w| unsafe { w.tx_tl().bits(level) });
    }

    fn set_rx_threshold(&mut self, level: u8) {
        self.i2c.ic_rx_tl().write(|w| unsafe { w.rx_tl().bits(level) });
    }

    fn write_data_cmd(&mut self, word: u16) {
        self.i2c
            .ic_data_cmd()
            .write(|w| unsafe { w.bits(u32::from(word)) });
    }

    fn read_data(&mut self) -> u8 {
        self.i2c.ic_data_cmd().read().dat().bits()
    }

    fn select_read_direction(&mut self) {
        // Direction is carried per command word on this IP; each read is
        // requested through `write_data_cmd`.
    }

    fn select_events(&mut self, events: I2cEvent) {
        self.i2c
            .ic_intr_mask()
            .write(|w| unsafe { w.bits(events.bits()) });
    }

    fn clear_events(&mut self, _events: I2cEvent) {
        // The FIFO events retire with FIFO state; the combined clear covers
        // the latched ones.
        let _ = self.i2c.ic_clr_intr().read();
    }

    fn mask_interrupts(&mut self) {
        pac::NVIC::mask(pac::Interrupt::I2C0_IRQ);
    }

    fn unmask_interrupts(&mut self) {
        unsafe { pac::NVIC::unmask(pac::Interrupt::I2C0_IRQ) };
    }

    fn pending_events(&self) -> I2cEvent {
        I2cEvent::from_bits_truncate(self.i2c.ic_intr_stat().read().bits())
    }
}
