//! Interrupt-driven I2C leader transfer engine.
//!
//! One outbound and one inbound byte-wise transfer, serviced from the
//! peripheral interrupt one FIFO event at a time. Arming a transfer is
//! non-blocking; the foreground observes completion through the tri-state
//! [`poll_send`](I2cEngine::poll_send) / [`poll_receive`](I2cEngine::poll_receive)
//! calls and reclaims the buffer afterwards.

// SPDX-License-Identifier: Apache-2.0

use log::debug;

use crate::hal::{I2cBus, I2cEvent, DATA_CMD_READ, DATA_CMD_STOP};

/// Largest address representable with 7-bit framing. Anything above selects
/// 10-bit framing.
pub const MAX_7BIT_ADDRESS: u16 = 127;

/// FIFO fill level used for both directions: interrupt on every byte.
const FIFO_THRESHOLD: u8 = 0;

/// Foreground view of one transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// No transfer armed.
    Idle,
    /// Armed and still being serviced by the interrupt handler.
    ///
    /// A follower that never responds leaves the transfer here; there is no
    /// timeout.
    Pending,
    /// Completion observed and consumed; the buffer can be reclaimed.
    Done,
}

/// Transaction-scoped byte cursor over a caller-owned buffer.
struct Transfer {
    buf: &'static mut [u8],
    consumed: usize,
}

impl Transfer {
    fn new(buf: &'static mut [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.consumed
    }
}

/// Leader-mode transfer engine over one I2C instance.
///
/// The transfer contexts and completion flags are written by the interrupt
/// handler and reset by the foreground; the owning binary keeps the engine in
/// a critical-section mutex, which is what makes those writes visible across
/// the two contexts.
pub struct I2cEngine<B: I2cBus> {
    bus: B,
    tx: Option<Transfer>,
    rx: Option<Transfer>,
    send_complete: bool,
    receive_complete: bool,
    finished_tx: Option<&'static mut [u8]>,
    finished_rx: Option<&'static mut [u8]>,
}

impl<B: I2cBus> I2cEngine<B> {
    /// Wrap an I2C instance. No hardware access until [`prepare`](Self::prepare).
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            tx: None,
            rx: None,
            send_complete: false,
            receive_complete: false,
            finished_tx: None,
            finished_rx: None,
        }
    }

    /// One-time peripheral preparation: abort whatever a previous run may
    /// have left in flight. The block must be enabled for the abort to take.
    pub fn prepare(&mut self) {
        self.bus.enable();
        self.bus.abort_transfer();
        self.bus.disable();
    }

    /// Pass-through follower address update.
    pub fn set_follower_address(&mut self, address: u16, ten_bit: bool) {
        self.bus.set_follower_address(address, ten_bit);
    }

    /// Arm an outbound transfer of the whole buffer to `address`.
    ///
    /// Returns once the transmit-empty interrupt is armed; the bytes move
    /// from interrupt context. The buffer must not be empty and stays owned
    /// by the engine until reclaimed with [`take_outbound`](Self::take_outbound)
    /// after completion.
    pub fn begin_send(&mut self, buf: &'static mut [u8], address: u16) {
        debug_assert!(!buf.is_empty());
        debug_assert!(self.tx.is_none(), "outbound transfer already armed");

        self.bus.mask_interrupts();
        self.send_complete = false;
        self.tx = Some(Transfer::new(buf));

        self.bus.disable();
        self.bus
            .set_follower_address(address, address > MAX_7BIT_ADDRESS);
        self.bus.set_tx_threshold(FIFO_THRESHOLD);
        self.bus.enable();
        self.bus.select_events(I2cEvent::TRANSMIT_EMPTY);
        self.bus.unmask_interrupts();
    }

    /// Arm an inbound transfer filling the whole buffer from `address`.
    ///
    /// Mirror of [`begin_send`](Self::begin_send) with the shifter pointed
    /// the other way and the receive-full interrupt armed.
    pub fn begin_receive(&mut self, buf: &'static mut [u8], address: u16) {
        debug_assert!(!buf.is_empty());
        debug_assert!(self.rx.is_none(), "inbound transfer already armed");

        self.bus.mask_interrupts();
        self.receive_complete = false;
        self.rx = Some(Transfer::new(buf));

        self.bus.disable();
        self.bus
            .set_follower_address(address, address > MAX_7BIT_ADDRESS);
        self.bus.set_rx_threshold(FIFO_THRESHOLD);
        self.bus.enable();
        self.bus.select_read_direction();
        self.bus.select_events(I2cEvent::RECEIVE_FULL);
        self.bus.unmask_interrupts();
    }

    /// Interrupt-context event dispatch.
    pub fn on_interrupt(&mut self) {
        let events = self.bus.pending_events();
        if events.contains(I2cEvent::TRANSMIT_EMPTY) {
            self.service_transmit();
        }
        if events.contains(I2cEvent::RECEIVE_FULL) {
            self.service_receive();
        }
    }

    /// Push one byte per transmit-empty event.
    ///
    /// The final byte carries the stop bit in the same data write, so the
    /// hardware ends the bus transaction right after it; the same servicing
    /// pass then retires the interrupt and publishes completion.
    fn service_transmit(&mut self) {
        if self.send_complete {
            return;
        }
        let Some(tx) = self.tx.as_mut() else {
            return;
        };
        let remaining = tx.remaining();
        if remaining == 0 {
            return;
        }

        let mut word = u16::from(tx.buf[tx.consumed]);
        if remaining == 1 {
            word |= DATA_CMD_STOP;
        }
        tx.consumed += 1;
        self.bus.write_data_cmd(word);

        if remaining == 1 {
            self.bus.clear_events(I2cEvent::TRANSMIT_EMPTY);
            self.bus.mask_interrupts();
            self.send_complete = true;
            debug!("outbound transfer complete");
        }
    }

    /// Pop one byte per receive-full event.
    ///
    /// Each pop is followed by the read command requesting the next byte;
    /// the request for the final byte carries the stop bit. A single-byte
    /// transfer issues no follow-up command at all.
    fn service_receive(&mut self) {
        if self.receive_complete {
            return;
        }
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        if rx.remaining() == 0 {
            return;
        }

        rx.buf[rx.consumed] = self.bus.read_data();
        rx.consumed += 1;

        match rx.remaining() {
            0 => {
                self.bus.clear_events(I2cEvent::RECEIVE_FULL);
                self.bus.mask_interrupts();
                self.receive_complete = true;
                debug!("inbound transfer complete");
            }
            1 => self.bus.write_data_cmd(DATA_CMD_READ | DATA_CMD_STOP),
            _ => self.bus.write_data_cmd(DATA_CMD_READ),
        }
    }

    /// Non-blocking outbound progress check.
    ///
    /// `Done` is returned exactly once per transfer and moves the buffer to
    /// [`take_outbound`](Self::take_outbound); later calls report `Idle`.
    pub fn poll_send(&mut self) -> TransferStatus {
        if self.send_complete {
            self.send_complete = false;
            self.finished_tx = self.tx.take().map(|t| t.buf);
            TransferStatus::Done
        } else if self.tx.is_some() {
            TransferStatus::Pending
        } else {
            TransferStatus::Idle
        }
    }

    /// Non-blocking inbound progress check. See [`poll_send`](Self::poll_send).
    pub fn poll_receive(&mut self) -> TransferStatus {
        if self.receive_complete {
            self.receive_complete = false;
            self.finished_rx = self.rx.take().map(|t| t.buf);
            TransferStatus::Done
        } else if self.rx.is_some() {
            TransferStatus::Pending
        } else {
            TransferStatus::Idle
        }
    }

    /// Reclaim the outbound buffer after a completed send.
    pub fn take_outbound(&mut self) -> Option<&'static mut [u8]> {
        self.finished_tx.take()
    }

    /// Reclaim the inbound buffer, holding the received bytes, after a
    /// completed receive.
    pub fn take_inbound(&mut self) -> Option<&'static mut [u8]> {
        self.finished_rx.take()
    }

    /// Raw send-completion flag, as published by the interrupt handler.
    pub fn is_send_complete(&self) -> bool {
        self.send_complete
    }

    /// Raw receive-completion flag, as published by the interrupt handler.
    pub fn is_receive_complete(&self) -> bool {
        self.receive_complete
    }

    /// Access the underlying bus collaborator.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{BusOp, MockBus};
    use std::boxed::Box;
    use std::vec::Vec;

    fn leak<const N: usize>(init: [u8; N]) -> &'static mut [u8] {
        Box::leak(Box::new(init))
    }

    fn engine() -> I2cEngine<MockBus> {
        I2cEngine::new(MockBus::new())
    }

    fn fire_tx(engine: &mut I2cEngine<MockBus>) {
        engine.bus_mut().raise(I2cEvent::TRANSMIT_EMPTY);
        engine.on_interrupt();
    }

    fn fire_rx(engine: &mut I2cEngine<MockBus>) {
        engine.bus_mut().raise(I2cEvent::RECEIVE_FULL);
        engine.on_interrupt();
    }

    #[test]
    fn prepare_aborts_any_leftover_transfer() {
        let mut engine = engine();
        engine.prepare();
        assert_eq!(
            engine.bus_mut().ops.as_slice(),
            &[BusOp::Enable, BusOp::AbortTransfer, BusOp::Disable]
        );
    }

    #[test]
    fn begin_send_sequences_the_peripheral() {
        let mut engine = engine();
        engine.begin_send(leak([0xAA; 4]), 0x50);

        assert_eq!(
            engine.bus_mut().ops.as_slice(),
            &[
                BusOp::MaskInterrupts,
                BusOp::Disable,
                BusOp::SetFollowerAddress {
                    address: 0x50,
                    ten_bit: false
                },
                BusOp::SetTxThreshold(0),
                BusOp::Enable,
                BusOp::SelectEvents(I2cEvent::TRANSMIT_EMPTY),
                BusOp::UnmaskInterrupts,
            ]
        );
        assert_eq!(engine.poll_send(), TransferStatus::Pending);
    }

    #[test]
    fn begin_receive_selects_read_direction() {
        let mut engine = engine();
        engine.begin_receive(leak([0; 4]), 0x50);

        let ops = engine.bus_mut().ops.as_slice();
        assert!(ops.contains(&BusOp::SelectReadDirection));
        assert!(ops.contains(&BusOp::SetRxThreshold(0)));
        assert_eq!(
            ops.last(),
            Some(&BusOp::UnmaskInterrupts),
        );
        assert_eq!(engine.poll_receive(), TransferStatus::Pending);
    }

    #[test]
    fn send_services_one_byte_per_event_and_stops_on_the_last() {
        let mut engine = engine();
        engine.begin_send(leak([0x10, 0x20, 0x30, 0x40]), 0x50);

        for _ in 0..3 {
            fire_tx(&mut engine);
            assert!(!engine.is_send_complete());
        }
        fire_tx(&mut engine);
        assert!(engine.is_send_complete());

        let words: Vec<u16> = engine.bus_mut().data_cmd_writes().collect();
        assert_eq!(
            words,
            &[0x10, 0x20, 0x30, u16::from(0x40u8) | DATA_CMD_STOP]
        );

        // Completion retires the interrupt in the same servicing pass.
        let ops = engine.bus_mut().ops.as_slice();
        let tail = &ops[ops.len() - 3..];
        assert_eq!(
            tail,
            &[
                BusOp::WriteDataCmd(0x0240),
                BusOp::ClearEvents(I2cEvent::TRANSMIT_EMPTY),
                BusOp::MaskInterrupts,
            ]
        );
    }

    #[test]
    fn single_byte_send_stops_immediately() {
        let mut engine = engine();
        engine.begin_send(leak([0x7F]), 0x50);

        fire_tx(&mut engine);
        assert!(engine.is_send_complete());
        let words: Vec<u16> = engine.bus_mut().data_cmd_writes().collect();
        assert_eq!(words, &[0x7F | DATA_CMD_STOP]);
    }

    #[test]
    fn completed_send_ignores_spurious_events() {
        let mut engine = engine();
        engine.begin_send(leak([1, 2]), 0x50);
        fire_tx(&mut engine);
        fire_tx(&mut engine);
        let ops_after_completion = engine.bus_mut().ops.len();

        engine.bus_mut().raise(I2cEvent::TRANSMIT_EMPTY);
        engine.on_interrupt();
        assert_eq!(engine.bus_mut().ops.len(), ops_after_completion);
    }

    #[test]
    fn poll_send_reports_done_once_and_releases_the_buffer() {
        let mut engine = engine();
        engine.begin_send(leak([9, 8]), 0x50);
        assert_eq!(engine.poll_send(), TransferStatus::Pending);

        fire_tx(&mut engine);
        fire_tx(&mut engine);
        assert_eq!(engine.poll_send(), TransferStatus::Done);
        assert_eq!(engine.poll_send(), TransferStatus::Idle);

        let buf = engine.take_outbound().unwrap();
        assert_eq!(buf, &[9, 8]);
    }

    #[test]
    fn receive_pops_bytes_and_requests_ahead() {
        let mut engine = engine();
        engine.bus_mut().set_read_data(&[0xD0, 0xD1, 0xD2, 0xD3]);
        engine.begin_receive(leak([0; 4]), 0x50);

        for _ in 0..4 {
            fire_rx(&mut engine);
        }
        assert!(engine.is_receive_complete());
        assert_eq!(engine.bus_mut().read_count(), 4);

        // Pops 1 and 2 request plain reads, pop 3 requests the final byte
        // with the stop bit, pop 4 retires the interrupt.
        let words: Vec<u16> = engine.bus_mut().data_cmd_writes().collect();
        assert_eq!(
            words,
            &[DATA_CMD_READ, DATA_CMD_READ, DATA_CMD_READ | DATA_CMD_STOP]
        );

        assert_eq!(engine.poll_receive(), TransferStatus::Done);
        let buf = engine.take_inbound().unwrap();
        assert_eq!(buf, &[0xD0, 0xD1, 0xD2, 0xD3]);
    }

    #[test]
    fn single_byte_receive_issues_no_read_command() {
        let mut engine = engine();
        engine.bus_mut().set_read_data(&[0x42]);
        engine.begin_receive(leak([0]), 0x50);

        fire_rx(&mut engine);
        assert!(engine.is_receive_complete());
        assert_eq!(engine.bus_mut().data_cmd_writes().count(), 0);
        assert_eq!(engine.poll_receive(), TransferStatus::Done);
        assert_eq!(engine.take_inbound().unwrap(), &[0x42]);
    }

    #[test]
    fn address_above_seven_bits_selects_ten_bit_framing() {
        let mut engine = engine();
        engine.begin_send(leak([0; 2]), 200);
        assert!(engine.bus_mut().ops.contains(&BusOp::SetFollowerAddress {
            address: 200,
            ten_bit: true
        }));

        let mut engine = I2cEngine::new(MockBus::new());
        engine.begin_receive(leak([0; 2]), 200);
        assert!(engine.bus_mut().ops.contains(&BusOp::SetFollowerAddress {
            address: 200,
            ten_bit: true
        }));
    }

    #[test]
    fn polls_report_idle_before_any_transfer() {
        let mut engine = engine();
        assert_eq!(engine.poll_send(), TransferStatus::Idle);
        assert_eq!(engine.poll_receive(), TransferStatus::Idle);
    }
}
