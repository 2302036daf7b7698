//! Application driver loop tying both peripherals together.
//!
//! [`Controller::init`] performs one-time setup; [`Controller::process_action`]
//! is the foreground tick, called from an unbounded loop. Interrupt handlers
//! forward into [`Controller::on_timer_interrupt`] and
//! [`Controller::on_i2c_interrupt`]. The tick never blocks beyond the
//! configured settle delay: each call inspects the completion flags published
//! from interrupt context and advances the exchange by at most one step.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::capture::EdgeTimer;
use crate::hal::{CaptureTimer, I2cBus};
use crate::i2c::{I2cEngine, TransferStatus};

/// Exchange progress. `Complete` is terminal; further ticks do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    /// Outbound bytes are being shifted to the follower.
    Send,
    /// Inbound bytes are being shifted back from the follower.
    Receive,
    /// The exchange finished; the I2C side is idle.
    Complete,
}

/// Tunables for the exchange.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeConfig {
    /// Follower address; values above 127 select 10-bit framing.
    pub follower_address: u16,
    /// Bus settling time between observed send completion and arming the
    /// receive, in µs. Empirical; there is no derivation to compute it from.
    pub settle_delay_us: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            follower_address: 0x50,
            settle_delay_us: 10_000,
        }
    }
}

/// Fill an outbound buffer with the `index + offset` byte pattern the
/// follower is expected to echo back.
pub fn fill_pattern(buf: &mut [u8], offset: u8) {
    for (index, byte) in buf.iter_mut().enumerate() {
        *byte = (index as u8).wrapping_add(offset);
    }
}

/// Owns both drivers and the exchange state machine.
pub struct Controller<T: CaptureTimer, B: I2cBus, D: DelayNs> {
    edge: EdgeTimer<T>,
    i2c: I2cEngine<B>,
    delay: D,
    config: ExchangeConfig,
    phase: ExchangePhase,
    outbound: Option<&'static mut [u8]>,
    inbound: Option<&'static mut [u8]>,
    last_period_us: Option<u32>,
}

impl<T: CaptureTimer, B: I2cBus, D: DelayNs> Controller<T, B, D> {
    /// Assemble the controller around its collaborators and the two
    /// caller-owned transfer buffers.
    pub fn new(
        timer: T,
        bus: B,
        delay: D,
        config: ExchangeConfig,
        outbound: &'static mut [u8],
        inbound: &'static mut [u8],
    ) -> Self {
        Self {
            edge: EdgeTimer::new(timer),
            i2c: I2cEngine::new(bus),
            delay,
            config,
            phase: ExchangePhase::Send,
            outbound: Some(outbound),
            inbound: Some(inbound),
            last_period_us: None,
        }
    }

    /// One-time setup of both subsystems. Not re-entrant.
    pub fn init(&mut self) {
        self.edge.init();
        self.i2c.prepare();
        info!("peripheral setup complete");
    }

    /// Foreground tick.
    ///
    /// Consumes a pending period measurement, then advances the exchange:
    /// the first tick arms the outbound transfer; once its completion is
    /// observed, the settle delay runs and the inbound transfer is armed;
    /// once that completes, the exchange is done. The receive never starts
    /// before send completion has been observed here.
    pub fn process_action(&mut self) {
        if let Some(period) = self.edge.take_period_us() {
            self.last_period_us = Some(period);
        }

        match self.phase {
            ExchangePhase::Send => {
                if let Some(buf) = self.outbound.take() {
                    self.i2c
                        .set_follower_address(self.config.follower_address, false);
                    self.i2c.begin_send(buf, self.config.follower_address);
                } else if self.i2c.poll_send() == TransferStatus::Done {
                    debug!("send observed complete, settling");
                    self.delay.delay_us(self.config.settle_delay_us);
                    if let Some(buf) = self.inbound.take() {
                        self.i2c.begin_receive(buf, self.config.follower_address);
                    }
                    self.phase = ExchangePhase::Receive;
                }
            }
            ExchangePhase::Receive => {
                if self.i2c.poll_receive() == TransferStatus::Done {
                    self.phase = ExchangePhase::Complete;
                    debug!("exchange complete");
                }
            }
            ExchangePhase::Complete => {}
        }
    }

    /// Timer interrupt entry point.
    pub fn on_timer_interrupt(&mut self) {
        self.edge.on_interrupt();
    }

    /// I2C interrupt entry point.
    pub fn on_i2c_interrupt(&mut self) {
        self.i2c.on_interrupt();
    }

    /// Consume the most recent period measurement, in µs.
    pub fn take_measurement(&mut self) -> Option<u32> {
        self.last_period_us.take()
    }

    /// Current exchange phase.
    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// Access the edge timer driver.
    pub fn edge_mut(&mut self) -> &mut EdgeTimer<T> {
        &mut self.edge
    }

    /// Access the I2C engine.
    pub fn i2c_mut(&mut self) -> &mut I2cEngine<B> {
        &mut self.i2c
    }

    /// Access the delay provider.
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{CtEvent, I2cEvent};
    use crate::mock::{BusOp, MockBus, MockDelay, MockTimer, TimerOp};
    use std::boxed::Box;

    const LEN: usize = 8;

    fn leak(init: [u8; LEN]) -> &'static mut [u8] {
        Box::leak(Box::new(init))
    }

    fn controller() -> Controller<MockTimer, MockBus, MockDelay> {
        let mut outbound = [0u8; LEN];
        fill_pattern(&mut outbound, 1);
        Controller::new(
            MockTimer::new(1_000_000),
            MockBus::new(),
            MockDelay::new(),
            ExchangeConfig::default(),
            leak(outbound),
            leak([0u8; LEN]),
        )
    }

    fn drive_tx(c: &mut Controller<MockTimer, MockBus, MockDelay>, n: usize) {
        for _ in 0..n {
            c.i2c_mut().bus_mut().raise(I2cEvent::TRANSMIT_EMPTY);
            c.on_i2c_interrupt();
        }
    }

    fn drive_rx(c: &mut Controller<MockTimer, MockBus, MockDelay>, n: usize) {
        for _ in 0..n {
            c.i2c_mut().bus_mut().raise(I2cEvent::RECEIVE_FULL);
            c.on_i2c_interrupt();
        }
    }

    #[test]
    fn init_touches_both_subsystems() {
        let mut c = controller();
        c.init();

        assert!(c.edge_mut().timer_mut().ops.contains(&TimerOp::Start));
        assert!(c.i2c_mut().bus_mut().ops.contains(&BusOp::AbortTransfer));
    }

    #[test]
    fn first_tick_arms_the_send() {
        let mut c = controller();
        c.init();
        c.process_action();

        assert_eq!(c.phase(), ExchangePhase::Send);
        // The foreground pre-sets the address in 7-bit form; arming fixes
        // the width up from the address value.
        let ops = &c.i2c_mut().bus_mut().ops;
        assert!(ops.contains(&BusOp::SetFollowerAddress {
            address: 0x50,
            ten_bit: false
        }));
        assert!(ops.contains(&BusOp::SelectEvents(I2cEvent::TRANSMIT_EMPTY)));
    }

    #[test]
    fn phase_advances_only_after_observed_completion() {
        let mut c = controller();
        c.init();
        c.process_action();

        // Not done yet: stays in Send without re-arming.
        c.process_action();
        assert_eq!(c.phase(), ExchangePhase::Send);

        drive_tx(&mut c, LEN);
        assert_eq!(c.phase(), ExchangePhase::Send);

        c.process_action();
        assert_eq!(c.phase(), ExchangePhase::Receive);

        drive_rx(&mut c, LEN);
        c.process_action();
        assert_eq!(c.phase(), ExchangePhase::Complete);
    }

    #[test]
    fn settle_delay_runs_once_between_the_phases() {
        let mut c = controller();
        c.init();
        c.process_action();
        drive_tx(&mut c, LEN);
        c.process_action();
        drive_rx(&mut c, LEN);
        c.process_action();
        c.process_action();

        assert_eq!(c.delay.delays_us.as_slice(), &[10_000]);
    }

    #[test]
    fn settle_delay_is_configurable() {
        let mut outbound = [0u8; LEN];
        fill_pattern(&mut outbound, 1);
        let config = ExchangeConfig {
            settle_delay_us: 2_500,
            ..ExchangeConfig::default()
        };
        let mut c = Controller::new(
            MockTimer::new(1_000_000),
            MockBus::new(),
            MockDelay::new(),
            config,
            leak(outbound),
            leak([0u8; LEN]),
        );
        c.init();
        c.process_action();
        drive_tx(&mut c, LEN);
        c.process_action();

        assert_eq!(c.delay.delays_us.as_slice(), &[2_500]);
    }

    #[test]
    fn complete_phase_performs_no_further_bus_traffic() {
        let mut c = controller();
        c.init();
        c.process_action();
        drive_tx(&mut c, LEN);
        c.process_action();
        drive_rx(&mut c, LEN);
        c.process_action();
        assert_eq!(c.phase(), ExchangePhase::Complete);

        let ops_at_completion = c.i2c_mut().bus_mut().ops.len();
        for _ in 0..5 {
            c.process_action();
        }
        assert_eq!(c.i2c_mut().bus_mut().ops.len(), ops_at_completion);
    }

    #[test]
    fn measurements_flow_through_the_tick() {
        let mut c = controller();
        c.init();

        c.edge_mut().timer_mut().set_capture_value(4_000);
        c.edge_mut().timer_mut().raise(CtEvent::EDGE_CAPTURE);
        c.on_timer_interrupt();
        c.edge_mut().timer_mut().set_capture_value(9_000);
        c.edge_mut().timer_mut().raise(CtEvent::EDGE_CAPTURE);
        c.on_timer_interrupt();

        c.process_action();
        assert_eq!(c.take_measurement(), Some(5_000));
        assert_eq!(c.take_measurement(), None);
    }

    #[test]
    fn fill_pattern_matches_the_expected_layout() {
        let mut buf = [0u8; 4];
        fill_pattern(&mut buf, 1);
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}
