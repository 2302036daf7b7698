//! Interrupt-driven peripheral control for a signal-period probe that
//! exchanges data buffers with an I2C follower device.
//!
//! Two small state machines coordinate hardware interrupt handlers with a
//! foreground polling loop: the [`capture`] driver timestamps falling edges
//! of an external signal on a free-running 32-bit counter and turns pairs of
//! timestamps into period measurements, and the [`i2c`] engine runs a
//! send-then-receive leader exchange serviced one FIFO event at a time. The
//! [`app`] controller owns both and exposes the classic `init` /
//! `process_action` surface to the binary.
//!
//! Hardware access goes through the [`hal`] traits; the [`mock`]
//! implementations drive everything on the host, and the `firmware` feature
//! adds the RP2040 bindings plus the on-target binary.
//!
//! ## Crate features
//!
//! - `firmware`: Builds the RP2040 board support and the binary target.
//!   Only meaningful for `thumbv6m-none-eabi` builds.
//! - `trace_captures`: Logs every edge capture as it is recorded. Very
//!   noisy!
//!
//! ## Demo
//!
//! A host-side walkthrough of one short exchange, standing in for the
//! interrupt traffic the hardware would generate:
//!
//! ```
//! use pulselink::app::{Controller, ExchangeConfig, ExchangePhase, fill_pattern};
//! use pulselink::hal::I2cEvent;
//! use pulselink::mock::{MockBus, MockDelay, MockTimer};
//!
//! let outbound: &'static mut [u8] = Box::leak(Box::new([0u8; 4]));
//! fill_pattern(outbound, 1);
//! let inbound: &'static mut [u8] = Box::leak(Box::new([0u8; 4]));
//!
//! let mut controller = Controller::new(
//!     MockTimer::new(32_000_000),
//!     MockBus::new(),
//!     MockDelay::new(),
//!     ExchangeConfig::default(),
//!     outbound,
//!     inbound,
//! );
//! controller.init();
//! controller.process_action(); // arms the outbound transfer
//!
//! for _ in 0..4 {
//!     controller.i2c_mut().bus_mut().raise(I2cEvent::TRANSMIT_EMPTY);
//!     controller.on_i2c_interrupt();
//! }
//! controller.process_action(); // observes completion, arms the inbound side
//! assert_eq!(controller.phase(), ExchangePhase::Receive);
//! ```

// Copyright 2025 the pulselink developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_std]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[cfg(test)]
extern crate std;

pub mod app;
pub mod capture;
pub mod hal;
pub mod i2c;
pub mod mock;

#[cfg(all(feature = "firmware", target_os = "none"))]
pub mod board;
