//! Measures the period of an external probe signal and exchanges a data
//! buffer with an I2C follower device.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![warn(missing_docs)]

#[cfg(target_os = "none")]
mod firmware {
    //! On-target wiring: statics, interrupt handlers, and the entry point.

    use core::cell::RefCell;

    use cortex_m::singleton;
    use critical_section::Mutex;
    use defmt::{debug, info};
    #[allow(unused_imports)]
    use defmt_rtt as _;
    #[allow(unused_imports)]
    use panic_probe as _;
    use rp2040_hal::{
        clocks::init_clocks_and_plls,
        entry,
        gpio::{FunctionI2C, Pin, Pins, PullUp},
        pac,
        pac::interrupt,
        Sio, Timer, Watchdog,
    };

    use pulselink::app::{fill_pattern, Controller, ExchangeConfig, ExchangePhase};
    use pulselink::board::{CtTimer, DwI2c};

    /// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
    #[link_section = ".boot2"]
    #[used]
    pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

    /// External high-speed crystal on the board is 12 MHz
    pub const XOSC_FREQ_HZ: u32 = 12_000_000;
    /// Fast mode plus on the follower bus
    pub const I2C_BUS_FREQ_HZ: u32 = 1_000_000;
    /// Bytes exchanged with the follower in each direction
    pub const TRANSFER_LEN: usize = 1024;
    /// 7-bit follower address
    pub const FOLLOWER_ADDRESS: u16 = 0x50;

    /// The fully wired controller type.
    type BoardController = Controller<CtTimer, DwI2c, Timer>;

    /// Controller shared between the foreground loop and both interrupt
    /// handlers.
    static CONTROLLER: Mutex<RefCell<Option<BoardController>>> = Mutex::new(RefCell::new(None));

    /// Main operation loop
    #[entry]
    fn main() -> ! {
        info!("period probe startup");
        let mut pac = pac::Peripherals::take().unwrap();
        let _core = pac::CorePeripherals::take().unwrap();
        let mut watchdog = Watchdog::new(pac.WATCHDOG);
        let sio = Sio::new(pac.SIO);

        let clocks = init_clocks_and_plls(
            XOSC_FREQ_HZ,
            pac.XOSC,
            pac.CLOCKS,
            pac.PLL_SYS,
            pac.PLL_USB,
            &mut pac.RESETS,
            &mut watchdog,
        )
        .ok()
        .unwrap();
        let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

        let pins = Pins::new(
            pac.IO_BANK0,
            pac.PADS_BANK0,
            sio.gpio_bank0,
            &mut pac.RESETS,
        );

        // Probe signal input
        let mut probe_pin = pins.gpio15.into_pull_up_input();
        probe_pin.set_schmitt_enabled(true); // Debouncing

        // Bus lines for I2C0
        let _sda: Pin<_, FunctionI2C, PullUp> = pins.gpio16.reconfigure();
        let _scl: Pin<_, FunctionI2C, PullUp> = pins.gpio17.reconfigure();
        let bus = DwI2c::new(
            pac.I2C0,
            &mut pac.RESETS,
            clocks.system_clock.freq().to_Hz(),
            I2C_BUS_FREQ_HZ,
        );

        // Exchange buffers live for the rest of the run
        let outbound: &'static mut [u8] =
            singleton!(: [u8; TRANSFER_LEN] = [0; TRANSFER_LEN]).unwrap();
        fill_pattern(outbound, 1);
        let inbound: &'static mut [u8] =
            singleton!(: [u8; TRANSFER_LEN] = [0; TRANSFER_LEN]).unwrap();

        let controller = Controller::new(
            CtTimer::new(probe_pin),
            bus,
            timer,
            ExchangeConfig {
                follower_address: FOLLOWER_ADDRESS,
                ..ExchangeConfig::default()
            },
            outbound,
            inbound,
        );

        debug!("critical_section: install controller");
        critical_section::with(|cs| {
            let mut slot = CONTROLLER.borrow_ref_mut(cs);
            *slot = Some(controller);
            // Init inside the critical section so no edge fires before the
            // handlers can reach the controller.
            slot.as_mut().unwrap().init();
        });

        let mut last_phase = ExchangePhase::Send;
        loop {
            let phase = critical_section::with(|cs| {
                let mut slot = CONTROLLER.borrow_ref_mut(cs);
                let controller = slot.as_mut().unwrap();
                controller.process_action();
                if let Some(period) = controller.take_measurement() {
                    info!("probe period: {=u32} us", period);
                }
                controller.phase()
            });
            if phase != last_phase {
                info!("exchange phase: {=str}", phase_name(phase));
                last_phase = phase;
            }
            cortex_m::asm::wfi();
        }
    }

    /// Display name for a phase.
    fn phase_name(phase: ExchangePhase) -> &'static str {
        match phase {
            ExchangePhase::Send => "send",
            ExchangePhase::Receive => "receive",
            ExchangePhase::Complete => "complete",
        }
    }

    /// Probe pin edge events.
    #[interrupt]
    fn IO_IRQ_BANK0() {
        critical_section::with(|cs| {
            if let Some(controller) = CONTROLLER.borrow_ref_mut(cs).as_mut() {
                controller.on_timer_interrupt();
            }
        });
    }

    /// I2C0 FIFO events.
    #[interrupt]
    fn I2C0_IRQ() {
        critical_section::with(|cs| {
            if let Some(controller) = CONTROLLER.borrow_ref_mut(cs).as_mut() {
                controller.on_i2c_interrupt();
            }
        });
    }
}

/// The firmware only builds for the target; host builds have nothing to run.
#[cfg(not(target_os = "none"))]
fn main() {}
