//! Device entry point and main loop.

use cortex_m::interrupt;
use cortex_m::register::primask;
use cortex_m_rt::entry;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_stm32 as hal;
use node_core::acquisition::{AcquisitionConfig, ChannelConfig, FULL_SCALE_12_BIT, Reference};
use node_core::acquisition::scaling::{BATTERY_DIVIDER_RATIO, LIGHT_SCALE_PERCENT};
use node_core::config::NodeConfig;
use node_core::node::{NodeScheduler, SensorNode, register_activities};
use node_core::scheduler::{EventScheduler, MAX_ACTIVITIES, TickCounter};
use static_cell::StaticCell;

use crate::hw::adc::{AdcFrontEnd, VREFBUF_VOLTS};
use crate::hw::led::BoardLed;
use crate::hw::tick::TickTimer;
use crate::hw::uart::UartTransport;
use crate::telemetry::TelemetryDrain;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Advanced only by the TIM3 update interrupt.
pub static TICKS: TickCounter = TickCounter::new();

type Node = SensorNode<AdcFrontEnd, BoardLed, UartTransport>;
type Scheduler = NodeScheduler<&'static TickCounter, AdcFrontEnd, BoardLed, UartTransport, MAX_ACTIVITIES>;

static NODE: StaticCell<Node> = StaticCell::new();
static SCHEDULER: StaticCell<Scheduler> = StaticCell::new();

/// The G0 has no 1.1 V reference; the battery divider is read against the
/// 2.048 V buffer and the 12-bit converter is used at full resolution.
const BOARD_CONFIG: NodeConfig = NodeConfig::new().with_acquisition(
    AcquisitionConfig::new()
        .with_full_scale(FULL_SCALE_12_BIT)
        .with_battery(ChannelConfig::new(
            0,
            Reference::InternalFixed,
            VREFBUF_VOLTS * BATTERY_DIVIDER_RATIO,
        ))
        .with_light(ChannelConfig::new(1, Reference::External, LIGHT_SCALE_PERCENT)),
);

#[entry]
fn main() -> ! {
    let hal::Peripherals {
        ADC1,
        PA5,
        PB0,
        PB1,
        TIM3,
        USART5,
        ..
    } = hal::init(hal::Config::default());

    let front_end = AdcFrontEnd::new(ADC1);
    let led = BoardLed::new(PA5);
    let transport = UartTransport::new(USART5, PB0, PB1);

    let node = NODE.init(SensorNode::new(front_end, led, transport, &BOARD_CONFIG));
    let scheduler = SCHEDULER.init(EventScheduler::new(&TICKS));
    if let Err(error) = register_activities(scheduler, &BOARD_CONFIG) {
        defmt::error!(
            "activity registration failed: {}",
            defmt::Display2Format(&error)
        );
        node.telemetry_mut().record_rejection(error, TICKS.now());
    }

    let _tick_timer = TickTimer::start(TIM3, BOARD_CONFIG.tick_rate_hz);
    let mut drain = TelemetryDrain::new(BOARD_CONFIG.tick_rate_hz);
    defmt::info!(
        "sensor node running: {=u32} Hz tick, {=usize} activities",
        BOARD_CONFIG.tick_rate_hz,
        scheduler.len()
    );

    loop {
        scheduler.dispatch_due(node);
        drain.flush(node.telemetry());
        cortex_m::asm::wfi();
    }
}
