//! Scheduler tick source on TIM3.

use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::Timer;
use embassy_stm32::{Peri, pac};

use crate::runtime::TICKS;

/// Keeps TIM3 clocked and running; dropping it stops the tick.
pub struct TickTimer {
    _timer: Timer<'static, TIM3>,
}

impl TickTimer {
    /// Starts the update interrupt at `tick_rate_hz`.
    pub fn start(tim: Peri<'static, TIM3>, tick_rate_hz: u32) -> Self {
        let timer = Timer::new(tim);
        timer.set_frequency(Hertz(tick_rate_hz));
        timer.enable_update_interrupt(true);
        timer.start();

        interrupt::TIM3_TIM4.unpend();
        // SAFETY: the handler below only touches the atomic tick counter.
        unsafe { interrupt::TIM3_TIM4.enable() };

        Self { _timer: timer }
    }
}

#[interrupt]
fn TIM3_TIM4() {
    pac::TIM3.sr().modify(|w| w.set_uif(false));
    TICKS.tick();
}
