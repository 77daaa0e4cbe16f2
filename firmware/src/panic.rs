use core::panic::PanicInfo;

use defmt::Display2Format;

use crate::runtime::TICKS;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    defmt::error!("panic at tick {=u32}: {}", TICKS.now(), Display2Format(info));
    cortex_m::asm::udf();
}
