use embassy_stm32::Peri;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::peripherals::PA5;
use node_core::node::StatusLed;

/// Status LED wired between the supply and PA5.
pub struct BoardLed {
    pin: Output<'static>,
}

impl BoardLed {
    /// Configures the pin with the LED off.
    pub fn new(pin: Peri<'static, PA5>) -> Self {
        Self {
            pin: Output::new(pin, Level::High, Speed::Low),
        }
    }
}

impl StatusLed for BoardLed {
    fn set(&mut self, lit: bool) {
        if lit {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
    }
}
