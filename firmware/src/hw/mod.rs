//! Board support for the STM32G0B1 sensor node.
//!
//! Pin map: battery divider on PA0 (ADC_IN0), light sensor on PA1 (ADC_IN1),
//! status LED on PA5 (active low), report UART on USART5 (TX PB0, RX PB1).

pub mod adc;
pub mod led;
pub mod tick;
pub mod uart;
