//! Register-level ADC driver behind the acquisition state machine.
//!
//! The acquisition cycle needs to trigger single conversions, poll or sleep
//! on their completion and switch the reference between channels, so the
//! converter is programmed directly rather than through the HAL's blocking
//! reader. The conversion-complete interrupt only copies the data register
//! into [`CONVERSION_SLOT`].

use embassy_stm32::Peri;
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::InterruptExt;
use embassy_stm32::pac::{self, ADC1, RCC, VREFBUF};
use embassy_stm32::peripherals;
use node_core::acquisition::{AnalogFrontEnd, ConversionSlot, RawSample, Reference};

/// Handoff written by the ADC interrupt.
pub static CONVERSION_SLOT: ConversionSlot = ConversionSlot::new();

/// Output of the reference buffer with the default voltage scale.
pub const VREFBUF_VOLTS: f32 = 2.048;

const VREFBUF_ENVR: u32 = 1 << 0;
const VREFBUF_HIZ: u32 = 1 << 1;
const VREFBUF_VRR: u32 = 1 << 3;

/// Regulator start-up time (20 µs) at the 16 MHz reset clock, with margin.
const ADC_REGULATOR_STARTUP_CYCLES: u32 = 1_000;

/// Longest sample time; both sources have a high output impedance.
const SAMPLE_TIME_160_5_CYCLES: u8 = 0b111;

pub struct AdcFrontEnd {
    _adc: Peri<'static, peripherals::ADC1>,
    reference: Option<Reference>,
}

impl AdcFrontEnd {
    /// Powers, calibrates and enables ADC1 in single-conversion mode.
    pub fn new(adc: Peri<'static, peripherals::ADC1>) -> Self {
        RCC.apbenr2().modify(|w| {
            w.set_adcen(true);
            w.set_syscfgen(true);
        });

        ADC1.cr().modify(|w| w.set_advregen(true));
        cortex_m::asm::delay(ADC_REGULATOR_STARTUP_CYCLES);

        ADC1.cr().modify(|w| w.set_adcal(true));
        while ADC1.cr().read().adcal() {}

        ADC1.smpr().modify(|w| w.set_smp1(SAMPLE_TIME_160_5_CYCLES.into()));
        ADC1.isr().write(|w| w.set_adrdy(true));
        ADC1.cr().modify(|w| w.set_aden(true));
        while !ADC1.isr().read().adrdy() {}

        interrupt::ADC1_COMP.unpend();
        // SAFETY: the handler only reads the data register and stores into the slot.
        unsafe { interrupt::ADC1_COMP.enable() };

        Self {
            _adc: adc,
            reference: None,
        }
    }

    fn apply_reference(reference: Reference) {
        match reference {
            Reference::InternalFixed => {
                VREFBUF
                    .csr()
                    .write_value(pac::vrefbuf::regs::Csr(VREFBUF_ENVR));
                while VREFBUF.csr().read().0 & VREFBUF_VRR == 0 {}
            }
            // Buffer off and disconnected: VREF+ follows whatever drives the
            // pin, which the board ties to VDDA or to the sensor reference.
            Reference::Supply | Reference::External => {
                VREFBUF
                    .csr()
                    .write_value(pac::vrefbuf::regs::Csr(VREFBUF_HIZ));
            }
        }
    }
}

impl AnalogFrontEnd for AdcFrontEnd {
    fn select(&mut self, channel: u8, reference: Reference) {
        if self.reference != Some(reference) {
            Self::apply_reference(reference);
            self.reference = Some(reference);
        }

        ADC1.isr().write(|w| w.set_ccrdy(true));
        ADC1.chselr()
            .write_value(pac::adc::regs::Chselr(1 << u32::from(channel)));
        while !ADC1.isr().read().ccrdy() {}
    }

    fn start_conversion(&mut self) {
        ADC1.cr().modify(|w| w.set_adstart(true));
    }

    fn conversion_complete(&mut self) -> bool {
        ADC1.isr().read().eoc()
    }

    fn read_result(&mut self) -> RawSample {
        ADC1.dr().read().data()
    }

    fn set_completion_interrupt(&mut self, enabled: bool) {
        ADC1.ier().modify(|w| w.set_eocie(enabled));
    }

    fn wait_for_interrupt(&mut self) {
        // WFI with interrupts masked still wakes on a pending request, which
        // then runs as soon as the critical section ends. Checking inside the
        // section means a completion cannot slip in between check and sleep.
        critical_section::with(|_| {
            if !CONVERSION_SLOT.is_ready() {
                cortex_m::asm::wfi();
            }
        });
    }

    fn completion_slot(&self) -> &ConversionSlot {
        &CONVERSION_SLOT
    }
}

#[interrupt]
fn ADC1_COMP() {
    if ADC1.isr().read().eoc() {
        // Reading DR clears EOC.
        CONVERSION_SLOT.complete(ADC1.dr().read().data());
    }
}
