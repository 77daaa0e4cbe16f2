//! Report transport over USART5.

use embassy_stm32::Peri;
use embassy_stm32::peripherals::{PB0, PB1, USART5};
use embassy_stm32::usart::{
    BufferedInterruptHandler, BufferedUart, BufferedUartTx, Config as UartConfig, DataBits,
    Parity, StopBits,
};
use embedded_io::Write;
use node_core::report::{REPORT_CAPACITY, Transport};
use static_cell::StaticCell;

const REPORT_UART_BAUD: u32 = 9_600;
const TX_BUFFER_SIZE: usize = REPORT_CAPACITY * 2;
const RX_BUFFER_SIZE: usize = 16;

static TX_BUFFER: StaticCell<[u8; TX_BUFFER_SIZE]> = StaticCell::new();
static RX_BUFFER: StaticCell<[u8; RX_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => BufferedInterruptHandler<USART5>;
});

/// Interrupt-driven transmitter feeding the radio module.
pub struct UartTransport {
    tx: BufferedUartTx<'static>,
}

impl UartTransport {
    /// Brings up USART5 at 9600 8N1.
    ///
    /// # Panics
    ///
    /// Panics if the peripheral rejects the configuration; there is no way
    /// to report without it.
    pub fn new(
        usart: Peri<'static, USART5>,
        tx_pin: Peri<'static, PB0>,
        rx_pin: Peri<'static, PB1>,
    ) -> Self {
        let mut config = UartConfig::default();
        config.baudrate = REPORT_UART_BAUD;
        config.data_bits = DataBits::DataBits8;
        config.stop_bits = StopBits::STOP1;
        config.parity = Parity::ParityNone;

        let uart = BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            TX_BUFFER.init([0; TX_BUFFER_SIZE]),
            RX_BUFFER.init([0; RX_BUFFER_SIZE]),
            UartIrqs,
            config,
        )
        .expect("failed to initialize report UART");

        let (tx, _rx) = uart.split();
        Self { tx }
    }
}

impl Transport for UartTransport {
    fn send_bytes(&mut self, bytes: &[u8]) {
        // The ring holds two reports, so this only copies into it.
        if self.tx.write_all(bytes).is_err() {
            defmt::warn!("uart: report write failed len={=usize}", bytes.len());
        }
    }
}
