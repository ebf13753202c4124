//! Display interface using SPI
use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

use crate::panel::EpdError;

/// Bytes pushed per SPI transaction when repeating a fill value
const CHUNK_SIZE: usize = 32;

/// How long to wait for BUSY to drop and how often to look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyPolicy {
    /// Give up after this many milliseconds
    pub timeout_ms: u32,
    /// Sleep between reads; this is where other tasks get to run
    pub poll_interval_ms: u32,
}

impl Default for BusyPolicy {
    fn default() -> Self {
        // A full refresh takes roughly 2 s on this panel
        BusyPolicy {
            timeout_ms: 10_000,
            poll_interval_ms: 10,
        }
    }
}

/// The Connection Interface of the Waveshare EPD module
pub struct DisplayInterface<SPI, BSY, DC, RST, DELAY> {
    /// SPI device
    spi: SPI,
    /// High for busy, wait until display is ready!
    busy: BSY,
    /// Data/Command Control Pin (High for data, Low for command)
    dc: DC,
    /// Pin for Reseting
    rst: RST,
    /// Blocking delay, also used while polling BUSY
    delay: DELAY,
}

impl<SPI, BSY, DC, RST, DELAY> DisplayInterface<SPI, BSY, DC, RST, DELAY> {
    /// Bundle the bus and pins; nothing is sent yet
    pub fn new(spi: SPI, busy: BSY, dc: DC, rst: RST, delay: DELAY) -> Self {
        DisplayInterface {
            spi,
            busy,
            dc,
            rst,
            delay,
        }
    }

    /// Give back the bus and pins
    pub fn release(self) -> (SPI, BSY, DC, RST, DELAY) {
        (self.spi, self.busy, self.dc, self.rst, self.delay)
    }
}

impl<SPI, BSY, DC, RST, DELAY> DisplayInterface<SPI, BSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Basic function for sending commands
    pub(crate) fn cmd(&mut self, command: u8) -> Result<(), DisplayError> {
        // low for commands
        self.dc.set_low().map_err(|_| DisplayError::DCError)?;

        match self.spi.write(&[command]) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("SPI write error for command 0x{:02X}: {:?}", command, e);
                Err(DisplayError::BusWriteError)
            }
        }
    }

    /// Basic function for sending an array of u8-values of data over spi
    pub(crate) fn data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        // high for data
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;
        self.spi
            .write(data)
            .map_err(|_| DisplayError::BusWriteError)
    }

    /// Basic function for sending a command and the data belonging to it.
    pub(crate) fn cmd_with_data(&mut self, command: u8, data: &[u8]) -> Result<(), DisplayError> {
        self.cmd(command)?;
        self.data(data)
    }

    /// Send the same byte `repetitions` times.
    /// Used for setting one color for the whole frame
    pub(crate) fn data_x_times(&mut self, val: u8, repetitions: usize) -> Result<(), DisplayError> {
        // high for data
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;

        let buffer = [val; CHUNK_SIZE];
        let full_chunks = repetitions / CHUNK_SIZE;
        let remainder = repetitions % CHUNK_SIZE;

        for _ in 0..full_chunks {
            self.spi
                .write(&buffer)
                .map_err(|_| DisplayError::BusWriteError)?;
        }
        if remainder > 0 {
            self.spi
                .write(&buffer[..remainder])
                .map_err(|_| DisplayError::BusWriteError)?;
        }

        log::debug!("Completed sending {} bytes of 0x{:02X}", repetitions, val);
        Ok(())
    }

    /// Poll BUSY until it goes LOW.
    ///
    /// Reads the pin, and while it stays high sleeps one poll interval
    /// before reading again. Gives up once `timeout_ms` has been spent
    /// sleeping, so a stuck panel costs at most one timeout.
    pub(crate) fn wait_until_idle(&mut self, policy: BusyPolicy) -> Result<(), EpdError> {
        let step = policy.poll_interval_ms.max(1);
        let mut waited_ms: u32 = 0;

        loop {
            let busy = self.busy.is_high().map_err(|_| EpdError::BusyPin)?;
            if !busy {
                if waited_ms > 0 {
                    log::debug!("BUSY cleared after {} ms", waited_ms);
                }
                return Ok(());
            }
            if waited_ms >= policy.timeout_ms {
                log::error!("BUSY still high after {} ms, giving up", waited_ms);
                return Err(EpdError::BusyTimeout { waited_ms });
            }
            self.delay.delay_ms(step);
            waited_ms = waited_ms.saturating_add(step);
        }
    }

    /// Hardware reset: RST high, pulse low, back high
    pub(crate) fn reset(&mut self) -> Result<(), DisplayError> {
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(20);
        self.rst.set_low().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(2);
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(20);
        Ok(())
    }

    /// Plain blocking delay
    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
