//! SSD1681 driver for the 1.54" V2 panel
//!
//! [`Epd1in54`] owns the bus and pins and tracks the panel lifecycle so the
//! ordering rules of [`Panel`] are enforced instead of documented:
//!
//! - every frame operation fails with [`EpdError::NotInitialized`] before
//!   `init` and with [`EpdError::Sleeping`] after `sleep`
//! - `display_part` fails with [`EpdError::BaseImageMissing`] until `clear`
//!   or `write_base_image` has run since the last `init`
//! - every BUSY wait is bounded by the [`BusyPolicy`]
//!
//! ### RAM addressing
//!
//! X is addressed in bytes, so window edges are aligned down to a multiple
//! of 8 pixels. In [`Orientation::Portrait`] the Y counter runs downwards,
//! so Y window edges and the Y counter are mirrored.
//!
//! ### Update sequences
//!
//! | Operation         | 0x22 value | Flashes |
//! |-------------------|-----------:|---------|
//! | init              | `0xB1`     | no      |
//! | full refresh      | `0xC7`     | yes     |
//! | partial refresh   | `0xFF`     | no      |

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use super::interface::{BusyPolicy, DisplayInterface};
use super::{cmd::Cmd, flag::Flag, FRAME_LEN, HEIGHT, WIDTH};
use crate::panel::{BaseImage, EpdError, Orientation, Panel, PanelState};

/// Settle time after the deep sleep command
const DEEP_SLEEP_SETTLE_MS: u32 = 200;

/// Waveshare 1.54" V2 e-paper driver
///
/// ## Type Parameters
///
/// - `SPI` - SPI device for communication
/// - `BSY` - BUSY input pin (HIGH when display is busy)
/// - `DC` - Data/Command output pin
/// - `RST` - Reset output pin
/// - `DELAY` - Delay provider for timing
pub struct Epd1in54<SPI, BSY, DC, RST, DELAY> {
    interface: DisplayInterface<SPI, BSY, DC, RST, DELAY>,
    busy_policy: BusyPolicy,
    state: PanelState,
    orientation: Option<Orientation>,
    base_image: bool,
}

impl<SPI, BSY, DC, RST, DELAY> Epd1in54<SPI, BSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Take ownership of the bus and pins. Nothing is sent until [`Panel::init`].
    pub fn new(spi: SPI, busy: BSY, dc: DC, rst: RST, delay: DELAY, busy_policy: BusyPolicy) -> Self {
        Self::from_interface(DisplayInterface::new(spi, busy, dc, rst, delay), busy_policy)
    }

    /// Wrap an existing interface
    pub fn from_interface(
        interface: DisplayInterface<SPI, BSY, DC, RST, DELAY>,
        busy_policy: BusyPolicy,
    ) -> Self {
        Epd1in54 {
            interface,
            busy_policy,
            state: PanelState::Powered,
            orientation: None,
            base_image: false,
        }
    }

    /// BUSY timeout and poll interval in use
    pub fn busy_policy(&self) -> BusyPolicy {
        self.busy_policy
    }

    /// Give back the interface, e.g. to inspect a mock bus in tests
    pub fn release(self) -> DisplayInterface<SPI, BSY, DC, RST, DELAY> {
        self.interface
    }

    fn ensure_awake(&self) -> Result<(), EpdError> {
        match self.state {
            PanelState::Powered | PanelState::Initializing => Err(EpdError::NotInitialized),
            PanelState::Sleeping => Err(EpdError::Sleeping),
            PanelState::Ready | PanelState::Active => Ok(()),
        }
    }

    fn ensure_base_image(&self) -> Result<(), EpdError> {
        if self.base_image {
            Ok(())
        } else {
            log::warn!("Partial refresh refused: no base image since init");
            Err(EpdError::BaseImageMissing)
        }
    }

    fn check_frame(buffer: &[u8]) -> Result<(), EpdError> {
        if buffer.len() == FRAME_LEN {
            Ok(())
        } else {
            Err(EpdError::InvalidBuffer {
                expected: FRAME_LEN,
                actual: buffer.len(),
            })
        }
    }

    fn busy_wait(&mut self) -> Result<(), EpdError> {
        self.interface.wait_until_idle(self.busy_policy)
    }

    /// Hardware and software reset followed by the panel configuration
    fn run_init(&mut self, orientation: Orientation) -> Result<(), EpdError> {
        self.interface.reset()?;
        self.busy_wait()?;

        self.interface.cmd(Cmd::SW_RESET)?;
        self.busy_wait()?;

        // Driver output control: 200 gates, scan direction follows orientation
        let scan = match orientation {
            Orientation::Landscape => Flag::DRIVER_OUTPUT_SCAN_FORWARD,
            Orientation::Portrait => Flag::DRIVER_OUTPUT_SCAN_REVERSE,
        };
        self.interface.cmd_with_data(
            Cmd::DRIVER_CONTROL,
            &[Flag::DRIVER_OUTPUT_MUX_LSB, Flag::DRIVER_OUTPUT_MUX_MSB, scan],
        )?;

        let entry = match orientation {
            Orientation::Landscape => Flag::DATA_ENTRY_INCRY_INCRX,
            Orientation::Portrait => Flag::DATA_ENTRY_DECRY_INCRX,
        };
        self.interface.cmd_with_data(Cmd::DATA_ENTRY_MODE, &[entry])?;

        self.set_ram_area(0, 0, WIDTH - 1, HEIGHT - 1)?;

        self.interface
            .cmd_with_data(Cmd::BORDER_WAVEFORM_CONTROL, &[Flag::BORDER_WAVEFORM_FOLLOW_LUT1])?;
        self.interface
            .cmd_with_data(Cmd::TEMP_CONTROL, &[Flag::INTERNAL_TEMP_SENSOR])?;

        // Load temperature value and waveform from OTP
        self.interface
            .cmd_with_data(Cmd::UPDATE_DISPLAY_CTRL2, &[Flag::DISPLAY_UPDATE_LOAD_WAVEFORM])?;
        self.interface.cmd(Cmd::MASTER_ACTIVATE)?;

        self.set_ram_counter(0, 0)?;
        self.busy_wait()
    }

    /// Y as the controller sees it for the current orientation
    fn ram_y(&self, y: u32) -> u32 {
        match self.orientation {
            Some(Orientation::Portrait) => HEIGHT - 1 - y,
            _ => y,
        }
    }

    fn set_ram_area(
        &mut self,
        start_x: u32,
        start_y: u32,
        end_x: u32,
        end_y: u32,
    ) -> Result<(), EpdError> {
        // x is addressed in bytes
        self.interface.cmd_with_data(
            Cmd::SET_RAMX_START_END,
            &[(start_x >> 3) as u8, (end_x >> 3) as u8],
        )?;

        let (start_y, end_y) = (self.ram_y(start_y), self.ram_y(end_y));
        self.interface.cmd_with_data(
            Cmd::SET_RAMY_START_END,
            &[
                start_y as u8,
                (start_y >> 8) as u8,
                end_y as u8,
                (end_y >> 8) as u8,
            ],
        )?;
        Ok(())
    }

    fn set_ram_counter(&mut self, x: u32, y: u32) -> Result<(), EpdError> {
        self.interface
            .cmd_with_data(Cmd::SET_RAMX_COUNTER, &[(x >> 3) as u8])?;

        // 2 Databytes: A[7:0] & 0..A[8]
        let y = self.ram_y(y);
        self.interface
            .cmd_with_data(Cmd::SET_RAMY_COUNTER, &[y as u8, (y >> 8) as u8])?;
        Ok(())
    }

    fn use_full_frame(&mut self) -> Result<(), EpdError> {
        self.set_ram_area(0, 0, WIDTH - 1, HEIGHT - 1)?;
        self.set_ram_counter(0, 0)
    }

    /// Fill one RAM bank with the given base image
    fn write_ram(&mut self, bank: u8, base: BaseImage<'_>) -> Result<(), EpdError> {
        self.use_full_frame()?;
        self.interface.cmd(bank)?;
        match base {
            BaseImage::White => self.interface.data_x_times(Flag::RAM_ALL_WHITE, FRAME_LEN)?,
            BaseImage::Frame(buffer) => self.interface.data(buffer)?,
        }
        Ok(())
    }

    /// Trigger an update sequence and wait for it to finish
    fn refresh(&mut self, sequence: u8) -> Result<(), EpdError> {
        self.interface
            .cmd_with_data(Cmd::UPDATE_DISPLAY_CTRL2, &[sequence])?;
        self.interface.cmd(Cmd::MASTER_ACTIVATE)?;
        self.busy_wait()?;
        self.state = PanelState::Active;
        Ok(())
    }

    /// Load a window into RAM 0x24, clipped to the panel.
    ///
    /// `x` and `width` are aligned down to whole bytes. The row stride of
    /// `buffer` is the aligned width.
    fn load_window(
        &mut self,
        buffer: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), EpdError> {
        let x = x & !7;
        let width = width & !7;
        if width == 0 || height == 0 || x >= WIDTH || y >= HEIGHT {
            log::debug!("Window {}x{} at ({}, {}) is off panel", width, height, x, y);
            return Ok(());
        }

        let stride = (width / 8) as usize;
        let expected = stride * height as usize;
        if buffer.len() < expected {
            return Err(EpdError::InvalidBuffer {
                expected,
                actual: buffer.len(),
            });
        }

        let x_end = (x + width).min(WIDTH) - 1;
        let y_end = (y + height).min(HEIGHT) - 1;
        let sent = ((x_end - x + 1) / 8) as usize;
        let rows = (y_end - y + 1) as usize;

        self.busy_wait()?;
        self.set_ram_area(x, y, x_end, y_end)?;
        self.set_ram_counter(x, y)?;
        self.interface.cmd(Cmd::WRITE_BW_DATA)?;
        if sent == stride {
            self.interface.data(&buffer[..stride * rows])?;
        } else {
            for row in buffer.chunks(stride).take(rows) {
                self.interface.data(&row[..sent])?;
            }
        }
        Ok(())
    }
}

impl<SPI, BSY, DC, RST, DELAY> Panel for Epd1in54<SPI, BSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    fn width(&self) -> u32 {
        WIDTH
    }

    fn height(&self) -> u32 {
        HEIGHT
    }

    fn state(&self) -> PanelState {
        self.state
    }

    fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    fn has_base_image(&self) -> bool {
        self.base_image
    }

    fn init(&mut self, orientation: Orientation) -> Result<(), EpdError> {
        log::info!("Initializing 1.54\" panel in {:?} orientation", orientation);
        self.state = PanelState::Initializing;
        self.orientation = Some(orientation);
        self.base_image = false;

        match self.run_init(orientation) {
            Ok(()) => {
                self.state = PanelState::Ready;
                Ok(())
            }
            Err(e) => {
                log::error!("Panel init failed: {}", e);
                self.state = PanelState::Powered;
                self.orientation = None;
                Err(e)
            }
        }
    }

    fn clear(&mut self) -> Result<(), EpdError> {
        self.ensure_awake()?;
        log::info!("Clearing panel to white");
        self.busy_wait()?;
        self.write_ram(Cmd::WRITE_BW_DATA, BaseImage::White)?;
        self.write_ram(Cmd::WRITE_PREVIOUS_DATA, BaseImage::White)?;
        self.refresh(Flag::DISPLAY_UPDATE_FULL)?;
        self.base_image = true;
        Ok(())
    }

    fn write_base_image(&mut self, base: BaseImage<'_>) -> Result<(), EpdError> {
        self.ensure_awake()?;
        if let BaseImage::Frame(buffer) = base {
            Self::check_frame(buffer)?;
        }
        log::info!("Writing base image");
        self.busy_wait()?;
        self.write_ram(Cmd::WRITE_BW_DATA, base)?;
        self.write_ram(Cmd::WRITE_PREVIOUS_DATA, base)?;
        self.refresh(Flag::DISPLAY_UPDATE_FULL)?;
        self.base_image = true;
        Ok(())
    }

    fn wait_until_idle(&mut self) -> Result<(), EpdError> {
        self.busy_wait()
    }

    fn set_frame_memory(
        &mut self,
        buffer: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), EpdError> {
        self.ensure_awake()?;
        self.load_window(buffer, x, y, width, height)
    }

    fn display_frame(&mut self) -> Result<(), EpdError> {
        self.ensure_awake()?;
        self.busy_wait()?;
        self.refresh(Flag::DISPLAY_UPDATE_FULL)
    }

    fn display_part(&mut self, buffer: &[u8]) -> Result<(), EpdError> {
        self.ensure_awake()?;
        self.ensure_base_image()?;
        Self::check_frame(buffer)?;
        self.busy_wait()?;
        self.use_full_frame()?;
        self.interface.cmd_with_data(Cmd::WRITE_BW_DATA, buffer)?;
        self.refresh(Flag::DISPLAY_UPDATE_PARTIAL)
    }

    fn display_part_window(
        &mut self,
        buffer: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), EpdError> {
        self.ensure_awake()?;
        self.ensure_base_image()?;
        self.load_window(buffer, x, y, width, height)?;
        self.refresh(Flag::DISPLAY_UPDATE_PARTIAL)
    }

    fn sleep(&mut self) -> Result<(), EpdError> {
        if self.state == PanelState::Sleeping {
            log::debug!("Panel already asleep");
            return Ok(());
        }
        // Cutting the supply mid-refresh can damage the panel
        if matches!(self.state, PanelState::Ready | PanelState::Active) {
            self.busy_wait()?;
        }
        log::info!("Entering deep sleep");
        self.interface
            .cmd_with_data(Cmd::DEEP_SLEEP_MODE, &[Flag::DEEP_SLEEP_MODE_1])?;
        self.interface.delay_ms(DEEP_SLEEP_SETTLE_MS);
        self.state = PanelState::Sleeping;
        self.orientation = None;
        self.base_image = false;
        Ok(())
    }
}
