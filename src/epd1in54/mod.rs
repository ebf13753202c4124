//! Waveshare 1.54" V2 e-paper driver (SSD1681 controller)
//!
//! 200×200 pixels, black/white, driven over 4-wire SPI with separate DC,
//! RST and BUSY lines.
//!
//! ### Usage
//! This driver does not hide that you're working with one buffer for
//! black/white. To display something you:
//!
//! 1. call [`Panel::init`](crate::panel::Panel::init) with the orientation you want
//! 1. write a base image with [`Panel::clear`](crate::panel::Panel::clear) or
//!    [`Panel::write_base_image`](crate::panel::Panel::write_base_image)
//! 1. draw into a [`Paint`](crate::paint::Paint) and hand its buffer to
//!    [`Panel::display_part`](crate::panel::Panel::display_part)
//!
//! Pixel polarity matches the panel RAM: bit set = white.

pub mod driver;
pub mod interface;
pub mod pins;

mod cmd;
mod flag;

pub use driver::Epd1in54;
pub use interface::{BusyPolicy, DisplayInterface};

/// Display width, pixels horizontally
pub const WIDTH: u32 = 200;

/// Display height, pixels vertically
pub const HEIGHT: u32 = 200;

/// Bytes in one full frame
pub const FRAME_LEN: usize = epd_waveshare::buffer_len(WIDTH as usize, HEIGHT as usize);

/// SPI mode the controller expects
pub const SPI_MODE: embedded_hal::spi::Mode = epd_waveshare::SPI_MODE;
