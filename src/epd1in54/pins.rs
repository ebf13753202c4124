//! Pin definitions for the 1.54" e-paper module on an ESP32
//!
//! DC and CS are strapping-sensitive: DC pulled low or CS pulled high can
//! stop the chip from booting.

/// GPIO assignments for the display
pub struct Pins;

#[allow(dead_code)]
impl Pins {
    /// Busy status pin (High when display is busy)
    pub const BUSY: u8 = 19;
    /// Reset pin for display
    pub const RST: u8 = 18;
    /// Data/Command control pin (High for data, Low for command)
    pub const DC: u8 = 23;
    /// Chip Select pin for SPI display
    pub const CS: u8 = 4;
    /// SPI Clock pin
    pub const SCK: u8 = 22;
    /// SPI Master Out Slave In
    pub const MOSI: u8 = 21;
}
