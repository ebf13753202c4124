/// Parameter values for the commands in [`super::cmd::Cmd`].
pub struct Flag;
#[allow(missing_docs)]
impl Flag {
    // Driver Output Control (0x01): MUX = 200 gate lines, then scan direction
    pub const DRIVER_OUTPUT_MUX_LSB: u8 = 0xC7;
    pub const DRIVER_OUTPUT_MUX_MSB: u8 = 0x00;
    pub const DRIVER_OUTPUT_SCAN_FORWARD: u8 = 0x00;
    pub const DRIVER_OUTPUT_SCAN_REVERSE: u8 = 0x01;

    // Data Entry Mode (0x11)
    pub const DATA_ENTRY_DECRY_INCRX: u8 = 0x01; // Y decrement, X increment
    pub const DATA_ENTRY_INCRY_INCRX: u8 = 0x03; // Y increment, X increment

    // Border Waveform Control (0x3C)
    pub const BORDER_WAVEFORM_FOLLOW_LUT1: u8 = 0x01;

    // Temperature Sensor Control (0x18)
    pub const INTERNAL_TEMP_SENSOR: u8 = 0x80;

    // Display Update Control 2 (0x22) sequences
    pub const DISPLAY_UPDATE_LOAD_WAVEFORM: u8 = 0xB1; // Load temperature and OTP waveform
    pub const DISPLAY_UPDATE_FULL: u8 = 0xC7; // Full refresh, clears ghosting
    pub const DISPLAY_UPDATE_PARTIAL: u8 = 0xFF; // Partial refresh against RAM 0x26

    // Deep Sleep Mode (0x10)
    pub const DEEP_SLEEP_MODE_1: u8 = 0x01; // Keep RAM, lowest power

    // RAM fill values
    pub const RAM_ALL_WHITE: u8 = 0xFF;
}
