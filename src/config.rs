//! Runtime tunables
//!
//! Panel geometry and wiring are compile-time constants in
//! [`crate::epd1in54`]; everything that can reasonably change per
//! deployment lives here.

use std::time::Duration;

use crate::epd1in54::BusyPolicy;
use crate::image::Binarization;
use crate::qr::Ecc;

/// Where the last generated QR code is written
pub const SNAPSHOT_PATH: &str = "/generated-qr-code.bmp";

/// Mount point of the flash filesystem on the device
pub const STORAGE_ROOT: &str = "/spiffs";

/// Banner QR code shown under status text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BannerQr {
    /// QR version, fixes the module count
    pub version: u8,
    /// Error correction level
    pub ecc: Ecc,
    /// Pixels per module side
    pub block: u32,
}

impl Default for BannerQr {
    fn default() -> Self {
        BannerQr {
            version: 5,
            ecc: Ecc::Low,
            block: 3,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// BUSY wait budget
    pub busy: BusyPolicy,
    /// Delay between an upload finishing and the image being shown
    pub image_delay: Duration,
    /// Delay between a QR request and the code being shown
    pub qr_delay: Duration,
    /// Output path of the QR snapshot
    pub snapshot_path: String,
    /// Filesystem root for [`crate::storage::FsStorage`]
    pub storage_root: String,
    /// Banner QR parameters
    pub banner: BannerQr,
    /// Per-codec binarization
    pub binarization: Binarization,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            busy: BusyPolicy::default(),
            image_delay: Duration::from_millis(2000),
            qr_delay: Duration::from_millis(500),
            snapshot_path: SNAPSHOT_PATH.to_string(),
            storage_root: STORAGE_ROOT.to_string(),
            banner: BannerQr::default(),
            binarization: Binarization::default(),
        }
    }
}
