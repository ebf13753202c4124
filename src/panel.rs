//! Panel contract shared by the driver and the application layer
//!
//! The sequencing rules live here rather than in a specific controller:
//!
//! 1. [`Panel::init`] before anything else, and again to change orientation
//! 2. A base image ([`Panel::write_base_image`] or [`Panel::clear`]) before any partial refresh
//! 3. [`Panel::wait_until_idle`] before every frame operation
//! 4. [`Panel::init`] again after [`Panel::sleep`]

use std::mem;

use display_interface::DisplayError;

/// RAM addressing direction chosen at init time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// X and Y increment, gates scanned forward
    Landscape,
    /// X increments, Y decrements, gates scanned in reverse
    Portrait,
}

/// Lifecycle of the panel controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    /// Power applied, controller not configured
    Powered,
    /// Init sequence in progress
    Initializing,
    /// Configured, nothing shown since init
    Ready,
    /// A frame has been shown
    Active,
    /// Deep sleep; needs init before the next frame
    Sleeping,
}

impl std::fmt::Display for PanelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelState::Powered => write!(f, "powered"),
            PanelState::Initializing => write!(f, "initializing"),
            PanelState::Ready => write!(f, "ready"),
            PanelState::Active => write!(f, "active"),
            PanelState::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// Reference frame the partial refresh diffs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseImage<'a> {
    /// All white
    White,
    /// A full panel sized frame
    Frame(&'a [u8]),
}

/// Errors from the panel controller
#[derive(Debug, Clone)]
pub enum EpdError {
    /// SPI or GPIO failure
    Interface(DisplayError),
    /// The BUSY line could not be read
    BusyPin,
    /// BUSY never cleared within the configured budget
    BusyTimeout {
        /// Time spent polling before giving up
        waited_ms: u32,
    },
    /// A frame operation before `init`
    NotInitialized,
    /// A frame operation while in deep sleep
    Sleeping,
    /// Partial refresh without a base image in the current orientation
    BaseImageMissing,
    /// Frame buffer has the wrong length
    InvalidBuffer {
        /// Bytes required
        expected: usize,
        /// Bytes given
        actual: usize,
    },
}

// DisplayError has no PartialEq; interface errors compare by variant
impl PartialEq for EpdError {
    fn eq(&self, other: &Self) -> bool {
        use EpdError::*;
        match (self, other) {
            (Interface(a), Interface(b)) => mem::discriminant(a) == mem::discriminant(b),
            (BusyTimeout { waited_ms: a }, BusyTimeout { waited_ms: b }) => a == b,
            (
                InvalidBuffer {
                    expected: e1,
                    actual: a1,
                },
                InvalidBuffer {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (BusyPin, BusyPin)
            | (NotInitialized, NotInitialized)
            | (Sleeping, Sleeping)
            | (BaseImageMissing, BaseImageMissing) => true,
            _ => false,
        }
    }
}

impl Eq for EpdError {}

impl From<DisplayError> for EpdError {
    fn from(error: DisplayError) -> Self {
        EpdError::Interface(error)
    }
}

impl std::fmt::Display for EpdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpdError::Interface(e) => write!(f, "display interface error: {:?}", e),
            EpdError::BusyPin => write!(f, "could not read BUSY pin"),
            EpdError::BusyTimeout { waited_ms } => {
                write!(f, "device unresponsive: BUSY still high after {} ms", waited_ms)
            }
            EpdError::NotInitialized => write!(f, "panel not initialized"),
            EpdError::Sleeping => write!(f, "panel is in deep sleep"),
            EpdError::BaseImageMissing => {
                write!(f, "partial refresh requires a base image in the current orientation")
            }
            EpdError::InvalidBuffer { expected, actual } => {
                write!(f, "frame buffer is {} bytes, expected {}", actual, expected)
            }
        }
    }
}

impl std::error::Error for EpdError {}

/// A 1-bit e-paper panel with base-image partial refresh
pub trait Panel {
    /// Native width in pixels
    fn width(&self) -> u32;

    /// Native height in pixels
    fn height(&self) -> u32;

    /// Current lifecycle state
    fn state(&self) -> PanelState;

    /// Orientation chosen by the last init, if still valid
    fn orientation(&self) -> Option<Orientation>;

    /// Whether a partial refresh is currently allowed
    fn has_base_image(&self) -> bool;

    /// Reset and configure the controller
    fn init(&mut self, orientation: Orientation) -> Result<(), EpdError>;

    /// Write white to both RAM banks and do a full refresh
    fn clear(&mut self) -> Result<(), EpdError>;

    /// Store the reference frame for partial refreshes
    fn write_base_image(&mut self, base: BaseImage<'_>) -> Result<(), EpdError>;

    /// Poll BUSY until it clears or the timeout expires
    fn wait_until_idle(&mut self) -> Result<(), EpdError>;

    /// Load a region of panel RAM without refreshing
    fn set_frame_memory(
        &mut self,
        buffer: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), EpdError>;

    /// Full, flashing refresh from panel RAM
    fn display_frame(&mut self) -> Result<(), EpdError>;

    /// Write a full frame and do a partial refresh
    fn display_part(&mut self, buffer: &[u8]) -> Result<(), EpdError>;

    /// Write one window and do a partial refresh
    fn display_part_window(
        &mut self,
        buffer: &[u8],
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), EpdError>;

    /// Enter deep sleep
    fn sleep(&mut self) -> Result<(), EpdError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_errors_compare_by_kind() {
        assert_eq!(
            EpdError::from(DisplayError::BusWriteError),
            EpdError::Interface(DisplayError::BusWriteError)
        );
        assert_ne!(
            EpdError::from(DisplayError::BusWriteError),
            EpdError::from(DisplayError::DCError)
        );
        assert_ne!(EpdError::from(DisplayError::RSError), EpdError::BusyPin);
    }

    #[test]
    fn payload_fields_take_part_in_equality() {
        assert_eq!(
            EpdError::BusyTimeout { waited_ms: 100 },
            EpdError::BusyTimeout { waited_ms: 100 }
        );
        assert_ne!(
            EpdError::BusyTimeout { waited_ms: 100 },
            EpdError::BusyTimeout { waited_ms: 90 }
        );
        assert_ne!(
            EpdError::InvalidBuffer {
                expected: 5000,
                actual: 10
            },
            EpdError::InvalidBuffer {
                expected: 5000,
                actual: 11
            }
        );
        assert_eq!(EpdError::Sleeping, EpdError::Sleeping);
        assert_ne!(EpdError::Sleeping, EpdError::NotInitialized);
    }
}
