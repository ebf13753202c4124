//! Application context
//!
//! [`ImageLoad`] owns the framebuffer, the panel, storage and settings, and
//! is the only thing that touches them. Requests that should not block the
//! caller (show an image after an upload, render a QR code after a form
//! post) go into a single deferred slot that the main loop drains with
//! [`ImageLoad::poll`]. Scheduling a new job replaces the pending one.

use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::image::{draw_image, DecodeSummary, ImageError, ImageKind};
use crate::paint::{draw_lines, line_height, Color, Paint, PaintError, Rotation};
use crate::paint::{LARGE_FONT, SMALL_FONT};
use crate::panel::{BaseImage, EpdError, Orientation, Panel};
use crate::qr::{self, Ecc, Placement, QrError};
use crate::snapshot;
use crate::storage::Storage;

/// What the panel is doing, as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Booted, nothing requested yet
    Powered,
    /// An image is being or has been drawn
    Active,
    /// An image is queued for display
    DisplayingImage,
    /// A generated QR code is on screen
    ShowingQr,
    /// Panel in deep sleep
    Sleeping,
    /// Panel wiped white
    Cleared,
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisplayState::Powered => "Powered",
            DisplayState::Active => "active",
            DisplayState::DisplayingImage => "displaying image",
            DisplayState::ShowingQr => "showing generated QR",
            DisplayState::Sleeping => "sleeping",
            DisplayState::Cleared => "cleared",
        };
        f.write_str(label)
    }
}

/// Label used for the current image of a generated QR code
pub const GENERATED_QR: &str = "generated QR";

/// Current image and panel state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// File or generated content on screen, if any
    pub current_image: Option<String>,
    /// Panel state label
    pub state: DisplayState,
}

impl Status {
    /// Current image, or `<none>`
    pub fn current_image_label(&self) -> &str {
        self.current_image.as_deref().unwrap_or("<none>")
    }
}

impl Default for Status {
    fn default() -> Self {
        Status {
            current_image: None,
            state: DisplayState::Powered,
        }
    }
}

/// Parameters of a full-screen QR code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRequest {
    /// Encoded text
    pub text: String,
    /// QR version 1..=40
    pub version: u8,
    /// Error correction level
    pub ecc: Ecc,
    /// Grow modules to fill the panel
    pub scale: bool,
}

/// Work for the deferred slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Decode and show a stored image
    ShowImage(String),
    /// Render a QR code full screen
    ShowQr(QrRequest),
}

/// Single-slot timer: at most one job waits, a new one replaces it
#[derive(Debug)]
pub struct Deferred<T> {
    slot: Option<(Instant, T)>,
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Deferred { slot: None }
    }
}

impl<T> Deferred<T> {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` at `due`, returning the job it displaced
    pub fn schedule(&mut self, job: T, due: Instant) -> Option<T> {
        self.slot.replace((due, job)).map(|(_, old)| old)
    }

    /// Drop the pending job
    pub fn cancel(&mut self) -> Option<T> {
        self.slot.take().map(|(_, job)| job)
    }

    /// Pending job, if any
    pub fn pending(&self) -> Option<&T> {
        self.slot.as_ref().map(|(_, job)| job)
    }

    /// When the pending job is due
    pub fn due(&self) -> Option<Instant> {
        self.slot.as_ref().map(|(due, _)| *due)
    }

    /// Take the job if it is due at `now`
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.slot {
            Some((due, _)) if *due <= now => self.cancel(),
            _ => None,
        }
    }
}

/// Whether a banner got its QR code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    /// Text and QR code
    WithQr,
    /// QR generation failed, fallback text shown instead
    TextOnly,
}

/// Errors surfaced by [`ImageLoad`]
#[derive(Debug)]
pub enum AppError {
    /// Requested file does not exist
    NotFound(String),
    /// Decoding failed
    Image(ImageError),
    /// Panel failure
    Panel(EpdError),
    /// Framebuffer misuse
    Paint(PaintError),
    /// QR generation or placement failed
    Qr(QrError),
    /// Storage failure outside decoding
    Io(io::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(name) => write!(f, "image file {} not found", name),
            AppError::Image(e) => write!(f, "{}", e),
            AppError::Panel(e) => write!(f, "{}", e),
            AppError::Paint(e) => write!(f, "{}", e),
            AppError::Qr(e) => write!(f, "{}", e),
            AppError::Io(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::NotFound(_) => None,
            AppError::Image(e) => Some(e),
            AppError::Panel(e) => Some(e),
            AppError::Paint(e) => Some(e),
            AppError::Qr(e) => Some(e),
            AppError::Io(e) => Some(e),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(error: ImageError) -> Self {
        AppError::Image(error)
    }
}

impl From<EpdError> for AppError {
    fn from(error: EpdError) -> Self {
        AppError::Panel(error)
    }
}

impl From<PaintError> for AppError {
    fn from(error: PaintError) -> Self {
        AppError::Paint(error)
    }
}

impl From<QrError> for AppError {
    fn from(error: QrError) -> Self {
        AppError::Qr(error)
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        AppError::Io(error)
    }
}

/// Top edge of the banner QR code under `lines` of status text
fn banner_qr_top(lines: usize) -> u32 {
    LARGE_FONT.character_size.height + SMALL_FONT.character_size.height * lines as u32
}

/// Framebuffer, panel, storage and settings behind one owner
pub struct ImageLoad<P, S> {
    panel: P,
    paint: Paint,
    storage: S,
    config: Config,
    status: Status,
    pending: Deferred<Job>,
}

impl<P: Panel, S: Storage> ImageLoad<P, S> {
    /// Nothing is sent to the panel until [`ImageLoad::startup`]
    pub fn new(panel: P, storage: S, config: Config) -> Self {
        ImageLoad {
            panel,
            paint: Paint::new(),
            storage,
            config,
            status: Status::default(),
            pending: Deferred::new(),
        }
    }

    /// The panel driver
    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// The framebuffer as last drawn
    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    /// The storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Settings in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current image and state
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Job waiting in the deferred slot
    pub fn pending(&self) -> Option<&Job> {
        self.pending.pending()
    }

    /// Give back the panel and storage
    pub fn into_parts(self) -> (P, S) {
        (self.panel, self.storage)
    }

    /// Bring the panel up white and show "Initializing"
    pub fn startup(&mut self) -> Result<(), AppError> {
        log::info!("Starting image display");
        self.panel.init(Orientation::Landscape)?;
        self.panel.clear()?;
        self.show_message(&["Initializing"])
    }

    /// Full-screen status text with a full refresh.
    ///
    /// The first line uses the large font, the rest the small one.
    pub fn show_message(&mut self, lines: &[&str]) -> Result<(), AppError> {
        let (width, height) = (self.panel.width(), self.panel.height());
        self.paint.set_rotation(Rotation::Rotate0);
        self.paint.reset(width, height)?;
        self.paint.clear(Color::White);
        draw_lines(&mut self.paint, 0, lines, Color::Black);

        self.panel.wait_until_idle()?;
        self.panel
            .set_frame_memory(self.paint.buffer(), 0, 0, self.paint.width(), self.paint.height())?;
        self.panel.display_frame()?;
        Ok(())
    }

    /// Status text at the top and a QR code of `qr_text` centered below.
    ///
    /// When the text does not fit a QR code of the banner version,
    /// `fallback` is shown as a full-screen message instead.
    pub fn show_banner(
        &mut self,
        lines: &[&str],
        qr_text: &str,
        fallback: &[&str],
    ) -> Result<Banner, AppError> {
        self.panel.init(Orientation::Landscape)?;
        self.panel.write_base_image(BaseImage::White)?;

        let width = self.panel.width();
        self.paint.set_rotation(Rotation::Rotate0);
        self.paint.reset(width, line_height(lines.len()))?;
        self.paint.clear(Color::White);
        draw_lines(&mut self.paint, 0, lines, Color::Black);
        self.panel
            .set_frame_memory(self.paint.buffer(), 0, 0, self.paint.width(), self.paint.height())?;

        let banner = self.config.banner;
        let code = match qr::generate(qr_text, banner.version, banner.ecc) {
            Ok(code) => code,
            Err(e) => {
                log::warn!("Banner QR code failed ({}), showing text only", e);
                self.show_message(fallback)?;
                return Ok(Banner::TextOnly);
            }
        };

        let pixels = code.size() as u32 * banner.block;
        self.paint.reset(pixels, pixels)?;
        self.paint.clear(Color::White);
        qr::draw_qr(&mut self.paint, &code, 0, 0, banner.block);
        let x = width.saturating_sub(self.paint.width()) / 2;
        let y = banner_qr_top(lines.len());
        self.panel
            .set_frame_memory(self.paint.buffer(), x, y, self.paint.width(), self.paint.height())?;
        self.panel.display_frame()?;
        Ok(Banner::WithQr)
    }

    /// Decode a stored image full screen and show it with a partial refresh.
    ///
    /// A failed decode returns before any panel traffic, so the screen and
    /// `status` keep showing the previous image.
    pub fn display_image(&mut self, name: &str) -> Result<DecodeSummary, AppError> {
        if !self.storage.exists(name) {
            log::warn!("Image file {} not found", name);
            return Err(AppError::NotFound(name.to_string()));
        }
        if ImageKind::from_name(name).is_none() {
            log::warn!("Ignoring {}: unsupported image format", name);
            return Err(ImageError::UnsupportedFormat(name.to_string()).into());
        }

        // decode before touching the panel so a bad file leaves the screen as is
        let (width, height) = (self.panel.width(), self.panel.height());
        self.paint.set_rotation(Rotation::Rotate0);
        self.paint.reset(width, height)?;
        self.paint.clear(Color::White);

        let summary = draw_image(
            &self.storage,
            name,
            &mut self.paint,
            0,
            0,
            self.config.binarization,
        )?;

        self.panel.init(Orientation::Landscape)?;
        self.panel.clear()?;
        self.panel.wait_until_idle()?;
        self.panel.display_part(self.paint.buffer())?;

        self.status.current_image = Some(name.to_string());
        self.status.state = DisplayState::Active;
        Ok(summary)
    }

    /// Render a QR code full screen in portrait and save a snapshot of it
    pub fn display_qr(&mut self, request: &QrRequest) -> Result<Placement, AppError> {
        let code = qr::generate(&request.text, request.version, request.ecc)?;
        // portrait: the canvas is height wide and width tall
        let (canvas_width, canvas_height) = (self.panel.height(), self.panel.width());
        let placement = Placement::centered(
            code.size() as u32,
            canvas_width,
            canvas_height,
            request.scale,
        )
        .map_err(|e| {
            log::warn!("{}", e);
            e
        })?;
        log::info!(
            "Filling display with {} module QR code, block size {}",
            code.size(),
            placement.block
        );

        self.panel.init(Orientation::Portrait)?;
        self.panel.clear()?;
        self.paint.set_rotation(Rotation::Rotate0);
        self.paint.reset(canvas_width, canvas_height)?;
        self.paint.clear(Color::White);
        qr::draw_qr(&mut self.paint, &code, placement.x, placement.y, placement.block);

        self.panel.wait_until_idle()?;
        self.panel.display_part(self.paint.buffer())?;

        self.status.state = DisplayState::ShowingQr;
        self.status.current_image = Some(GENERATED_QR.to_string());

        snapshot::save(&self.storage, &self.config.snapshot_path, &self.paint)?;
        Ok(placement)
    }

    /// Wipe the panel white
    pub fn clear(&mut self) -> Result<(), AppError> {
        self.status.current_image = None;
        self.status.state = DisplayState::Cleared;
        self.panel.init(Orientation::Portrait)?;
        self.panel.clear()?;
        Ok(())
    }

    /// Put the panel into deep sleep
    pub fn sleep(&mut self) -> Result<(), AppError> {
        self.panel.sleep()?;
        self.status.state = DisplayState::Sleeping;
        Ok(())
    }

    /// Queue `job` after its configured delay, replacing any pending job.
    ///
    /// Returns the job that was replaced.
    pub fn schedule(&mut self, job: Job, now: Instant) -> Option<Job> {
        let delay: Duration = match &job {
            Job::ShowImage(name) => {
                self.status.current_image = Some(name.clone());
                self.status.state = DisplayState::DisplayingImage;
                self.config.image_delay
            }
            Job::ShowQr(_) => self.config.qr_delay,
        };
        log::debug!("Scheduling {:?} in {} ms", job, delay.as_millis());
        let replaced = self.pending.schedule(job, now + delay);
        if let Some(old) = &replaced {
            log::info!("Replaced pending job {:?}", old);
        }
        replaced
    }

    /// Drop the pending job
    pub fn cancel(&mut self) -> Option<Job> {
        self.pending.cancel()
    }

    /// Run the pending job if it is due. Returns whether a job ran.
    pub fn poll(&mut self, now: Instant) -> Result<bool, AppError> {
        let Some(job) = self.pending.take_due(now) else {
            return Ok(false);
        };
        match job {
            Job::ShowImage(name) => {
                self.display_image(&name)?;
            }
            Job::ShowQr(request) => {
                self.display_qr(&request)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_replaces_and_fires_once() {
        let start = Instant::now();
        let mut slot = Deferred::new();
        assert_eq!(slot.schedule("a", start + Duration::from_millis(10)), None);
        assert_eq!(slot.schedule("b", start + Duration::from_millis(20)), Some("a"));
        assert_eq!(slot.take_due(start + Duration::from_millis(19)), None);
        assert_eq!(slot.pending(), Some(&"b"));
        assert_eq!(slot.take_due(start + Duration::from_millis(20)), Some("b"));
        assert_eq!(slot.take_due(start + Duration::from_millis(30)), None);
    }

    #[test]
    fn deferred_cancel_empties_slot() {
        let now = Instant::now();
        let mut slot = Deferred::new();
        slot.schedule(1, now);
        assert_eq!(slot.due(), Some(now));
        assert_eq!(slot.cancel(), Some(1));
        assert_eq!(slot.take_due(now), None);
    }

    #[test]
    fn state_labels() {
        assert_eq!(DisplayState::Powered.to_string(), "Powered");
        assert_eq!(DisplayState::ShowingQr.to_string(), "showing generated QR");
        assert_eq!(Status::default().current_image_label(), "<none>");
    }

    #[test]
    fn banner_sits_one_line_below_text() {
        assert_eq!(banner_qr_top(3), 20 + 3 * 14);
    }
}
