//! Image display for a 1.54" e-paper panel
//!
//! Stored BMP and PNG files are decoded straight into a packed 1-bit
//! framebuffer and pushed to a Waveshare 1.54" V2 panel with a partial
//! refresh. QR codes can be generated full screen (and saved back as a
//! bitmap) or shown as a banner under status text.
//!
//! ### Layout
//!
//! - [`paint`]: framebuffer, drawing primitives and status text
//! - [`image`]: BMP and PNG decoders
//! - [`snapshot`]: framebuffer to bitmap
//! - [`qr`]: QR generation and rasterization
//! - [`panel`] and [`epd1in54`]: panel contract and SPI driver
//! - [`storage`]: file access for the decoders
//! - [`app`]: the context that owns all of the above
#![deny(missing_docs)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod app;
pub mod config;
pub mod epd1in54;
pub mod image;
pub mod paint;
pub mod panel;
pub mod qr;
pub mod snapshot;
pub mod storage;

pub use app::{ImageLoad, Job, QrRequest};
pub use config::Config;
