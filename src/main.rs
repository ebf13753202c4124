//! Firmware entry point on ESP-IDF, a decode-to-bitmap tool everywhere else.

#[cfg(target_os = "espidf")]
mod device {
    use std::ffi::CString;
    use std::time::{Duration, Instant};

    use esp_idf_svc::hal::delay::Delay;
    use esp_idf_svc::hal::gpio;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::hal::spi;
    use esp_idf_svc::sys;

    use imageload::epd1in54::{pins::Pins, Epd1in54, SPI_MODE};
    use imageload::image::ImageKind;
    use imageload::storage::{FsStorage, Storage};
    use imageload::{Config, ImageLoad, Job};

    /// Mount the SPIFFS partition at `root`
    fn mount_storage(root: &str) -> anyhow::Result<()> {
        let base_path = CString::new(root)?;
        let conf = sys::esp_vfs_spiffs_conf_t {
            base_path: base_path.as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 5,
            format_if_mount_failed: true,
        };
        // The VFS copies the base path during registration
        sys::esp!(unsafe { sys::esp_vfs_spiffs_register(&conf) })?;
        log::info!("Mounted storage at {}", root);
        Ok(())
    }

    /// First decodable file in the storage root, sorted by name
    fn first_image(root: &str) -> Option<String> {
        let mut names: Vec<String> = std::fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .map(|name| format!("/{}", name))
            .filter(|name| ImageKind::from_name(name).is_some())
            .collect();
        names.sort();
        names.into_iter().next()
    }

    // https://docs.esp-rs.org/esp-idf-svc/esp_idf_svc/
    pub fn run() -> anyhow::Result<()> {
        // It is necessary to call this function once. Otherwise some patches to the runtime
        // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
        sys::link_patches();

        // Bind the log crate to the ESP Logging facilities
        esp_idf_svc::log::EspLogger::initialize_default();

        let config = Config::default();
        mount_storage(&config.storage_root)?;
        let storage = FsStorage::new(&config.storage_root);

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        log::info!(
            "Configuring SPI: SCK {} MOSI {} CS {}",
            Pins::SCK,
            Pins::MOSI,
            Pins::CS
        );
        let spi = spi::SpiDeviceDriver::new_single(
            peripherals.spi2,
            pins.gpio22,                    // SCK - Pins::SCK
            pins.gpio21,                    // MOSI - Pins::MOSI
            Option::<gpio::AnyIOPin>::None, // No MISO needed for display
            Some(pins.gpio4),               // CS - Pins::CS
            &spi::SpiDriverConfig::new(),
            &spi::SpiConfig::new()
                .baudrate(4.MHz().into())
                .data_mode(SPI_MODE),
        )?;

        let busy = gpio::PinDriver::input(pins.gpio19)?; // Pins::BUSY
        let dc = gpio::PinDriver::output(pins.gpio23)?; // Pins::DC
        let rst = gpio::PinDriver::output(pins.gpio18)?; // Pins::RST

        let epd = Epd1in54::new(spi, busy, dc, rst, Delay::default(), config.busy);
        let mut app = ImageLoad::new(epd, storage, config);
        app.startup()?;

        match first_image(&app.config().storage_root) {
            Some(name) if app.storage().exists(&name) => {
                log::info!("Showing {}", name);
                app.schedule(Job::ShowImage(name), Instant::now());
            }
            _ => log::info!("No image in storage, waiting"),
        }

        loop {
            if let Err(e) = app.poll(Instant::now()) {
                log::error!("Deferred job failed: {}", e);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    device::run()
}

/// Decode an image or render a QR code into a 200×200 framebuffer and write
/// it out as a bitmap, using the same pipeline as the device.
///
/// ```text
/// imageload <image.bmp|image.png> <out.bmp>
/// imageload --qr <text> <out.bmp>
/// ```
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::path::Path;

    use anyhow::{bail, Context};
    use imageload::image::draw_image;
    use imageload::paint::{Color, Paint};
    use imageload::qr::{self, Ecc, Placement};
    use imageload::snapshot;
    use imageload::storage::FsStorage;
    use imageload::Config;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::default();
    let mut paint = Paint::new();
    paint.clear(Color::White);

    let output = match args.as_slice() {
        [flag, text, output] if flag == "--qr" => {
            let code = qr::generate(text, config.banner.version, Ecc::Medium)
                .or_else(|_| qr::generate(text, 40, Ecc::Low))?;
            let placement =
                Placement::centered(code.size() as u32, paint.width(), paint.height(), true)?;
            qr::draw_qr(&mut paint, &code, placement.x, placement.y, placement.block);
            println!("QR code: {} modules, block {}", code.size(), placement.block);
            output
        }
        [input, output] => {
            let path = Path::new(input);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("bad input path {}", input))?;
            let storage = FsStorage::new(dir);
            let summary = draw_image(&storage, name, &mut paint, 0, 0, config.binarization)
                .with_context(|| format!("decoding {}", input))?;
            println!(
                "{}: {}x{} source, drew {}x{}",
                summary.kind,
                summary.source_width,
                summary.source_height,
                summary.drawn_width,
                summary.drawn_height
            );
            output
        }
        _ => bail!("usage: imageload <image.bmp|image.png> <out.bmp> | imageload --qr <text> <out.bmp>"),
    };

    let file = std::fs::File::create(output).with_context(|| format!("creating {}", output))?;
    snapshot::encode_bmp(&paint, std::io::BufWriter::new(file))?;
    println!("wrote {}", output);
    Ok(())
}
