//! Recording fake HAL shared by the integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::io::Cursor;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, Operation, SpiDevice};

use imageload::epd1in54::{BusyPolicy, Epd1in54};

/// One decoded bus transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Byte sent with DC low
    Cmd(u8),
    /// Bytes sent with DC high, consecutive writes merged
    Data(Vec<u8>),
}

/// Everything the fake pins and bus observed
#[derive(Debug, Default)]
pub struct Bus {
    pub events: Vec<Event>,
    pub dc_high: bool,
    /// Values returned by BUSY reads, idle once exhausted
    pub busy_script: VecDeque<bool>,
    /// BUSY reads high forever
    pub busy_stuck: bool,
    pub busy_reads: usize,
    pub slept_ns: u64,
    pub reset_pulses: usize,
}

impl Bus {
    fn record(&mut self, bytes: &[u8]) {
        if self.dc_high {
            if let Some(Event::Data(data)) = self.events.last_mut() {
                data.extend_from_slice(bytes);
            } else {
                self.events.push(Event::Data(bytes.to_vec()));
            }
        } else {
            self.events.extend(bytes.iter().map(|&b| Event::Cmd(b)));
        }
    }
}

pub type SharedBus = Rc<RefCell<Bus>>;

pub struct FakeSpi(pub SharedBus);

impl spi::ErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut bus = self.0.borrow_mut();
        for op in operations.iter() {
            if let Operation::Write(bytes) = op {
                bus.record(bytes);
            }
        }
        Ok(())
    }
}

pub struct FakeDc(pub SharedBus);

impl digital::ErrorType for FakeDc {
    type Error = Infallible;
}

impl OutputPin for FakeDc {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().dc_high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().dc_high = true;
        Ok(())
    }
}

pub struct FakeRst(pub SharedBus);

impl digital::ErrorType for FakeRst {
    type Error = Infallible;
}

impl OutputPin for FakeRst {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().reset_pulses += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub struct FakeBusy(pub SharedBus);

impl digital::ErrorType for FakeBusy {
    type Error = Infallible;
}

impl InputPin for FakeBusy {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let mut bus = self.0.borrow_mut();
        bus.busy_reads += 1;
        if bus.busy_stuck {
            return Ok(true);
        }
        Ok(bus.busy_script.pop_front().unwrap_or(false))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

pub struct FakeDelay(pub SharedBus);

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().slept_ns += u64::from(ns);
    }
}

pub type FakeEpd = Epd1in54<FakeSpi, FakeBusy, FakeDc, FakeRst, FakeDelay>;

/// Driver wired to a fresh recording bus
pub fn fake_epd(policy: BusyPolicy) -> (FakeEpd, SharedBus) {
    let bus = SharedBus::default();
    let epd = Epd1in54::new(
        FakeSpi(bus.clone()),
        FakeBusy(bus.clone()),
        FakeDc(bus.clone()),
        FakeRst(bus.clone()),
        FakeDelay(bus.clone()),
        policy,
    );
    (epd, bus)
}

/// Short budget so stuck-BUSY tests finish quickly
pub fn quick_policy() -> BusyPolicy {
    BusyPolicy {
        timeout_ms: 100,
        poll_interval_ms: 10,
    }
}

/// Command bytes in order
pub fn commands(bus: &SharedBus) -> Vec<u8> {
    bus.borrow()
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Cmd(c) => Some(*c),
            Event::Data(_) => None,
        })
        .collect()
}

/// Data sent after each occurrence of `cmd`
pub fn payloads(bus: &SharedBus, cmd: u8) -> Vec<Vec<u8>> {
    let bus = bus.borrow();
    let events = &bus.events;
    events
        .iter()
        .enumerate()
        .filter(|(_, e)| **e == Event::Cmd(cmd))
        .map(|(i, _)| match events.get(i + 1) {
            Some(Event::Data(data)) => data.clone(),
            _ => Vec::new(),
        })
        .collect()
}

/// Forget everything recorded so far
pub fn reset_events(bus: &SharedBus) {
    bus.borrow_mut().events.clear();
}

/// 24-bit bitmap from an RGB image, encoded by the `image` crate
pub fn encode_with_image_crate(img: &image::RgbImage, format: image::ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut out, format)
        .expect("encode fixture");
    out.into_inner()
}
