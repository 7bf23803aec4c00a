//! The HID byte channel: device discovery against a vendor/product
//! allow-list, and the fixed-size report read/write primitives the rest
//! of the crate builds its protocol on.
//!
//! Grounded on the `Device` class in the reference implementation's
//! `device.py`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{Error, Result};

const DEFAULT_REPORT_SIZE: usize = 64;

/// A device this driver is known to speak to.
pub struct SupportedDevice {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Marketing name, shown by `device list`.
    pub name: &'static str,
}

/// The allow-list of vendor/product id pairs this driver recognizes.
///
/// A few of these ids have no recorded marketing name upstream; they
/// show up here as `"Unknown"`, same as the reference implementation.
pub const SUPPORTED_DEVICES: &[SupportedDevice] = &[
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x0033, name: "Elitech RC-51" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x0133, name: "Elitech RC-51H" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x3005, name: "Elitech RC-5+" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x0037, name: "Elitech RC-55" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x1014, name: "Elitech TemLog 20" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x1114, name: "Elitech TemLog 20H" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x0012, name: "Elitech RC-18" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x0013, name: "Elitech RC-19" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x1005, name: "Elitech ST5" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x3006, name: "Elitech LogEt 6" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x4008, name: "Elitech LogEt 8" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x4308, name: "Elitech LogEt 8 Life Science" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x3008, name: "Elitech LogEt 8 Food" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x2033, name: "Elitech MSL-51" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0x2133, name: "Elitech MSL-51H" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x0001, name: "Elitech LogEt 1" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x0101, name: "Elitech LogEt 1TH" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x0201, name: "Elitech LogEt 1Bio" },
    SupportedDevice { vendor_id: 0x04d8, product_id: 0xF564, name: "Unknown" },
    SupportedDevice { vendor_id: 0x0416, product_id: 0x3A01, name: "Unknown" },
    SupportedDevice { vendor_id: 0x464d, product_id: 0x0402, name: "Unknown" },
];

/// A device enumerated on the system and recognized by
/// [`SUPPORTED_DEVICES`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// OS-specific path identifying this HID interface.
    pub path: std::ffi::CString,
    /// Marketing name.
    pub name: &'static str,
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
}

/// The byte channel a [`crate::planner`] speaks frames over.
///
/// A request/response exchange is always exactly one `write` immediately
/// followed by one `read`; implementations that hold an exclusive
/// resource (a device handle) for the duration may acquire it in `write`
/// and release it after `read`.
pub trait Transport {
    /// Size, in bytes, of an outgoing HID report (frames are zero-padded
    /// up to this size before being written).
    fn out_report_size(&self) -> usize;
    /// Size, in bytes, of an incoming HID report.
    fn in_report_size(&self) -> usize;
    /// Writes one frame, zero-padded to [`out_report_size`](Transport::out_report_size).
    fn write(&mut self, frame: &[u8]) -> Result<()>;
    /// Reads one fixed-size report. A read interrupted (e.g. by Ctrl-C)
    /// returns a zero-filled buffer rather than propagating the
    /// interruption as an error, so in-flight exchanges fail soft.
    fn read(&mut self) -> Result<Vec<u8>>;
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static CTRLC_HANDLER_INSTALLED: std::sync::Once = std::sync::Once::new();

fn install_ctrlc_handler() {
    CTRLC_HANDLER_INSTALLED.call_once(|| {
        let _ = ctrlc::set_handler(|| {
            log::warn!("interrupted, finishing the in-flight exchange and stopping");
            INTERRUPTED.store(true, Ordering::SeqCst);
        });
    });
}

/// True once Ctrl-C has been pressed during this process's lifetime.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Enumerates connected HID devices, filtered to those in
/// [`SUPPORTED_DEVICES`].
pub fn enumerate() -> Result<Vec<DeviceInfo>> {
    let api = hidapi::HidApi::new()?;
    let mut found = Vec::new();
    for info in api.device_list() {
        if let Some(supported) = SUPPORTED_DEVICES
            .iter()
            .find(|d| d.vendor_id == info.vendor_id() && d.product_id == info.product_id())
        {
            found.push(DeviceInfo {
                path: info.path().to_owned(),
                name: supported.name,
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
            });
        }
    }
    Ok(found)
}

/// A [`Transport`] backed by a real HID device, opened and closed around
/// every request/response pair.
pub struct HidTransport {
    api: hidapi::HidApi,
    path: std::ffi::CString,
    out_report_size: usize,
    in_report_size: usize,
    open: Option<hidapi::HidDevice>,
}

impl HidTransport {
    /// Opens the device at `path`, validating it against the
    /// vendor/product allow-list and probing its HID report sizes.
    pub fn open(path: &std::ffi::CStr) -> Result<Self> {
        install_ctrlc_handler();
        let api = hidapi::HidApi::new()?;
        let device = api.open_path(path)?;
        let info = device
            .get_device_info()
            .map_err(Error::Hid)?;
        let (vendor_id, product_id) = (info.vendor_id(), info.product_id());
        if !SUPPORTED_DEVICES
            .iter()
            .any(|d| d.vendor_id == vendor_id && d.product_id == product_id)
        {
            return Err(Error::UnsupportedDevice { vendor_id, product_id });
        }
        drop(device);

        let (out_report_size, in_report_size) = probe_report_sizes(&info).unwrap_or_else(|| {
            log::warn!("could not read the HID report descriptor, assuming {DEFAULT_REPORT_SIZE}-byte reports");
            (DEFAULT_REPORT_SIZE, DEFAULT_REPORT_SIZE)
        });

        Ok(Self {
            api,
            path: path.to_owned(),
            out_report_size,
            in_report_size,
            open: None,
        })
    }
}

impl Transport for HidTransport {
    fn out_report_size(&self) -> usize {
        self.out_report_size
    }

    fn in_report_size(&self) -> usize {
        self.in_report_size
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        let device = self.api.open_path(&self.path)?;
        let mut padded = frame.to_vec();
        padded.resize(self.out_report_size, 0);
        device.write(&padded)?;
        self.open = Some(device);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let device = self.open.take();
        let mut buf = vec![0u8; self.in_report_size];
        if interrupted() {
            return Ok(buf);
        }
        if let Some(device) = device {
            match device.read_timeout(&mut buf, 5000) {
                Ok(_) => {}
                Err(e) => {
                    log::warn!("read interrupted: {e}");
                    buf.fill(0);
                }
            }
        }
        Ok(buf)
    }
}

/// Walks a short-item HID report descriptor to compute the byte length
/// of the device's input and output reports.
///
/// This is a reduced re-implementation (short items only, no long
/// items, no array/usage bookkeeping) — enough for the simple,
/// single-collection descriptors real-world data loggers expose, not a
/// general HID report-descriptor parser.
fn probe_report_sizes(info: &hidapi::DeviceInfo) -> Option<(usize, usize)> {
    let descriptor = read_report_descriptor(info)?;
    let mut report_size: u32 = 0;
    let mut report_count: u32 = 0;
    let mut in_bits: u32 = 0;
    let mut out_bits: u32 = 0;
    let mut i = 0;
    while i < descriptor.len() {
        let prefix = descriptor[i];
        let tag = prefix & 0xFC;
        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        if i + 1 + size > descriptor.len() {
            break;
        }
        let data = &descriptor[i + 1..i + 1 + size];
        let value = data.iter().rev().fold(0u32, |acc, b| (acc << 8) | *b as u32);
        match tag {
            0x74 => report_size = value,     // Report Size (global)
            0x94 => report_count = value,    // Report Count (global)
            0x80 => in_bits += report_size * report_count,  // Input (main)
            0x90 => out_bits += report_size * report_count, // Output (main)
            _ => {}
        }
        i += 1 + size;
    }
    if in_bits == 0 && out_bits == 0 {
        None
    } else {
        Some((
            (out_bits.div_ceil(8)).max(1) as usize,
            (in_bits.div_ceil(8)).max(1) as usize,
        ))
    }
}

#[cfg(target_os = "linux")]
fn read_report_descriptor(info: &hidapi::DeviceInfo) -> Option<Vec<u8>> {
    let path = info.path().to_str().ok()?;
    let hidraw = path.rsplit('/').next()?;
    let sysfs = format!("/sys/class/hidraw/{hidraw}/device/report_descriptor");
    std::fs::read(sysfs).ok()
}

#[cfg(not(target_os = "linux"))]
fn read_report_descriptor(_info: &hidapi::DeviceInfo) -> Option<Vec<u8>> {
    None
}

#[cfg(test)]
pub mod fake {
    //! An in-memory [`Transport`] used by the planner's own unit tests.
    use super::*;
    use std::collections::VecDeque;

    /// Replays a queue of canned responses and records every frame it
    /// was asked to write.
    pub struct FakeTransport {
        pub written: Vec<Vec<u8>>,
        pub responses: VecDeque<Vec<u8>>,
    }

    impl FakeTransport {
        pub fn new(responses: Vec<Vec<u8>>) -> Self {
            Self { written: Vec::new(), responses: responses.into() }
        }
    }

    impl Transport for FakeTransport {
        fn out_report_size(&self) -> usize {
            DEFAULT_REPORT_SIZE
        }
        fn in_report_size(&self) -> usize {
            DEFAULT_REPORT_SIZE
        }
        fn write(&mut self, frame: &[u8]) -> Result<()> {
            self.written.push(frame.to_vec());
            Ok(())
        }
        fn read(&mut self) -> Result<Vec<u8>> {
            Ok(self.responses.pop_front().unwrap_or_else(|| vec![0u8; DEFAULT_REPORT_SIZE]))
        }
    }
}
