/*! Host-side driver for the Elitech family of USB-HID temperature and
humidity data loggers.

This crate implements the protocol engine only: a range algebra for
describing device memory intervals, a framing codec for the request/response
wire format, a typed parameter registry with read-modify-write semantics, a
bit-packed measurement record decoder, and an I/O planner that coalesces
reads/writes into the fewest possible device round-trips.

Device enumeration and the actual HID byte channel live in [`transport`];
the `clap`-derived command-line surface lives in [`cli`] and [`commands`].

# Example

```
use elitech::range::Range;

let coalesced = Range::coalesce(&[Range::new(0, 2).unwrap(), Range::new(2, 1).unwrap()]);
assert_eq!(coalesced, vec![Range::new(0, 3).unwrap()]);
```
*/
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod frame;
pub mod parameters;
pub mod planner;
pub mod range;
pub mod record;
pub mod response;
pub mod transport;

pub use range::Range;

/// Crate-wide error type for hard (non-advisory) failures.
///
/// Advisory conditions — a mismatched checksum, an echoed offset that
/// doesn't match the request, an unknown enum value on read — are not
/// represented here. They are reported through [`log::warn!`] and the
/// caller continues with best-effort data, per the protocol's error
/// handling policy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A range string (`"N"` or `"N-M"`) could not be parsed.
    #[error("invalid range: \"{0}\"")]
    InvalidRange(String),

    /// Two ranges are neither contained in, nor overlapping, nor adjacent
    /// to one another and so cannot be merged into one.
    #[error("ranges {0:?} and {1:?} cannot be merged")]
    NotMergeable(range::Range, range::Range),

    /// A requested sub-range falls (even partially) outside the range a
    /// [`response::Response`] actually covers.
    #[error("required range {0:?} is not available in {1:?}")]
    OutOfRange(range::Range, range::Range),

    /// The byte slice handed to a range-keyed operation doesn't have the
    /// length the range promises.
    #[error("length of data ({0}) does not match range length ({1})")]
    LengthMismatch(usize, usize),

    /// A response frame was shorter than the 11-byte header.
    #[error("answer does not contain a header: len(answer) = {0}")]
    IncompleteHeader(usize),

    /// A response frame's first three bytes weren't `33 CC 00`.
    #[error("invalid answer header: {0:02X} {1:02X} {2:02X}")]
    InvalidHeader(u8, u8, u8),

    /// A response frame's echoed opcode doesn't match the request's.
    #[error("answer operation does not match: {0:02X}")]
    OperationMismatch(u8),

    /// A response frame didn't carry as much payload as its own length
    /// field promised.
    #[error("answer does not contain data: {0} < {1}")]
    IncompleteData(usize, usize),

    /// A record buffer wasn't exactly 8 bytes long.
    #[error("invalid record length: {0}")]
    InvalidRecordLength(usize),

    /// A decoded record's timestamp fields don't form a valid calendar
    /// date/time (can only happen on garbage device data, since the
    /// all-`0xFF` terminator is handled separately).
    #[error("invalid record timestamp: {0}")]
    InvalidTimestamp(String),

    /// A named parameter isn't in the registry.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// A device's vendor/product id pair isn't in the supported allow-list.
    #[error("unsupported device: {vendor_id:04x}:{product_id:04x}")]
    UnsupportedDevice {
        /// USB vendor id.
        vendor_id: u16,
        /// USB product id.
        product_id: u16,
    },

    /// No device path was given for a command that needs one.
    #[error("no device given")]
    NoDevice,

    /// Frame construction was asked for a read/write longer than the
    /// 51-byte protocol maximum. Mirrors a limitation of the reference
    /// implementation: a single coalesced range wider than 51 bytes
    /// cannot be fetched or written in one frame, and the planner makes
    /// no attempt to split it further (see `DESIGN.md`).
    #[error("invalid length for frame: {0}")]
    InvalidFrameLength(usize),

    /// The HID transport reported an error.
    #[error(transparent)]
    Hid(#[from] hidapi::HidError),

    /// An underlying I/O operation (e.g. reading a report descriptor)
    /// failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
