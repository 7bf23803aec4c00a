//! The command-line grammar: one [`clap::Parser`] struct mirroring the
//! reference implementation's `argparse` setup, with the free-form
//! `cmds` word list replaced by a proper `clap` subcommand tree.
//!
//! Grounded on `main.py`'s `ArgumentParser` (the `-d`/`--dev` and
//! `-v`/`--version` flags) and on each `Command` subclass in
//! `commands.py` (the `cmdName`/`cmdArgs` pairs below mirror those
//! verbatim).

use clap::{Parser, Subcommand};

/// Console tool to interact with Elitech temperature and humidity loggers.
#[derive(Parser, Debug)]
#[command(name = "elitech", version, about)]
pub struct Cli {
    /// The device to interact with.
    #[arg(short, long = "dev", visible_alias = "device")]
    pub dev: Option<String>,

    /// Number of times to repeat for more verbose logging (errors and
    /// warnings are always shown; repeat for info, debug, trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of times to repeat to suppress logging below errors.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// The commands this tool knows how to run.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Give help on a command.
    Help {
        /// The command to describe; omit for the full command list.
        command: Vec<String>,
    },
    /// Inspect connected devices.
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },
    /// Read or modify named configuration parameters.
    Parameter {
        #[command(subcommand)]
        action: ParameterAction,
    },
    /// Read or modify raw device memory by address.
    Address {
        #[command(subcommand)]
        action: AddressAction,
    },
    /// Read and interpret stored measurement records.
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
}

/// `device ...` actions.
#[derive(Subcommand, Debug)]
pub enum DeviceAction {
    /// List available Elitech devices.
    List,
}

/// `parameter ...` actions.
#[derive(Subcommand, Debug)]
pub enum ParameterAction {
    /// List available parameters and their meanings.
    List,
    /// Read configuration parameters from a device.
    Get {
        /// Parameter names to read; omit to read none (matching the
        /// reference implementation's own empty-selection behavior).
        names: Vec<String>,
    },
    /// Modify configuration parameters on a device.
    ///
    /// Parameters and values can be given as `parameter=value` pairs
    /// (without spaces around the equal sign) or as `parameter value`
    /// (without an equal sign); the two styles can be mixed freely.
    Set {
        /// Alternating `name=value` or `name value` tokens.
        assignments: Vec<String>,
    },
}

/// `address ...` actions.
#[derive(Subcommand, Debug)]
pub enum AddressAction {
    /// Read data by address. Addresses can be given as a single 1-based
    /// address (`"5"`) or an inclusive 1-based range (`"5-8"`).
    Get {
        /// Address or address ranges to read.
        ranges: Vec<String>,
    },
    /// Write data by address. Each range is followed by exactly as many
    /// byte literals as it is long.
    Set {
        /// Alternating range and byte-literal tokens.
        items: Vec<String>,
    },
}

/// `record ...` actions.
#[derive(Subcommand, Debug)]
pub enum RecordAction {
    /// Read and interpret records.
    Get {
        /// A `[first]:[step]:[last]` slice, 1-indexed and inclusive of
        /// `first`; omit any part to leave it unbounded. A bare number
        /// selects that single record.
        selection: Option<String>,
    },
}
