//! Entry point: parses arguments, sets up logging, opens the device (if
//! one was given and the command needs it), and dispatches to
//! [`elitech::commands`].

use anyhow::{bail, Result};
use clap::Parser;

use elitech::cli::{AddressAction, Cli, Command, DeviceAction, ParameterAction, RecordAction};
use elitech::commands;
use elitech::transport::HidTransport;

fn open_device(dev: &Option<String>, command_name: &str) -> Result<HidTransport> {
    let Some(path) = dev else {
        log::warn!("a device is required to really run '{command_name}'");
        bail!("no device given");
    };
    let path = std::ffi::CString::new(path.as_bytes())?;
    Ok(HidTransport::open(&path)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    stderrlog::new()
        .module(module_path!())
        .module("elitech")
        .quiet(cli.quiet > 0)
        .verbosity(2 + cli.verbose as usize)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    match &cli.command {
        Command::Help { command } => commands::help(command),

        Command::Device { action: DeviceAction::List } => commands::device_list()?,

        Command::Parameter { action } => match action {
            ParameterAction::List => commands::parameter_list(),
            ParameterAction::Get { names } => {
                let mut transport = open_device(&cli.dev, "parameter get")?;
                commands::parameter_get(&mut transport, names)?;
            }
            ParameterAction::Set { assignments } => {
                let mut transport = open_device(&cli.dev, "parameter set")?;
                commands::parameter_set(&mut transport, assignments)?;
            }
        },

        Command::Address { action } => match action {
            AddressAction::Get { ranges } => {
                let mut transport = open_device(&cli.dev, "address get")?;
                commands::address_get(&mut transport, ranges)?;
            }
            AddressAction::Set { items } => {
                let mut transport = open_device(&cli.dev, "address set")?;
                commands::address_set(&mut transport, items)?;
            }
        },

        Command::Record { action: RecordAction::Get { selection } } => {
            let mut transport = open_device(&cli.dev, "record get")?;
            commands::record_get(&mut transport, selection.as_deref())?;
        }
    }

    Ok(())
}
