//! Handlers for each CLI subcommand: argument parsing micro-grammars and
//! the `planner` calls and output formatting that used to live in each
//! `Command` subclass's `__init__`/`execute` pair in the reference
//! implementation's `commands.py`.

use anyhow::{anyhow, bail, Context, Result};

use crate::parameters::{find, ParamInstance};
use crate::planner;
use crate::range::Range;
use crate::transport::Transport;

/// One row of the static command table printed by `help`.
struct CommandHelp {
    name: &'static str,
    args: &'static str,
    summary: &'static str,
    details: &'static str,
}

const COMMANDS: &[CommandHelp] = &[
    CommandHelp {
        name: "help",
        args: "command",
        summary: "Give help on a command",
        details: "Give help on command 'command'.",
    },
    CommandHelp {
        name: "device list",
        args: "",
        summary: "List available Elitech devices",
        details: "List available devices\n\n\
            Prints a table with the following columns:\n  \
            - Path identifying the device\n  \
            - Name of the device",
    },
    CommandHelp {
        name: "parameter list",
        args: "",
        summary: "List available parameters and their meanings",
        details: "List available parameters and their meanings",
    },
    CommandHelp {
        name: "parameter get",
        args: "parameter ...",
        summary: "Read configuration parameters from a device",
        details: "Read configuration parameters from an Elitech device\n\n\
            The implementation sends the minimum number of commands to get the parameters.",
    },
    CommandHelp {
        name: "parameter set",
        args: "parameter=value | parameter value ...",
        summary: "Modify configuration parameters on a device",
        details: "Modify configuration parameters on an Elitech device\n\n\
            Parameters and values can be given as parameter=value pairs (without spaces\n\
            around the equal sign) or as parameter value (without an equal sign).\n\n\
            The implementation sends the minimum number of commands to set the parameters.",
    },
    CommandHelp {
        name: "address get",
        args: "range ...",
        summary: "Read data by address",
        details: "Read data by address on an Elitech device\n\n\
            Addresses can be given as a single address or an address range.\n\n\
            The implementation sends the minimum number of commands to read the addresses.",
    },
    CommandHelp {
        name: "address set",
        args: "range data ...",
        summary: "Write data by address",
        details: "Write data by address on an Elitech device\n\n\
            Addresses can be given as a single address or an address range; the data\n\
            is given as integers representing bytes.\n\n\
            The implementation sends the minimum number of commands to write the data.",
    },
    CommandHelp {
        name: "record get",
        args: "[first]:[step]:[last]",
        summary: "Read and interpret records",
        details: "Read and interpret records from an Elitech device",
    },
];

/// `help [command...]`.
pub fn help(command: &[String]) {
    if command.is_empty() {
        println!("Available commands:");
        for cmd in COMMANDS {
            let args = if cmd.args.is_empty() { String::new() } else { format!(" {}", cmd.args) };
            println!("  - {}{} ({})", cmd.name, args, cmd.summary);
        }
        return;
    }

    let wanted = command.join(" ");
    match COMMANDS.iter().find(|c| c.name == wanted) {
        Some(cmd) => {
            let args = if cmd.args.is_empty() { String::new() } else { format!(" {}", cmd.args) };
            println!("elitech {}{}\n    {}", cmd.name, args, cmd.details);
        }
        None => println!("elitech does not have a command named \"{wanted}\"\n"),
    }
}

/// `device list`.
pub fn device_list() -> Result<()> {
    println!("Available devices:");
    for device in crate::transport::enumerate()? {
        println!(
            "{}: {} ({:04x}:{:04x})",
            device.path.to_string_lossy(),
            device.name,
            device.vendor_id,
            device.product_id
        );
    }
    Ok(())
}

/// `parameter list`.
pub fn parameter_list() {
    println!("Available parameters:");
    for p in crate::parameters::PARAMETERS {
        println!("  - {}: {}", p.name, p.description);
    }
}

/// `parameter get [name...]`.
pub fn parameter_get(transport: &mut dyn Transport, names: &[String]) -> Result<()> {
    let mut descriptors = Vec::with_capacity(names.len());
    for n in names {
        match find(n) {
            Ok(d) => descriptors.push(d),
            Err(_) => log::warn!("ignoring unknown parameter: {n}"),
        }
    }
    if descriptors.is_empty() && !names.is_empty() {
        bail!("all parameters have been ignored");
    }

    let instances = planner::read_parameters(transport, &descriptors)?;
    for instance in &instances {
        if instance.value.is_some() {
            println!("{}: {}", instance.descriptor.name, instance.display());
        }
    }
    Ok(())
}

/// `parameter set [name=value | name value]...`.
pub fn parameter_set(transport: &mut dyn Transport, assignments: &[String]) -> Result<()> {
    if assignments.is_empty() {
        bail!("no parameters were given");
    }

    let mut params: Vec<ParamInstance> = Vec::new();
    let mut i = 0;
    while i < assignments.len() {
        let (name, value) = if let Some((n, v)) = assignments[i].split_once('=') {
            i += 1;
            (n.to_string(), v.to_string())
        } else if i + 1 < assignments.len() {
            let pair = (assignments[i].clone(), assignments[i + 1].clone());
            i += 2;
            pair
        } else {
            log::warn!("ignoring parameter without value: {}", assignments[i]);
            break;
        };

        let descriptor = match find(&name) {
            Ok(d) => d,
            Err(_) => {
                log::warn!("ignoring unknown parameter: {name}");
                break;
            }
        };
        if !descriptor.writable {
            log::warn!("read-only parameter: {}", descriptor.name);
            break;
        }
        match ParamInstance::new(descriptor).parse_value(&value) {
            Ok(instance) if instance.value.is_some() => params.push(instance),
            Ok(_) => {
                log::warn!("invalid value for parameter: {}", descriptor.name);
                break;
            }
            Err(e) => {
                log::warn!("invalid value for parameter {}: {e}", descriptor.name);
                break;
            }
        }
    }

    if params.is_empty() {
        bail!("all parameters have been ignored");
    }
    planner::write_parameters(transport, &params)?;
    Ok(())
}

/// Parses a 1-indexed address or address range (`"5"` or `"5-8"`) into a
/// 0-indexed [`Range`].
fn parse_address_range(s: &str) -> Result<Range> {
    let parts: Vec<&str> = s.split('-').collect();
    let nums: Result<Vec<i64>, _> = parts.iter().map(|p| p.parse::<i64>()).collect();
    let nums = nums.map_err(|_| anyhow!("invalid range: \"{s}\""))?;
    match nums.as_slice() {
        [a] => Ok(Range::new(a - 1, 1)?),
        [a, b] if b >= a => Ok(Range::new(a - 1, b - a + 1)?),
        _ => Err(anyhow!("invalid range: \"{s}\"")),
    }
}

/// Parses a byte literal in decimal, `0x` hex, `0b` binary, or leading-zero
/// octal notation (mirroring `AddressWrite.parseByte`).
fn parse_byte(s: &str) -> Result<u8> {
    let value = if let Some(hex) = s.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else if s.len() > 1 && s.starts_with('0') {
        i64::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<i64>()
    }
    .map_err(|_| anyhow!("invalid byte value: {s}"))?;
    u8::try_from(value).map_err(|_| anyhow!("invalid byte value: {s}"))
}

/// `address get [range...]`.
pub fn address_get(transport: &mut dyn Transport, ranges: &[String]) -> Result<()> {
    let parsed: Vec<Range> = ranges.iter().map(|r| parse_address_range(r)).collect::<Result<_>>()?;
    let answers = planner::read_addresses(transport, &parsed)?;
    for r in &parsed {
        if let Some(a) = answers.iter().find(|a| a.range.contains(r)) {
            let data = a.get(*r)?.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
            println!("{r:?}: {data}");
        }
    }
    Ok(())
}

/// `address set [range data...]...`.
pub fn address_set(transport: &mut dyn Transport, items: &[String]) -> Result<()> {
    let mut writes = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let range = parse_address_range(&items[i])?;
        i += 1;
        let len = range.len as usize;
        if i + len > items.len() {
            bail!("not enough data for range: {range:?}");
        }
        let data: Vec<u8> = items[i..i + len].iter().map(|b| parse_byte(b)).collect::<Result<_>>()?;
        i += len;
        writes.push((range, data));
    }
    planner::write_addresses(transport, &writes)?;
    Ok(())
}

/// A parsed `[first]:[step]:[last]` record selection.
struct Selection {
    start: Option<u64>,
    stop: Option<u64>,
    step: u64,
}

/// Parses the record-selection grammar (1-indexed, inclusive of `first`),
/// mirroring `RecordRead.sliceFromString`.
fn parse_selection(s: &str) -> Result<Selection> {
    fn parse_part(p: &str) -> Result<Option<u64>> {
        if p.is_empty() {
            Ok(None)
        } else {
            Ok(Some(p.parse::<u64>().context("invalid record selection")?))
        }
    }

    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [one] => match parse_part(one)? {
            Some(n) => Ok(Selection { start: Some(n - 1), stop: Some(n), step: 1 }),
            None => Ok(Selection { start: None, stop: None, step: 1 }),
        },
        [a, b] => {
            let a = parse_part(a)?;
            let b = parse_part(b)?;
            Ok(Selection { start: a.map(|n| n - 1), stop: b, step: 1 })
        }
        [a, step, c] => {
            if step.is_empty() {
                bail!("invalid record selection: {s}");
            }
            let a = parse_part(a)?;
            let c = parse_part(c)?;
            let step: u64 = step.parse().context("invalid record selection")?;
            Ok(Selection { start: a.map(|n| n - 1), stop: c, step })
        }
        _ => bail!("invalid record selection: {s}"),
    }
}

/// `record get [selection]`.
pub fn record_get(transport: &mut dyn Transport, selection: Option<&str>) -> Result<()> {
    let selection = match selection {
        Some(s) => parse_selection(s)?,
        None => Selection { start: None, stop: None, step: 1 },
    };
    let start = selection.start.unwrap_or(0);
    let records = planner::read_records(transport, start, selection.stop, selection.step)?;

    for (r, record) in records {
        match record {
            None => {
                if selection.stop.is_some() {
                    println!("{:>4}\t---------- --------\tNo data", r + 1);
                }
            }
            Some(record) if record.flags.pause() => {
                println!("{:>4}\t{}\tPause", r + 1, record.time.format("%Y-%m-%d %H:%M:%S"));
            }
            Some(record) if record.humidity.is_none() => {
                println!("{:>4}\t{}\t{:.1}\u{b0}C", r + 1, record.time.format("%Y-%m-%d %H:%M:%S"), record.temperature);
            }
            Some(record) => {
                println!(
                    "{:>4}\t{}\t{:.1}\u{b0}C\t{:.1}%",
                    r + 1,
                    record.time.format("%Y-%m-%d %H:%M:%S"),
                    record.temperature,
                    record.humidity.unwrap()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_address() {
        let r = parse_address_range("5").unwrap();
        assert_eq!((r.start, r.len), (4, 1));
    }

    #[test]
    fn parses_address_range() {
        let r = parse_address_range("5-8").unwrap();
        assert_eq!((r.start, r.len), (4, 4));
    }

    #[test]
    fn rejects_descending_address_range() {
        assert!(parse_address_range("8-5").is_err());
    }

    #[test]
    fn parses_byte_literals_in_every_base() {
        assert_eq!(parse_byte("10").unwrap(), 10);
        assert_eq!(parse_byte("0x1F").unwrap(), 0x1F);
        assert_eq!(parse_byte("0b101").unwrap(), 0b101);
        assert_eq!(parse_byte("017").unwrap(), 0o17);
    }

    #[test]
    fn rejects_out_of_range_byte_literal() {
        assert!(parse_byte("256").is_err());
    }

    #[test]
    fn single_number_selection_targets_one_record() {
        let sel = parse_selection("5").unwrap();
        assert_eq!((sel.start, sel.stop, sel.step), (Some(4), Some(5), 1));
    }

    #[test]
    fn empty_selection_is_unbounded() {
        let sel = parse_selection("").unwrap();
        assert_eq!((sel.start, sel.stop, sel.step), (None, None, 1));
    }

    #[test]
    fn three_part_selection_requires_a_step() {
        assert!(parse_selection("1::10").is_err());
    }

    #[test]
    fn three_part_selection_parses_all_fields() {
        let sel = parse_selection("2:3:11").unwrap();
        assert_eq!((sel.start, sel.stop, sel.step), (Some(1), Some(11), 3));
    }

    #[test]
    fn parameter_set_light_on_issues_exactly_one_read_and_one_write() {
        use crate::transport::fake::FakeTransport;

        // A GetParameter answer for the single byte at 0x1E: the N=1 quirk
        // widens it on the wire to offset 0x1D, length 2.
        let old_byte = 0b1010_1010u8; // bit 4 (light-on) currently clear
        let mut answer = vec![0x33, 0xCC, 0x00, 0, 0x03, 0, 0, 0x00, 0x1D, 0x00, 0x02, 0xFF, old_byte];
        let total = answer.len();
        answer[3] = total as u8;
        let checksum = answer[0..total - 1].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        answer.push(checksum);

        // A SetParameter ack.
        let mut ack = vec![0x33, 0xCC, 0x00, 0, 0x04, 0, 0, 0x00, 0x1E, 0x00, 0x01, 0x01];
        let total = ack.len();
        ack[3] = total as u8;
        let checksum = ack[0..total - 1].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        ack.push(checksum);

        let mut transport = FakeTransport::new(vec![answer, ack]);
        parameter_set(&mut transport, &["light-on=True".to_string()]).unwrap();

        assert_eq!(transport.written.len(), 2, "exactly one GetParameter and one SetParameter");
        let written_byte = transport.written[1][12]; // payload starts right after the 12-byte request header
        // bit 4 set, bits 0..3 and 5..7 preserved from old_byte.
        assert_eq!(written_byte, old_byte | 0b0001_0000);
    }
}
