//! Command-line interface and REPL

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use crate::midi::format_hex;
use crate::session::{DeviceMatcher, DeviceSession};
use crate::transport::MidiBackend;

const HELP: &str = "\
Commands:
  show [json]         Print the current slot and parameter values
  set <key> <value>   Write one parameter to the device
  read <slot>         Request a slot dump (1-6)
  refresh             Re-read the current slot
  write-all           Write every current value to the device
  params              List the parameter catalog
  ports               List MIDI ports
  connect             (Re)connect to the device
  disconnect          Close the device ports
  help                Show this help
  quit                Exit";

/// A parsed REPL command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show { json: bool },
    Set { key: String, value: i32 },
    Read(u8),
    Refresh,
    WriteAll,
    Params,
    Ports,
    Connect,
    Disconnect,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("show", []) => Command::Show { json: false },
            ("show", ["json"]) => Command::Show { json: true },
            ("set", [key, value]) => Command::Set {
                key: key.to_string(),
                value: value
                    .parse()
                    .with_context(|| format!("Invalid value: {}", value))?,
            },
            ("read", [slot]) => Command::Read(
                slot.parse()
                    .with_context(|| format!("Invalid slot: {}", slot))?,
            ),
            ("refresh", []) => Command::Refresh,
            ("write-all", []) => Command::WriteAll,
            ("params", []) => Command::Params,
            ("ports", []) => Command::Ports,
            ("connect", []) => Command::Connect,
            ("disconnect", []) => Command::Disconnect,
            ("help", []) | ("?", []) => Command::Help,
            ("quit", []) | ("exit", []) => Command::Quit,
            (other, _) => bail!("Unknown command or wrong arguments: {} (try 'help')", other),
        };
        Ok(Some(command))
    }
}

/// Connect and start the inbound listener task for the new connection
pub fn connect_device(session: &mut DeviceSession, backend: &mut dyn MidiBackend) -> Result<()> {
    session.connect(backend)?;
    let listener = session
        .take_listener()
        .ok_or_else(|| anyhow!("No inbound listener for connection"))?;
    tokio::spawn(listener.run());

    if let Some((input, output)) = session.port_names() {
        println!("{} {} / {}", "Connected:".green().bold(), input, output);
    }
    Ok(())
}

/// Interactive loop; returns when the user quits or closes stdin
pub async fn run_repl(session: &mut DeviceSession, backend: &mut dyn MidiBackend) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("Type 'help' for commands.");

    loop {
        let prompt = if session.is_connected() { "sde> " } else { "sde (offline)> " };
        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = rl.add_history_entry(line.as_str());

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", format!("{:#}", e).red());
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(command, session, backend) {
            println!("{}", format!("{:#}", e).red());
        }
    }

    Ok(())
}

fn execute(command: Command, session: &mut DeviceSession, backend: &mut dyn MidiBackend) -> Result<()> {
    match command {
        Command::Show { json } => print_snapshot(session, json)?,
        Command::Set { key, value } => {
            let frame = session.write_param(&key, value)?;
            debug!("Wrote {}", format_hex(&frame));
            let stored = session.store().snapshot().get(&key).unwrap_or_default();
            println!("{} = {}", key.yellow(), stored.to_string().green());
        }
        Command::Read(slot) => {
            session.read_slot(slot)?;
            println!("Requested slot {}", slot);
        }
        Command::Refresh => {
            session.refresh()?;
            println!("Requested slot {}", session.store().current_slot());
        }
        Command::WriteAll => {
            let count = session.write_all()?;
            println!("Wrote {} parameters", count.to_string().green());
        }
        Command::Params => print_catalog(session),
        Command::Ports => print_ports(backend, session.matcher())?,
        Command::Connect => connect_device(session, backend)?,
        Command::Disconnect => session.disconnect(),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_snapshot(session: &DeviceSession, json: bool) -> Result<()> {
    let snapshot = session.store().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("\n{} {}", "Slot".bold(), snapshot.slot.to_string().cyan().bold());
    let table = session.store().codec().table();
    for (def, entry) in table.ordered().iter().zip(&snapshot.values) {
        println!(
            "  {:<14} {:>3}  {}",
            def.name,
            entry.value.to_string().green(),
            format!("({}..={})", def.min, def.max).dimmed()
        );
    }
    println!();
    Ok(())
}

fn print_catalog(session: &DeviceSession) {
    println!("\n{}", "Parameters:".bold());
    for def in session.store().codec().table().ordered() {
        println!(
            "  0x{:02X}  {:<14} {:<14} {}..={}",
            def.id,
            def.key.yellow(),
            def.name,
            def.min,
            def.max
        );
    }
    println!();
}

/// Print input/output ports, marking the ones the matcher accepts
pub fn print_ports(backend: &dyn MidiBackend, matcher: &DeviceMatcher) -> Result<()> {
    for (title, ports) in [
        ("=== MIDI Input Ports ===", backend.input_ports()?),
        ("=== MIDI Output Ports ===", backend.output_ports()?),
    ] {
        println!("\n{}", title.bold().cyan());
        if ports.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for (i, port) in ports.iter().enumerate() {
            let tag = if matcher.matches(port) { " [DEVICE]".green().to_string() } else { String::new() };
            println!("  {}: {}{}", i, port, tag);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("show").unwrap(), Some(Command::Show { json: false }));
        assert_eq!(Command::parse("SHOW json").unwrap(), Some(Command::Show { json: true }));
        assert_eq!(
            Command::parse("set delayTime 64").unwrap(),
            Some(Command::Set { key: "delayTime".to_string(), value: 64 })
        );
        assert_eq!(
            Command::parse("set tone -3").unwrap(),
            Some(Command::Set { key: "tone".to_string(), value: -3 })
        );
        assert_eq!(Command::parse("  read 3 ").unwrap(), Some(Command::Read(3)));
        assert_eq!(Command::parse("write-all").unwrap(), Some(Command::WriteAll));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("set delayTime").is_err());
        assert!(Command::parse("set delayTime loud").is_err());
        assert!(Command::parse("read three").is_err());
        assert!(Command::parse("read 300").is_err());
        assert!(Command::parse("reverse").is_err());
    }
}
