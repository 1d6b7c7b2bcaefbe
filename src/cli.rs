//! Command-line console and port listing
//!
//! The console feeds synthetic key/button events into a [`Session`] and
//! drives its frames by hand, one command per line.

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::DefaultEditor;
use serde::Serialize;
use std::time::Duration;

use crate::dispatcher::SendOutcome;
use crate::input::SyntheticSource;
use crate::midi::pitch::{note_name_to_midi, pitch_to_frequency};
use crate::session::Session;

const HELP: &str = "\
commands:
  down <key>               press a key
  up <key>                 release a key
  click <code>             press a mouse button (raw code, 0 = left)
  release <code>           release a mouse button
  frame                    play mapped keys pressed since last frame, advance
  held                     list held keys and buttons
  note <pitch> [vel] [ms]  timed note (pitch as number or name)
  on <pitch> [vel]         note on
  off <pitch>              note off
  ports                    list output ports
  select <index>           select output port
  mtf <pitch>              pitch to frequency
  verbose on|off           toggle MIDI diagnostics
  help                     this text
  quit                     leave";

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    KeyDown(String),
    KeyUp(String),
    Click(u16),
    Release(u16),
    Frame,
    Held,
    Note { pitch: u8, velocity: Option<u8>, duration_ms: Option<u64> },
    On { pitch: u8, velocity: Option<u8> },
    Off(u8),
    Ports,
    Select(usize),
    Mtf(u8),
    Verbose(bool),
    Help,
    Quit,
}

/// Result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Parse a pitch given as MIDI number (0-127) or note name
pub fn parse_pitch(s: &str) -> Result<u8> {
    if let Ok(n) = s.parse::<u8>() {
        if n > 127 {
            bail!("pitch {} out of range (0-127)", n);
        }
        return Ok(n);
    }
    note_name_to_midi(s).ok_or_else(|| anyhow!("invalid pitch '{}'", s))
}

fn parse_velocity(s: Option<&str>) -> Result<Option<u8>> {
    s.map(|v| -> Result<u8> {
        let v: u8 = v.parse().with_context(|| format!("invalid velocity '{}'", v))?;
        if v > 127 {
            bail!("velocity {} out of range (0-127)", v);
        }
        Ok(v)
    })
    .transpose()
}

impl Command {
    /// Parse a console line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        let arg2 = parts.next();
        let arg3 = parts.next();

        let required = |name: &str| arg.ok_or_else(|| anyhow!("'{}' needs an argument", name));

        let command = match head.to_lowercase().as_str() {
            "down" => Command::KeyDown(required("down")?.to_string()),
            "up" => Command::KeyUp(required("up")?.to_string()),
            "click" => Command::Click(
                required("click")?
                    .parse()
                    .context("button code must be a number")?,
            ),
            "release" => Command::Release(
                required("release")?
                    .parse()
                    .context("button code must be a number")?,
            ),
            "frame" | "tick" => Command::Frame,
            "held" => Command::Held,
            "note" => Command::Note {
                pitch: parse_pitch(required("note")?)?,
                velocity: parse_velocity(arg2)?,
                duration_ms: arg3
                    .map(|d| d.parse::<u64>())
                    .transpose()
                    .context("duration must be milliseconds")?,
            },
            "on" => Command::On {
                pitch: parse_pitch(required("on")?)?,
                velocity: parse_velocity(arg2)?,
            },
            "off" => Command::Off(parse_pitch(required("off")?)?),
            "ports" | "list" => Command::Ports,
            "select" => Command::Select(
                required("select")?
                    .parse()
                    .context("port index must be a number")?,
            ),
            "mtf" => Command::Mtf(parse_pitch(required("mtf")?)?),
            "verbose" => match required("verbose")? {
                "on" | "true" | "1" => Command::Verbose(true),
                "off" | "false" | "0" => Command::Verbose(false),
                other => bail!("verbose expects on/off, got '{}'", other),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };

        Ok(Some(command))
    }
}

fn describe(outcome: SendOutcome) -> &'static str {
    match outcome {
        SendOutcome::Sent => "sent",
        SendOutcome::NoDestination => "no output selected",
        SendOutcome::Failed => "send failed",
        SendOutcome::Invalid => "out of range, not sent",
    }
}

/// Apply a command to the session
pub fn execute(command: Command, session: &mut Session, source: &SyntheticSource) -> Reply {
    let text = match command {
        Command::KeyDown(key) => {
            source.key_down(&key);
            format!("{} down", key)
        }
        Command::KeyUp(key) => {
            source.key_up(&key);
            format!("{} up", key)
        }
        Command::Click(code) => {
            source.button_down(code);
            format!("button {} down", code)
        }
        Command::Release(code) => {
            source.button_up(code);
            format!("button {} up", code)
        }
        Command::Frame => {
            let played = session.frame();
            if played.is_empty() {
                "frame: nothing played".to_string()
            } else {
                format!("frame: played {:?}", played)
            }
        }
        Command::Held => {
            let input = session.input();
            let buttons: Vec<String> = input.held_buttons().iter().map(|b| b.to_string()).collect();
            format!("keys: {:?} buttons: {:?}", input.held_keys(), buttons)
        }
        Command::Note { pitch, velocity, duration_ms } => {
            let mut event = session.note_event(pitch);
            if let Some(v) = velocity {
                event = event.with_velocity(v);
            }
            if let Some(ms) = duration_ms {
                event = event.with_duration(Duration::from_millis(ms));
            }
            let outcome = session.dispatcher().play(event);
            format!(
                "note {} v{} {}ms: {}",
                pitch,
                event.velocity,
                event.duration.as_millis(),
                describe(outcome)
            )
        }
        Command::On { pitch, velocity } => {
            let velocity = velocity.unwrap_or(session.config().notes.velocity);
            let outcome = session.dispatcher().note_on(pitch, velocity);
            format!("note on {} v{}: {}", pitch, velocity, describe(outcome))
        }
        Command::Off(pitch) => {
            let outcome = session.dispatcher().note_off(pitch);
            format!("note off {}: {}", pitch, describe(outcome))
        }
        Command::Ports => {
            let dispatcher = session.dispatcher();
            format_ports(&dispatcher.list_ports(), dispatcher.selected_index())
        }
        Command::Select(index) => match session.dispatcher().select_port(index) {
            Some(name) => format!("selected: {}", name),
            None => "no output selected".to_string(),
        },
        Command::Mtf(pitch) => format!("{} -> {:.3} Hz", pitch, pitch_to_frequency(pitch)),
        Command::Verbose(on) => {
            session.dispatcher().set_verbose(on);
            format!("verbose {}", if on { "on" } else { "off" })
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Reply::Quit,
    };

    Reply::Text(text)
}

/// Interactive console over a session
pub async fn run_repl(session: &mut Session, source: &SyntheticSource) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    println!("{}", "Type 'help' for commands.".dimmed());

    loop {
        let readline = rl.readline("gdc> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                match Command::parse(&line) {
                    Ok(Some(command)) => match execute(command, session, source) {
                        Reply::Text(text) => println!("{}", text),
                        Reply::Quit => break,
                    },
                    Ok(None) => {}
                    Err(e) => println!("{} {}", "error:".red(), e),
                }
            }
            Err(_) => break,
        }
    }

    Ok(())
}

/// One entry of a port listing
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
    pub selected: bool,
}

/// Describe enumerated ports, flagging virtual buses and the selection
pub fn port_infos(names: &[String], selected: Option<usize>) -> Vec<PortInfo> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| PortInfo {
            index,
            name: name.clone(),
            is_virtual: name.contains("Virtual")
                || name.contains("loopMIDI")
                || name.contains("IAC"),
            selected: selected == Some(index),
        })
        .collect()
}

/// Human-readable port table
pub fn format_ports(names: &[String], selected: Option<usize>) -> String {
    let mut out = format!("{}", "Output Ports:".bold());
    let ports = port_infos(names, selected);

    if ports.is_empty() {
        out.push_str(&format!("\n  {}", "No output ports found".dimmed()));
        return out;
    }

    for port in ports {
        let marker = if port.is_virtual {
            "[VIRTUAL]".yellow()
        } else {
            "[PHYSICAL]".green()
        };
        let current = if port.selected { " *".bright_green().to_string() } else { String::new() };
        out.push_str(&format!("\n  {}: {} {}{}", port.index, marker, port.name, current));
    }
    out
}

/// Port listing as JSON
pub fn ports_json(names: &[String], selected: Option<usize>) -> Result<String> {
    serde_json::to_string_pretty(&port_infos(names, selected)).context("Failed to serialize port list")
}
