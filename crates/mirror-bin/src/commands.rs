//! Line commands accepted on stdin or through `--script`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use mirror_platform::display::DisplayMode;
use mirror_platform::orientation::DeviceOrientation;

/// Modes advertised by `connect` when none are given
pub const DEFAULT_MODES: [DisplayMode; 2] =
    [DisplayMode::new(1280, 720), DisplayMode::new(1920, 1080)];

pub const HELP: &str = "\
commands:
  connect [WxH ...]      attach an external display
  disconnect             detach the external display
  modes WxH ...          change the modes the external display advertises
  rotate <orientation>   portrait | upside-down | left | right | face-up | face-down
  mirror on|off          enable or disable mirroring
  safe on|off            toggle the TV-safe inset
  alert on|off           show or hide the alert window
  fail-every <n>         fail every nth capture (0 disables)
  status                 print the mirror status as JSON
  snapshot <file.png>    save what the external display shows
  wait <ms>              pause before the next command
  help                   show this list
  quit                   stop mirroring and exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect(Vec<DisplayMode>),
    Disconnect,
    Modes(Vec<DisplayMode>),
    Rotate(DeviceOrientation),
    Mirror(bool),
    Safe(bool),
    Alert(bool),
    FailEvery(u64),
    Status,
    Snapshot(PathBuf),
    Wait(Duration),
    Help,
    Quit,
}

impl Command {
    /// Parse one line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        line.parse().map(Some)
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let name = words.next().context("empty command")?;
        let args: Vec<&str> = words.collect();

        let command = match (name, args.as_slice()) {
            ("connect", []) => Command::Connect(DEFAULT_MODES.to_vec()),
            ("connect", modes) => Command::Connect(parse_modes(modes)?),
            ("disconnect", []) => Command::Disconnect,
            ("modes", []) => bail!("modes needs at least one WxH"),
            ("modes", modes) => Command::Modes(parse_modes(modes)?),
            ("rotate", [o]) => Command::Rotate(parse_orientation(o)?),
            ("mirror", [v]) => Command::Mirror(parse_switch(v)?),
            ("safe", [v]) => Command::Safe(parse_switch(v)?),
            ("alert", [v]) => Command::Alert(parse_switch(v)?),
            ("fail-every", [n]) => {
                Command::FailEvery(n.parse().with_context(|| format!("invalid count '{}'", n))?)
            }
            ("status", []) => Command::Status,
            ("snapshot", [path]) => Command::Snapshot(PathBuf::from(path)),
            ("wait", [ms]) => Command::Wait(Duration::from_millis(
                ms.parse().with_context(|| format!("invalid milliseconds '{}'", ms))?,
            )),
            ("help", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            _ => bail!("unrecognized command '{}' (try 'help')", s),
        };
        Ok(command)
    }
}

/// Split a `--script` argument into its commands
pub fn split_script(script: &str) -> Vec<String> {
    script
        .split(|c| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_modes(args: &[&str]) -> Result<Vec<DisplayMode>> {
    args.iter().map(|a| parse_mode(a)).collect()
}

fn parse_mode(s: &str) -> Result<DisplayMode> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("invalid mode '{}', expected WxH", s))?;
    let width: u32 = w.parse().with_context(|| format!("invalid width in '{}'", s))?;
    let height: u32 = h.parse().with_context(|| format!("invalid height in '{}'", s))?;
    Ok(DisplayMode::new(width, height))
}

fn parse_orientation(s: &str) -> Result<DeviceOrientation> {
    Ok(match s {
        "portrait" => DeviceOrientation::Portrait,
        "upside-down" => DeviceOrientation::PortraitUpsideDown,
        "left" => DeviceOrientation::LandscapeLeft,
        "right" => DeviceOrientation::LandscapeRight,
        "face-up" => DeviceOrientation::FaceUp,
        "face-down" => DeviceOrientation::FaceDown,
        _ => bail!("unknown orientation '{}'", s),
    })
}

fn parse_switch(s: &str) -> Result<bool> {
    match s {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => bail!("expected on or off, got '{}'", s),
    }
}
