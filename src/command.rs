use std::{
    path::Path,
    str::FromStr,
    time::{
        SystemTime,
        UNIX_EPOCH,
    },
};

use eyre::{
    eyre,
    WrapErr,
};

use message::{
    CommandId,
    CommandMessage,
    CommandPayload,
    ProgrammingSession,
};

use crate::options::SendArgs;

/// Decimal or `0x`-prefixed hex.
fn parse_number<T>(s: &str) -> eyre::Result<T>
where
    T: TryFrom<u64>,
{
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => s.parse::<u64>()?,
    };

    T::try_from(value).map_err(|_| eyre!("{} out of range", s))
}

fn parse_session(s: &str) -> eyre::Result<ProgrammingSession> {
    match s.to_ascii_lowercase().as_str() {
        "app" | "application" | "0" => Ok(ProgrammingSession::Application),
        "bl" | "bootloader" | "1" => Ok(ProgrammingSession::Bootloader),
        other => Err(eyre!("unknown programming session: {}", other)),
    }
}

fn unix_now() -> eyre::Result<u32> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    u32::try_from(secs).wrap_err("system time past u32 range")
}

fn nth_arg<'a>(args: &'a [String], i: usize, id: CommandId, what: &str) -> eyre::Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| eyre!("{} requires <{}>", id.name(), what))
}

/// Build one command from its name and positional arguments.
pub fn parse(words: &[String], at: Option<u32>) -> eyre::Result<CommandMessage> {
    let (name, args) = words.split_first().ok_or_else(|| eyre!("no command given"))?;
    let id = CommandId::from_str(name)?;

    let arg = |i: usize, what: &'static str| nth_arg(args, i, id, what);

    let command = match id {
        CommandId::RtcSync => CommandMessage::rtc_sync(match args.first() {
            Some(t) => parse_number(t)?,
            None => unix_now()?,
        }),
        CommandId::DownlinkLogsNextPass => {
            CommandMessage::downlink_logs_next_pass(parse_number(arg(0, "log-level")?)?)
        },
        CommandId::SetProgrammingSession => {
            CommandMessage::set_programming_session(parse_session(arg(0, "session")?)?)
        },
        CommandId::DownloadData => CommandMessage::download_data(
            parse_number(arg(0, "kind")?)?,
            parse_number(arg(1, "length")?)?,
            parse_number(arg(2, "address")?)?,
        ),
        CommandId::Arm => {
            CommandMessage::arm(parse_number(arg(0, "arm-id")?)?, parse_number(arg(1, "timeout")?)?)
        },
        CommandId::Execute => {
            CommandMessage::execute(parse_number(arg(0, "arm-id")?)?, parse_number(arg(1, "timeout")?)?)
        },
        id => CommandMessage::new(id, CommandPayload::None)?,
    };

    Ok(match at {
        Some(t) => command.at(t),
        None => command,
    })
}

pub fn load_json(path: &Path) -> eyre::Result<Vec<CommandMessage>> {
    let file = std::fs::File::open(path).wrap_err_with(|| format!("opening {}", path.display()))?;
    let commands = serde_json::from_reader(std::io::BufReader::new(file))?;

    Ok(commands)
}

impl SendArgs {
    pub fn commands(&self) -> eyre::Result<Vec<CommandMessage>> {
        match &self.json {
            Some(path) => load_json(path),
            None => Ok(vec![parse(&self.command, self.at)?]),
        }
    }
}
