use std::{
    path::PathBuf,
    time::Duration,
};

use codec::aes;
use runtime::LinkConfig;

fn parse_block(s: &str) -> Result<[u8; 16], String> {
    let bytes = hex::decode(s).map_err(|e| e.to_string())?;

    <[u8; 16]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 16 bytes of hex, got {}", bytes.len()))
}

#[derive(Debug, Clone, PartialEq, Eq, structopt::StructOpt)]
#[structopt(name = "gslink", about = "Ground-station link to the cubesat")]
pub struct Options {
    /// Serial port of the ground radio.
    #[structopt(short, long, env = "GSLINK_PORT")]
    pub port: Option<String>,

    #[structopt(short, long, env = "GSLINK_BAUD", default_value = "115200")]
    pub baud: u32,

    #[structopt(long, default_value = "ATLAS")]
    pub ground_callsign: String,

    #[structopt(long, default_value = "AKITO")]
    pub cubesat_callsign: String,

    #[structopt(
        long,
        env = "GSLINK_AES_KEY",
        hide_env_values = true,
        default_value = "000102030405060708090a0b0c0d0e0f",
        parse(try_from_str = parse_block)
    )]
    pub aes_key: aes::Key,

    #[structopt(long, default_value = "01010101010101010101010101010101", parse(try_from_str = parse_block))]
    pub aes_iv: aes::Iv,

    /// The spacecraft downlinks responses unencrypted.
    #[structopt(long)]
    pub plaintext_downlink: bool,

    #[structopt(long, default_value = "1000")]
    pub read_timeout_ms: u64,

    /// Raise link-layer logging; repeat for trace. Ignored when GSLINK_LOG is set.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    /// Spacecraft chatter and polled responses are appended here.
    #[structopt(long, default_value = "./logs.log")]
    pub log_file: PathBuf,

    #[structopt(subcommand)]
    pub command: Command,
}

impl Options {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            ground_callsign: self.ground_callsign.clone(),
            cubesat_callsign: self.cubesat_callsign.clone(),
            aes_key: self.aes_key,
            aes_iv: self.aes_iv,
            encrypted_downlink: !self.plaintext_downlink,
            baud: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            ..LinkConfig::default()
        }
    }

    pub fn port(&self) -> eyre::Result<&str> {
        self.port
            .as_deref()
            .ok_or_else(|| eyre::eyre!("no serial port given (--port or GSLINK_PORT)"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, structopt::StructOpt)]
pub enum Command {
    /// Open the link and wait for the spacecraft's acknowledgement.
    Connect,

    /// Connect, uplink commands, then disconnect.
    Send(SendArgs),

    /// Connect and immediately tear the link down.
    Disconnect,

    /// Wait for the spacecraft to open the link, then uplink commands.
    Emergency(SendArgs),

    /// Append spacecraft output to the log file until interrupted.
    Poll,

    /// Interactive session against one long-lived link.
    Repl,

    /// List serial ports on this machine.
    ListPorts,
}

#[derive(Debug, Clone, PartialEq, Eq, structopt::StructOpt)]
pub struct SendArgs {
    /// Command name (e.g. `rtc-sync`) followed by its arguments.
    #[structopt(required_unless = "json")]
    pub command: Vec<String>,

    /// Schedule for execution at this unix time.
    #[structopt(long)]
    pub at: Option<u32>,

    /// Read a JSON array of commands instead.
    #[structopt(long, conflicts_with = "command")]
    pub json: Option<PathBuf>,
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use super::*;

    #[test]
    fn defaults_match_link_config() -> eyre::Result<()> {
        let options = Options::from_iter_safe(["gslink", "--port", "/dev/null", "connect"])?;
        let config = options.link_config();

        assert_eq!(config, LinkConfig::default());
        assert_eq!(options.command, Command::Connect);
        assert_eq!(options.verbose, 0);

        Ok(())
    }

    #[test]
    fn send_args() -> eyre::Result<()> {
        let options = Options::from_iter_safe(["gslink", "send", "rtc-sync", "1700000000", "--at", "5"])?;

        match options.command {
            Command::Send(args) => {
                assert_eq!(args.command, vec!["rtc-sync", "1700000000"]);
                assert_eq!(args.at, Some(5));
            },
            other => panic!("unexpected command: {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn repeated_verbose() -> eyre::Result<()> {
        let options = Options::from_iter_safe(["gslink", "-vv", "poll"])?;
        assert_eq!(options.verbose, 2);

        Ok(())
    }

    #[test]
    fn rejects_short_key() {
        assert!(Options::from_iter_safe(["gslink", "--aes-key", "0011", "connect"]).is_err());
    }
}
