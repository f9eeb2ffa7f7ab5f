use std::time::Duration;

use codec::aes;

pub const DEFAULT_BAUD: u32 = 115_200;
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
pub const READ_WINDOW: usize = 10_000;

/// Uplinked I-frames are zero-padded to this many bytes; the spacecraft reads fixed-size frames.
pub const UPLINK_PADDING: usize = 300;
pub const CONNECT_PADDING: usize = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    pub ground_callsign:  String,
    pub cubesat_callsign: String,
    pub pid:              u8,

    pub aes_key:            aes::Key,
    pub aes_iv:             aes::Iv,
    pub encrypted_downlink: bool,

    pub baud:            u32,
    pub read_timeout:    Duration,
    pub read_window:     usize,
    pub uplink_padding:  usize,
    pub connect_padding: usize,

    /// Read windows to wait for a spacecraft-initiated connection in emergency mode.
    pub emergency_listen_windows: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ground_callsign:  message::GROUND_STATION_CALLSIGN.to_owned(),
            cubesat_callsign: message::CUBESAT_CALLSIGN.to_owned(),
            pid:              message::frame::DEFAULT_PID,

            aes_key:            aes::DEFAULT_KEY,
            aes_iv:             aes::DEFAULT_IV,
            encrypted_downlink: true,

            baud:            DEFAULT_BAUD,
            read_timeout:    READ_TIMEOUT,
            read_window:     READ_WINDOW,
            uplink_padding:  UPLINK_PADDING,
            connect_padding: CONNECT_PADDING,

            emergency_listen_windows: 30,
        }
    }
}
