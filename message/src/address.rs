use std::{
    fmt::{
        Display,
        Formatter,
    },
    str::FromStr,
};

use packed_struct::prelude::*;

use crate::Error;

pub const CALLSIGN_LEN: usize = 6;
pub const ADDRESS_LEN: usize = CALLSIGN_LEN + 1;
pub const MAX_SSID: u8 = 15;

/// A station address: an uppercase alphanumeric callsign of 1 to 6 characters and an SSID.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Address {
    callsign: [u8; CALLSIGN_LEN],
    len:      u8,
    ssid:     u8,
}

/// Which end of a link an address names.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AddressSide {
    #[display(fmt = "source")]
    Source,
    #[display(fmt = "destination")]
    Destination,
    #[display(fmt = "source and destination")]
    Both,
}

/// Final octet of an encoded address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "1")]
pub struct SsidOctet {
    #[packed_field(bits = "0")]
    pub command:  bool,
    #[packed_field(bits = "1..=2")]
    pub reserved: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "3..=6")]
    pub ssid:     Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "7")]
    pub last:     bool,
}

impl Address {
    pub fn new(callsign: &str, ssid: u8) -> Result<Self, Error> {
        if !valid_callsign(callsign) || ssid > MAX_SSID {
            return Err(Error::InvalidCallsign(format!("{}-{}", callsign, ssid)));
        }

        let mut buf = [b' '; CALLSIGN_LEN];
        for (dst, src) in buf.iter_mut().zip(callsign.bytes()) {
            *dst = src.to_ascii_uppercase();
        }

        Ok(Self {
            callsign: buf,
            len: callsign.len() as u8,
            ssid,
        })
    }

    #[inline]
    pub fn callsign(&self) -> &str {
        // only ascii alphanumerics are ever stored
        std::str::from_utf8(&self.callsign[..self.len as usize]).unwrap_or_default()
    }

    #[inline]
    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    /// Shift-and-mask encoding: each callsign byte shifted left one bit, space padded, followed by
    /// the SSID octet.
    pub fn encode(&self, command: bool, last: bool) -> [u8; ADDRESS_LEN] {
        let mut out = [0u8; ADDRESS_LEN];

        for (dst, src) in out.iter_mut().zip(self.callsign.iter()) {
            *dst = src << 1;
        }

        let octet = SsidOctet {
            command,
            reserved: 0b11.into(),
            ssid: self.ssid.into(),
            last,
        };

        out[CALLSIGN_LEN] = octet.pack().map(|[b]| b).unwrap_or_default();
        out
    }

    pub fn decode(src: &[u8]) -> Result<(Self, SsidOctet), Error> {
        if src.len() < ADDRESS_LEN {
            return Err(Error::FrameTooShort(src.len()));
        }

        let callsign = src[..CALLSIGN_LEN].iter().map(|b| (b >> 1) as char).collect::<String>();
        let callsign = callsign.trim_end_matches(' ');

        let octet = SsidOctet::unpack(&[src[CALLSIGN_LEN]])
            .map_err(|_| Error::InvalidCallsign(callsign.to_owned()))?;

        let addr = Self::new(callsign, *octet.ssid)?;
        Ok((addr, octet))
    }
}

/// Station callsign grammar: 1 to 6 ascii letters or digits.
pub fn valid_callsign(callsign: &str) -> bool {
    (1..=CALLSIGN_LEN).contains(&callsign.len())
        && callsign.bytes().all(|b| b.is_ascii_alphanumeric())
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign())
        } else {
            write!(f, "{}-{}", self.callsign(), self.ssid)
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid = ssid.parse::<u8>().map_err(|_| Error::InvalidCallsign(s.to_owned()))?;
                Address::new(call, ssid)
            },
            None => Address::new(s, 0),
        }
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn encode_ground_station() -> eyre::Result<()> {
        let addr = Address::new("atlas", 0)?;
        let encoded = addr.encode(true, false);

        assert_eq!(&encoded[..6], &[b'A' << 1, b'T' << 1, b'L' << 1, b'A' << 1, b'S' << 1, b' ' << 1]);
        assert_eq!(encoded[6], 0b1110_0000);

        let encoded = addr.encode(false, true);
        assert_eq!(encoded[6], 0b0110_0001);

        Ok(())
    }

    #[test]
    fn rejects_bad_callsigns() {
        assert!(Address::new("", 0).is_err());
        assert!(Address::new("TOOLONG", 0).is_err());
        assert!(Address::new("AB-C", 0).is_err());
        assert!(Address::new("ABC", 16).is_err());
    }

    #[test]
    fn parse_with_ssid() -> eyre::Result<()> {
        let addr = "akito-7".parse::<Address>()?;

        assert_eq!(addr.callsign(), "AKITO");
        assert_eq!(addr.ssid(), 7);
        assert_eq!(addr.to_string(), "AKITO-7");

        Ok(())
    }

    proptest! {
        #[test]
        fn encode_decode(callsign in "[A-Z0-9]{1,6}", ssid in 0u8..=15, command in any::<bool>(), last in any::<bool>()) {
            let addr = Address::new(&callsign, ssid).unwrap();
            let (decoded, octet) = Address::decode(&addr.encode(command, last)).unwrap();

            assert_eq!(addr, decoded);
            assert_eq!(octet.command, command);
            assert_eq!(octet.last, last);
        }
    }
}
