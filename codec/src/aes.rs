//! AES-128 in CTR mode: one keystream transform serves both directions.

use aes::Aes128;
use ctr::cipher::{
    KeyIvInit,
    StreamCipher,
};

pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;

pub type Key = [u8; KEY_LEN];
pub type Iv = [u8; IV_LEN];

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

pub const DEFAULT_KEY: Key = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
pub const DEFAULT_IV: Iv = [0x01; IV_LEN];

pub fn apply(data: &[u8], key: &Key, iv: &Iv) -> Vec<u8> {
    let mut out = data.to_vec();

    let mut cipher = Aes128Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(&mut out);

    out
}
