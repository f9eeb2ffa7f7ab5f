pub mod aes;
pub mod bit_stuff;
pub mod fec;
mod flag;
mod gateway;

pub use self::{
    flag::*,
    gateway::*,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("reed-solomon block has more errors than it can correct")]
    FecUncorrectable,

    #[error("fec input of {0} bytes exceeds one block")]
    FecInputTooLarge(usize),

    #[error("fec codeword has wrong length {0}")]
    FecBadLength(usize),

    #[error(transparent)]
    Message(#[from] message::Error),
}
