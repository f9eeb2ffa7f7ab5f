//! Link-layer runtime: transports, request/response sessions, the link state machine and the
//! background log poller.

mod config;
mod controller;
mod error;
mod pipeline;
mod poller;
mod retry;
mod session;
mod sink;
pub mod state_machine;
pub mod transport;

pub use config::*;
pub use controller::{
    BlockReply,
    LinkController,
};
pub use error::{
    Error,
    TransportError,
};
pub use pipeline::CommsPipeline;
pub use poller::LogPoller;
pub use retry::{
    connect_with_retry,
    RetryPolicy,
};
pub use session::LinkSession;
pub use sink::LogSink;
pub use state_machine::{
    Event,
    LinkStateMachine,
    State,
};
pub use transport::{
    SerialTransport,
    StreamTransport,
    Transport,
};
