use std::sync::Arc;

use codec::{
    CodecGateway,
    StandardGateway,
};
use message::{
    Block,
    CommandId,
    CommandMessage,
    CommandResponse,
    Frame,
    FrameKind,
};

use crate::{
    Error,
    Event,
    LinkSession,
    LinkStateMachine,
    LogPoller,
    LogSink,
    State,
    Transport,
    TransportError,
};

/// Drives the link state machine through complete ground-station operations.
///
/// The transport is exclusively owned: while log polling is enabled the poller holds it, and
/// each operation stops the poller for the duration of its exchange.
pub struct LinkController<T, G = StandardGateway> {
    machine:   LinkStateMachine,
    session:   LinkSession<G>,
    transport: Option<T>,
    poller:    Option<LogPoller<T>>,
    polling:   bool,
}

/// Outcome of one uplinked block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockReply {
    Response(CommandResponse),
    /// A frame with nothing to parse, e.g. an unnumbered acknowledgement.
    Frame(Frame),
    /// Nothing heard, and nothing in the block required a reply.
    Silent,
}

impl std::fmt::Display for BlockReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReply::Response(response) => write!(f, "{}", response),
            BlockReply::Frame(frame) => write!(f, "{}", frame),
            BlockReply::Silent => write!(f, "no reply"),
        }
    }
}

fn expects_reply(commands: &[CommandMessage]) -> bool {
    commands
        .iter()
        .any(|c| !c.is_time_tagged() && c.id() != CommandId::ExecObcReset)
}

impl<T, G> LinkController<T, G>
where
    T: Transport + 'static,
    G: CodecGateway + 'static,
{
    pub fn new(transport: T, session: LinkSession<G>) -> Self {
        Self {
            machine: LinkStateMachine::new(),
            session,
            transport: Some(transport),
            poller: None,
            polling: false,
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.machine.state()
    }

    #[inline]
    pub fn session(&self) -> &LinkSession<G> {
        &self.session
    }

    #[inline]
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// Hand the transport to a background log poller between operations.
    pub async fn start_polling(&mut self) -> Result<(), Error> {
        if self.polling {
            return Ok(());
        }

        let sink = self.poll_sink()?;
        let transport = self.acquire().await?;

        self.polling = true;
        self.spawn_poller(transport, sink);

        Ok(())
    }

    pub async fn stop_polling(&mut self) -> Result<(), Error> {
        let transport = self.acquire().await?;

        self.polling = false;
        self.transport = Some(transport);

        Ok(())
    }

    /// Stop everything and give the transport back.
    pub async fn into_transport(mut self) -> Result<T, Error> {
        self.acquire().await
    }

    /// SABM, then wait for UA.
    #[tracing::instrument(skip_all, err(Display))]
    pub async fn connect(&mut self) -> Result<Frame, Error> {
        self.machine.recover();
        self.machine.transition(Event::BeginUplink)?;

        let mut transport = self.acquire_or_fail().await?;
        let result = self.connect_with(&mut transport).await;
        self.release(transport);

        self.settle(result)
    }

    /// Batch, uplink and collect a reply for each block.
    ///
    /// A batch that fails to pack is rejected before anything is sent and leaves the link up.
    #[tracing::instrument(skip_all, fields(commands = commands.len()), err(Display))]
    pub async fn send(&mut self, commands: &[CommandMessage]) -> Result<Vec<BlockReply>, Error> {
        self.require(State::Uplinking)?;
        let blocks = message::pack_commands(commands)?;

        let mut transport = self.acquire_or_fail().await?;
        let result = self.uplink(&blocks, expects_reply(commands), &mut transport, true).await;
        self.release(transport);

        self.settle(result)
    }

    /// DISC, wait for the spacecraft's DISC or UA, then acknowledge it.
    #[tracing::instrument(skip_all, err(Display))]
    pub async fn disconnect(&mut self) -> Result<(), Error> {
        self.require(State::Uplinking)?;
        self.machine.transition(Event::Disconnecting)?;

        let mut transport = self.acquire_or_fail().await?;
        let result = self.disconnect_with(&mut transport).await;
        self.release(transport);

        self.settle(result)
    }

    /// Wait for the spacecraft to open the link, acknowledge, then uplink `commands`.
    #[tracing::instrument(skip_all, fields(commands = commands.len()), err(Display))]
    pub async fn emergency(&mut self, commands: &[CommandMessage]) -> Result<Vec<BlockReply>, Error> {
        let blocks = message::pack_commands(commands)?;

        self.machine.recover();
        self.machine.transition(Event::EnterEmergency)?;

        let mut transport = self.acquire_or_fail().await?;
        let result = self.emergency_with(&blocks, expects_reply(commands), &mut transport).await;
        self.release(transport);

        self.settle(result)
    }

    async fn connect_with(&mut self, transport: &mut T) -> Result<Frame, Error> {
        let frame = self.session.send_connection_request(transport).await?;
        self.machine.transition(Event::ConnectionEstablished)?;

        if frame.kind() != FrameKind::Acknowledge {
            return Err(Error::UnexpectedFrame {
                expected: FrameKind::Acknowledge,
                received: frame.kind(),
            });
        }

        self.machine.transition(Event::AckReceived)?;
        Ok(frame)
    }

    async fn uplink(
        &mut self,
        blocks: &[Block],
        needs_reply: bool,
        transport: &mut T,
        cycle: bool,
    ) -> Result<Vec<BlockReply>, Error> {
        let mut replies = Vec::with_capacity(blocks.len());

        for (i, block) in blocks.iter().enumerate() {
            let reply = match self.session.send_and_await(block, transport).await {
                Ok(frame) => Self::reply(frame)?,
                Err(Error::NoFrameReceived {
                    read,
                }) if !needs_reply => {
                    tracing::info!(block = i, read, "no reply expected");
                    BlockReply::Silent
                },
                Err(e) => return Err(e),
            };

            if cycle {
                self.machine.transition(Event::UplinkFinished)?;
                self.machine.transition(Event::DownlinkingFinished)?;
            }

            replies.push(reply);
        }

        Ok(replies)
    }

    fn reply(frame: Frame) -> Result<BlockReply, Error> {
        let payload = match &frame.payload {
            Some(payload) => payload,
            None => return Ok(BlockReply::Frame(frame)),
        };

        let response = CommandResponse::unpack(payload)?;
        tracing::info!(%response, "command response");

        Ok(BlockReply::Response(response))
    }

    async fn disconnect_with(&mut self, transport: &mut T) -> Result<(), Error> {
        let frame = self.session.send_control(FrameKind::Disconnect, transport).await?;

        match frame.kind() {
            FrameKind::Disconnect | FrameKind::Acknowledge => {},
            received => {
                return Err(Error::UnexpectedFrame {
                    expected: FrameKind::Disconnect,
                    received,
                })
            },
        }

        self.machine.transition(Event::DisconnectCmdReceived)?;

        self.session.send_only(FrameKind::Acknowledge, transport).await?;
        self.machine.transition(Event::DisconnectComplete)?;

        Ok(())
    }

    async fn emergency_with(
        &mut self,
        blocks: &[Block],
        needs_reply: bool,
        transport: &mut T,
    ) -> Result<Vec<BlockReply>, Error> {
        transport.reset_buffers().await?;
        self.machine.transition(Event::EmergencyInitiated)?;

        self.await_connection(transport).await?;
        self.machine.transition(Event::ConnectionReceived)?;

        self.session.send_only(FrameKind::Acknowledge, transport).await?;
        self.machine.transition(Event::ConnectionAckSent)?;

        let replies = self.uplink(blocks, needs_reply, transport, false).await?;
        self.machine.transition(Event::EmergencyUplinkFinished)?;

        Ok(replies)
    }

    async fn await_connection(&mut self, transport: &mut T) -> Result<Frame, Error> {
        let windows = self.session.config().emergency_listen_windows;

        for window in 0..windows {
            match self.session.await_frame(transport).await {
                Ok(frame) if frame.kind() == FrameKind::ConnectRequest => return Ok(frame),
                Ok(frame) => tracing::debug!(window, %frame, "ignoring frame while awaiting connection"),
                Err(Error::NoFrameReceived {
                    ..
                }) => {},
                Err(e @ Error::Transport(_)) => return Err(e),
                Err(e) if e.is_retryable() => tracing::warn!(window, error = %e, "bad frame while awaiting connection"),
                Err(e) => return Err(e),
            }
        }

        Err(Error::NoFrameReceived {
            read: 0,
        })
    }

    fn require(&self, state: State) -> Result<(), Error> {
        match self.machine.state() {
            s if s == state => Ok(()),
            s => Err(Error::NotReady(s)),
        }
    }

    /// Drive the machine back to `Disconnected` if an operation failed mid-exchange. A machine
    /// already in `ServerSideError` is left there until the next operation heals it.
    fn settle<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        util::trace_catch!(result, state = %self.machine.state(), "link operation failed");

        if result.is_err() {
            match self.machine.state() {
                State::Disconnected | State::ServerSideError => {},
                _ => util::trace_warn!(self.machine.transition(Event::Error), "driving error event"),
            }
        }

        result
    }

    async fn acquire_or_fail(&mut self) -> Result<T, Error> {
        let result = self.acquire().await;
        self.settle(result)
    }

    async fn acquire(&mut self) -> Result<T, Error> {
        if let Some(poller) = self.poller.take() {
            return poller.stop().await;
        }

        self.transport
            .take()
            .ok_or(Error::Transport(TransportError::Unavailable))
    }

    fn release(&mut self, transport: T) {
        match (self.polling, self.session.sink().cloned()) {
            (true, Some(sink)) => self.spawn_poller(transport, sink),
            _ => self.transport = Some(transport),
        }
    }

    fn poll_sink(&self) -> Result<LogSink, Error> {
        self.session.sink().cloned().ok_or_else(|| {
            Error::Transport(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "log polling requires a log sink",
            )))
        })
    }

    fn spawn_poller(&mut self, transport: T, sink: LogSink) {
        let config = self.session.config();

        self.poller = Some(LogPoller::spawn(
            transport,
            Arc::clone(self.session.pipeline()),
            sink,
            config.read_window,
            config.read_timeout,
        ));
    }
}
