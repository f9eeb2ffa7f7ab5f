use crate::Error;

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, derive_more::Display)]
#[repr(u8)]
pub enum State {
    Disconnected,
    AttemptingConnection,
    AwaitingAck,
    Uplinking,
    Downlinking,
    AwaitingDisconnect,
    SendDisconnectAck,
    EnteringEmergency,
    AwaitingConnection,
    SendConnectionAck,
    EmergencyUplink,
    ServerSideError,
}

impl State {
    pub const ALL: [State; 12] = [
        State::Disconnected,
        State::AttemptingConnection,
        State::AwaitingAck,
        State::Uplinking,
        State::Downlinking,
        State::AwaitingDisconnect,
        State::SendDisconnectAck,
        State::EnteringEmergency,
        State::AwaitingConnection,
        State::SendConnectionAck,
        State::EmergencyUplink,
        State::ServerSideError,
    ];
}

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, derive_more::Display)]
#[repr(u8)]
pub enum Event {
    BeginUplink,
    ConnectionEstablished,
    AckReceived,
    UplinkFinished,
    DownlinkingFinished,
    Disconnecting,
    DisconnectCmdReceived,
    DisconnectComplete,
    EnterEmergency,
    EmergencyInitiated,
    ConnectionReceived,
    ConnectionAckSent,
    EmergencyUplinkFinished,
    Error,
}

impl Event {
    pub const ALL: [Event; 14] = [
        Event::BeginUplink,
        Event::ConnectionEstablished,
        Event::AckReceived,
        Event::UplinkFinished,
        Event::DownlinkingFinished,
        Event::Disconnecting,
        Event::DisconnectCmdReceived,
        Event::DisconnectComplete,
        Event::EnterEmergency,
        Event::EmergencyInitiated,
        Event::ConnectionReceived,
        Event::ConnectionAckSent,
        Event::EmergencyUplinkFinished,
        Event::Error,
    ];
}

/// Total transition function. Any pair not listed lands in [`State::ServerSideError`], which
/// itself leaves for [`State::Disconnected`] on the next event, whatever it is.
pub fn next_state(state: State, event: Event) -> State {
    match (state, event) {
        (State::ServerSideError, _) => State::Disconnected,

        (State::Disconnected, Event::BeginUplink) => State::AttemptingConnection,
        (State::Disconnected, Event::EnterEmergency) => State::EnteringEmergency,

        (State::AttemptingConnection, Event::ConnectionEstablished) => State::AwaitingAck,
        (State::AwaitingAck, Event::AckReceived) => State::Uplinking,

        (State::Uplinking, Event::UplinkFinished) => State::Downlinking,
        (State::Uplinking, Event::Disconnecting) => State::AwaitingDisconnect,
        (State::Downlinking, Event::DownlinkingFinished) => State::Uplinking,

        (State::AwaitingDisconnect, Event::DisconnectCmdReceived) => State::SendDisconnectAck,
        (State::SendDisconnectAck, Event::DisconnectComplete) => State::Disconnected,

        (State::EnteringEmergency, Event::EmergencyInitiated) => State::AwaitingConnection,
        (State::AwaitingConnection, Event::ConnectionReceived) => State::SendConnectionAck,
        (State::SendConnectionAck, Event::ConnectionAckSent) => State::EmergencyUplink,
        (State::EmergencyUplink, Event::EmergencyUplinkFinished) => State::Disconnected,

        (State::Disconnected, Event::Error) => State::ServerSideError,
        (_, Event::Error) => State::Disconnected,

        _ => State::ServerSideError,
    }
}

#[derive(Debug)]
pub struct LinkStateMachine {
    state: State,
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self {
            state: State::Disconnected,
        }
    }
}

impl LinkStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    /// Apply `event`. Landing in [`State::ServerSideError`] is reported as an error, but the
    /// machine is still moved there.
    #[tracing::instrument(skip_all, fields(state = %self.state, event = %event))]
    pub fn transition(&mut self, event: Event) -> Result<State, Error> {
        tracing::debug!("state machine event");
        let init_state = self.state;

        if init_state == State::ServerSideError {
            tracing::warn!("leaving server-side error state");
        }

        let new_state = next_state(init_state, event);
        self.state = new_state;

        if new_state == State::ServerSideError {
            tracing::error!("invalid state transition");

            return Err(Error::InvalidStateTransition {
                state: init_state,
                event,
            });
        }

        tracing::info!(%new_state, "state machine transition");
        Ok(new_state)
    }

    /// Heal out of [`State::ServerSideError`] if the last operation left the machine there.
    pub fn recover(&mut self) {
        if self.state == State::ServerSideError {
            self.state = next_state(self.state, Event::Error);
            tracing::info!(new_state = %self.state, "recovered from server-side error");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(events: &[Event]) -> State {
        events.iter().fold(State::Disconnected, |state, &event| next_state(state, event))
    }

    #[test]
    fn nominal_pass() {
        let state = run(&[
            Event::BeginUplink,
            Event::ConnectionEstablished,
            Event::AckReceived,
            Event::UplinkFinished,
            Event::DownlinkingFinished,
            Event::UplinkFinished,
            Event::DownlinkingFinished,
        ]);
        assert_eq!(state, State::Uplinking);

        let state = [Event::Disconnecting, Event::DisconnectCmdReceived, Event::DisconnectComplete]
            .iter()
            .fold(state, |s, &e| next_state(s, e));
        assert_eq!(state, State::Disconnected);
    }

    #[test]
    fn emergency_pass() {
        let state = run(&[
            Event::EnterEmergency,
            Event::EmergencyInitiated,
            Event::ConnectionReceived,
            Event::ConnectionAckSent,
        ]);
        assert_eq!(state, State::EmergencyUplink);
        assert_eq!(next_state(state, Event::EmergencyUplinkFinished), State::Disconnected);
    }

    #[test]
    fn total_over_all_pairs() {
        let mut valid = 0;

        for &state in State::ALL.iter() {
            for &event in Event::ALL.iter() {
                let next = next_state(state, event);

                if state == State::ServerSideError {
                    assert_eq!(next, State::Disconnected);
                } else if event == Event::Error {
                    let expected = match state {
                        State::Disconnected => State::ServerSideError,
                        _ => State::Disconnected,
                    };
                    assert_eq!(next, expected, "{} on {}", state, event);
                }

                if next != State::ServerSideError {
                    valid += 1;
                }
            }
        }

        // 13 listed transitions, 10 error exits and 14 recoveries
        assert_eq!(valid, 13 + 10 + 14);
    }

    #[test]
    fn uplink_before_ack_is_rejected() {
        let mut machine = LinkStateMachine::new();
        machine.transition(Event::BeginUplink).unwrap();

        let err = machine.transition(Event::UplinkFinished).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                state: State::AttemptingConnection,
                event: Event::UplinkFinished,
            }
        ));
        assert_eq!(machine.state(), State::ServerSideError);

        assert_eq!(machine.transition(Event::BeginUplink).unwrap(), State::Disconnected);
    }

    #[test]
    fn recover_only_from_error() {
        let mut machine = LinkStateMachine::new();
        machine.recover();
        assert_eq!(machine.state(), State::Disconnected);

        assert!(machine.transition(Event::Error).is_err());
        machine.recover();
        assert_eq!(machine.state(), State::Disconnected);
    }
}
