use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`Server`](super::Server).
///
/// States only move forward: `Created -> Registered -> PluginsInitialized -> Serving ->
/// Closing -> Closed`. Closing may start from any earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ServerState {
    Created = 0,
    Registered = 1,
    PluginsInitialized = 2,
    Serving = 3,
    Closing = 4,
    Closed = 5,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ServerState::Created,
            1 => ServerState::Registered,
            2 => ServerState::PluginsInitialized,
            3 => ServerState::Serving,
            4 => ServerState::Closing,
            _ => ServerState::Closed,
        }
    }

    pub fn is_closing(self) -> bool {
        self >= ServerState::Closing
    }
}

#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ServerState::Created as u8))
    }

    pub(crate) fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move from any state in `from` to `to`. Returns the previous state on success.
    pub(crate) fn transition(&self, from: &[ServerState], to: ServerState) -> Result<ServerState, ServerState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&ServerState::from_u8(current))
                    .then_some(to as u8)
            })
            .map(ServerState::from_u8)
            .map_err(ServerState::from_u8)
    }

    /// Move forward to `to` unless the server is already closing.
    pub(crate) fn advance(&self, to: ServerState) -> Result<ServerState, ServerState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let current = ServerState::from_u8(current);
                (!current.is_closing()).then_some(to.max(current) as u8)
            })
            .map(ServerState::from_u8)
            .map_err(ServerState::from_u8)
    }

    /// Enter `Closing`. Only the first caller wins.
    pub(crate) fn begin_close(&self) -> bool {
        self.transition(
            &[
                ServerState::Created,
                ServerState::Registered,
                ServerState::PluginsInitialized,
                ServerState::Serving,
            ],
            ServerState::Closing,
        )
        .is_ok()
    }

    pub(crate) fn set(&self, state: ServerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
