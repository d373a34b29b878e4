/// The lifecycle state of a `RequestEngine`.
/// Loosely follows net/base/load_states.h, collapsed to the states a
/// redirect-following request actually passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Constructed, `send()` not called yet.
    #[default]
    Idle,

    /// A hop is being issued to the transport.
    Sending,

    /// Waiting for the transport to deliver the response.
    AwaitingResponse,

    /// A redirect was accepted; the next hop is being prepared.
    Redirecting,

    /// Decoding and assembling the final response.
    Finalizing,

    /// The request produced a final response.
    Completed,

    /// The request failed.
    Errored,

    /// The request was cancelled by the caller.
    Aborted,
}

impl LoadState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Completed | LoadState::Errored | LoadState::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Errored) | (_, Aborted) => true,
            (Idle, Sending) => true,
            (Sending, AwaitingResponse) => true,
            (AwaitingResponse, Redirecting) | (AwaitingResponse, Finalizing) => true,
            (Redirecting, Sending) => true,
            // A vetoed redirect finalizes the response that carried it.
            (Redirecting, Finalizing) => true,
            (Finalizing, Completed) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_sealed() {
        for terminal in [LoadState::Completed, LoadState::Errored, LoadState::Aborted] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(LoadState::Sending));
            assert!(!terminal.can_transition_to(LoadState::Aborted));
        }
    }

    #[test]
    fn test_redirect_loop_transitions() {
        assert!(LoadState::Idle.can_transition_to(LoadState::Sending));
        assert!(LoadState::AwaitingResponse.can_transition_to(LoadState::Redirecting));
        assert!(LoadState::Redirecting.can_transition_to(LoadState::Sending));
        assert!(!LoadState::Idle.can_transition_to(LoadState::Completed));
    }
}
