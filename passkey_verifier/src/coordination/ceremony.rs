use std::fmt;

use crate::passkey::{CeremonyKind, PasskeyError};

/// States a ceremony passes through. Any failure moves straight to `Rejected`.
///
/// Registration: `Requested → ChallengeIssued → EnvelopeBound → CredentialExtracted
/// → Stored → Verified`.
///
/// Authentication: `Requested → ChallengeIssued → EnvelopeBound → CredentialLocated
/// → CounterUpdated → Verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Requested,
    ChallengeIssued,
    EnvelopeBound,
    CredentialExtracted,
    Stored,
    CredentialLocated,
    CounterUpdated,
    Verified,
    Rejected,
}

impl CeremonyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::ChallengeIssued => "challenge_issued",
            Self::EnvelopeBound => "envelope_bound",
            Self::CredentialExtracted => "credential_extracted",
            Self::Stored => "stored",
            Self::CredentialLocated => "credential_located",
            Self::CounterUpdated => "counter_updated",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Rejected)
    }
}

impl fmt::Display for CeremonyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one pass through a ceremony and emits an event per transition.
#[derive(Debug)]
pub(crate) struct CeremonyTrace {
    kind: CeremonyKind,
    state: CeremonyState,
}

impl CeremonyTrace {
    pub(crate) fn start(kind: CeremonyKind) -> Self {
        tracing::debug!(ceremony = %kind, state = "requested", "Ceremony requested");
        Self {
            kind,
            state: CeremonyState::Requested,
        }
    }

    /// Picks up a ceremony whose challenge was issued by an earlier call.
    pub(crate) fn resume(kind: CeremonyKind) -> Self {
        Self {
            kind,
            state: CeremonyState::ChallengeIssued,
        }
    }

    pub(crate) fn state(&self) -> CeremonyState {
        self.state
    }

    pub(crate) fn advance(&mut self, to: CeremonyState) {
        if self.state.is_terminal() {
            tracing::warn!(
                ceremony = %self.kind,
                from = self.state.as_str(),
                to = to.as_str(),
                "Ignoring transition out of terminal state"
            );
            return;
        }
        tracing::debug!(
            ceremony = %self.kind,
            from = self.state.as_str(),
            to = to.as_str(),
            "Ceremony state transition"
        );
        self.state = to;
    }

    /// Moves to `Rejected` and logs the error with its kind.
    pub(crate) fn reject(&mut self, error: PasskeyError) -> PasskeyError {
        tracing::debug!(
            ceremony = %self.kind,
            from = self.state.as_str(),
            to = "rejected",
            kind = error.kind(),
            "Ceremony state transition"
        );
        self.state = CeremonyState::Rejected;
        error.log()
    }
}
