//! Connection request state machine
//!
//! A pair of accounts is always in exactly one of four states when seen from
//! one of them (the actor): nothing, actor sent a request, actor received a
//! request, or connected. Each account stores its own side of the pair; the
//! two sides must mirror each other. [`PairState::from_sides`] refuses to
//! interpret a pair whose sides disagree.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::account::Relation;
use crate::error::StoreError;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("You cannot send request to yourself")]
    SelfRequest,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Request already sent")]
    DuplicateRequest,

    #[error("This user already sent you a request")]
    ReverseRequestExists,

    #[error("No pending request found")]
    NoSuchRequest,

    #[error("User not found: {0}")]
    AccountNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The two sides of a pair contradict each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorMismatch {
    pub forward: Option<Relation>,
    pub backward: Option<Relation>,
}

impl std::fmt::Display for MirrorMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = |r: Option<Relation>| r.map(|r| r.as_str()).unwrap_or("none");
        write!(
            f,
            "actor side is '{}' but other side is '{}'",
            side(self.forward),
            side(self.backward)
        )
    }
}

/// State of a pair as seen from the actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    None,
    /// Actor has a pending request out to the other account
    Sent,
    /// Other account has a pending request out to the actor
    Received,
    Connected,
}

impl PairState {
    /// Combine the actor's side (`forward`) and the other account's side
    /// (`backward`) into one state.
    pub fn from_sides(
        forward: Option<Relation>,
        backward: Option<Relation>,
    ) -> Result<Self, MirrorMismatch> {
        match (forward, backward) {
            (None, None) => Ok(PairState::None),
            (Some(f), Some(b)) if b == f.mirror() => Ok(match f {
                Relation::Sent => PairState::Sent,
                Relation::Received => PairState::Received,
                Relation::Connected => PairState::Connected,
            }),
            _ => Err(MirrorMismatch { forward, backward }),
        }
    }

    /// Relations to persist on the actor's side and on the other side
    pub fn sides(self) -> (Option<Relation>, Option<Relation>) {
        match self {
            PairState::None => (None, None),
            PairState::Sent => (Some(Relation::Sent), Some(Relation::Received)),
            PairState::Received => (Some(Relation::Received), Some(Relation::Sent)),
            PairState::Connected => (Some(Relation::Connected), Some(Relation::Connected)),
        }
    }

    /// Same pair seen from the other account
    pub fn reversed(self) -> Self {
        match self {
            PairState::Sent => PairState::Received,
            PairState::Received => PairState::Sent,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOp {
    /// Actor proposes a connection to the other account
    Send,
    /// Actor accepts the other account's pending request
    Accept,
    /// Actor declines the other account's pending request
    Reject,
    /// Actor withdraws its own pending request
    Cancel,
}

impl ConnectionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionOp::Send => "send",
            ConnectionOp::Accept => "accept",
            ConnectionOp::Reject => "reject",
            ConnectionOp::Cancel => "cancel",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            ConnectionOp::Send => "Connection request sent",
            ConnectionOp::Accept => "Connection accepted",
            ConnectionOp::Reject => "Request rejected",
            ConnectionOp::Cancel => "Request cancelled",
        }
    }
}

/// Next state of the pair, or the reason the operation is refused.
///
/// Accept, reject and cancel are not idempotent: once the pending entry is
/// gone a repeated call fails with `NoSuchRequest`.
pub fn transition(op: ConnectionOp, state: PairState) -> Result<PairState, ConnectionError> {
    match (op, state) {
        (ConnectionOp::Send, PairState::None) => Ok(PairState::Sent),
        (ConnectionOp::Send, PairState::Connected) => Err(ConnectionError::AlreadyConnected),
        (ConnectionOp::Send, PairState::Sent) => Err(ConnectionError::DuplicateRequest),
        (ConnectionOp::Send, PairState::Received) => Err(ConnectionError::ReverseRequestExists),

        (ConnectionOp::Accept, PairState::Received) => Ok(PairState::Connected),
        (ConnectionOp::Reject, PairState::Received) => Ok(PairState::None),
        (ConnectionOp::Cancel, PairState::Sent) => Ok(PairState::None),

        (ConnectionOp::Accept | ConnectionOp::Reject | ConnectionOp::Cancel, _) => {
            Err(ConnectionError::NoSuchRequest)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[serde(rename = "self")]
    OwnProfile,
    Connected,
    RequestSent,
    RequestReceived,
    NotConnected,
}

impl ConnectionStatus {
    pub fn message(&self) -> &'static str {
        match self {
            ConnectionStatus::OwnProfile => "This is your own profile",
            ConnectionStatus::Connected => "You are connected with this user",
            ConnectionStatus::RequestSent => "Connection request sent - pending",
            ConnectionStatus::RequestReceived => "You have a connection request from this user",
            ConnectionStatus::NotConnected => "Not connected",
        }
    }
}

impl From<PairState> for ConnectionStatus {
    fn from(state: PairState) -> Self {
        match state {
            PairState::None => ConnectionStatus::NotConnected,
            PairState::Sent => ConnectionStatus::RequestSent,
            PairState::Received => ConnectionStatus::RequestReceived,
            PairState::Connected => ConnectionStatus::Connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: ConnectionStatus,
    pub message: String,
    pub can_send_request: bool,
}

impl StatusView {
    pub fn own_profile() -> Self {
        Self::from_status(ConnectionStatus::OwnProfile)
    }

    fn from_status(status: ConnectionStatus) -> Self {
        Self {
            status,
            message: status.message().to_string(),
            can_send_request: status == ConnectionStatus::NotConnected,
        }
    }
}

impl From<PairState> for StatusView {
    fn from(state: PairState) -> Self {
        Self::from_status(state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_from_none() {
        assert_eq!(
            transition(ConnectionOp::Send, PairState::None).unwrap(),
            PairState::Sent
        );
    }

    #[test]
    fn test_send_refusals() {
        assert!(matches!(
            transition(ConnectionOp::Send, PairState::Connected),
            Err(ConnectionError::AlreadyConnected)
        ));
        assert!(matches!(
            transition(ConnectionOp::Send, PairState::Sent),
            Err(ConnectionError::DuplicateRequest)
        ));
        assert!(matches!(
            transition(ConnectionOp::Send, PairState::Received),
            Err(ConnectionError::ReverseRequestExists)
        ));
    }

    #[test]
    fn test_accept_reject_cancel_require_pending() {
        assert_eq!(
            transition(ConnectionOp::Accept, PairState::Received).unwrap(),
            PairState::Connected
        );
        assert_eq!(
            transition(ConnectionOp::Reject, PairState::Received).unwrap(),
            PairState::None
        );
        assert_eq!(
            transition(ConnectionOp::Cancel, PairState::Sent).unwrap(),
            PairState::None
        );

        // Cancel is for the sender, accept/reject for the receiver
        assert!(matches!(
            transition(ConnectionOp::Cancel, PairState::Received),
            Err(ConnectionError::NoSuchRequest)
        ));
        assert!(matches!(
            transition(ConnectionOp::Accept, PairState::Sent),
            Err(ConnectionError::NoSuchRequest)
        ));
        assert!(matches!(
            transition(ConnectionOp::Accept, PairState::Connected),
            Err(ConnectionError::NoSuchRequest)
        ));
        assert!(matches!(
            transition(ConnectionOp::Reject, PairState::None),
            Err(ConnectionError::NoSuchRequest)
        ));
    }

    #[test]
    fn test_sides_round_trip_through_from_sides() {
        for state in [
            PairState::None,
            PairState::Sent,
            PairState::Received,
            PairState::Connected,
        ] {
            let (forward, backward) = state.sides();
            assert_eq!(PairState::from_sides(forward, backward).unwrap(), state);
            assert_eq!(
                PairState::from_sides(backward, forward).unwrap(),
                state.reversed()
            );
        }
    }

    #[test]
    fn test_half_written_pair_is_a_mismatch() {
        let err = PairState::from_sides(Some(Relation::Sent), None).unwrap_err();
        assert_eq!(err.forward, Some(Relation::Sent));
        assert_eq!(err.backward, None);

        assert!(PairState::from_sides(Some(Relation::Connected), Some(Relation::Received)).is_err());
        assert!(PairState::from_sides(Some(Relation::Sent), Some(Relation::Sent)).is_err());
    }

    #[test]
    fn test_status_view_only_allows_send_when_unconnected() {
        let view: StatusView = PairState::None.into();
        assert!(view.can_send_request);
        assert_eq!(view.message, "Not connected");

        for state in [PairState::Sent, PairState::Received, PairState::Connected] {
            let view: StatusView = state.into();
            assert!(!view.can_send_request);
        }

        assert!(!StatusView::own_profile().can_send_request);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(StatusView::own_profile()).unwrap();
        assert_eq!(json["status"], "self");
        assert_eq!(json["canSendRequest"], false);

        let json = serde_json::to_value(StatusView::from(PairState::Received)).unwrap();
        assert_eq!(json["status"], "request_received");
    }
}
