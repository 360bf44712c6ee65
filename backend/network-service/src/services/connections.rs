//! Connection Graph Manager
//!
//! Drives the pair state machine in `domain::connection` against the account
//! store. Every mutation is a single store call that updates both accounts as
//! one unit; the store re-reads and validates the pair inside that unit, so
//! two racing requests cannot both apply.

use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{AccountSummary, ConnectionError, ConnectionOp, Relation, StatusView};
use crate::error::StoreError;
use crate::metrics::CONNECTION_TRANSITIONS_TOTAL;
use crate::repository::AccountStore;

fn outcome_label(err: &ConnectionError) -> &'static str {
    match err {
        ConnectionError::SelfRequest => "self_request",
        ConnectionError::AlreadyConnected => "already_connected",
        ConnectionError::DuplicateRequest => "duplicate_request",
        ConnectionError::ReverseRequestExists => "reverse_request_exists",
        ConnectionError::NoSuchRequest => "no_such_request",
        ConnectionError::AccountNotFound(_) => "account_not_found",
        ConnectionError::Store(StoreError::Integrity(_)) => "integrity_violation",
        ConnectionError::Store(_) => "store_error",
    }
}

#[derive(Clone)]
pub struct ConnectionService {
    accounts: Arc<dyn AccountStore>,
}

impl ConnectionService {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    async fn apply(
        &self,
        actor: Uuid,
        other: Uuid,
        op: ConnectionOp,
    ) -> Result<&'static str, ConnectionError> {
        let result = if actor == other {
            // A pair with oneself never exists, so only a send is a distinct error
            Err(match op {
                ConnectionOp::Send => ConnectionError::SelfRequest,
                _ => ConnectionError::NoSuchRequest,
            })
        } else {
            self.accounts.apply_transition(actor, other, op).await
        };

        match result {
            Ok(state) => {
                CONNECTION_TRANSITIONS_TOTAL
                    .with_label_values(&[op.as_str(), "ok"])
                    .inc();
                info!(
                    actor = %actor,
                    other = %other,
                    op = op.as_str(),
                    state = ?state,
                    "Connection state changed"
                );
                Ok(op.success_message())
            }
            Err(err) => {
                let outcome = outcome_label(&err);
                CONNECTION_TRANSITIONS_TOTAL
                    .with_label_values(&[op.as_str(), outcome])
                    .inc();
                match &err {
                    ConnectionError::Store(StoreError::Integrity(detail)) => error!(
                        actor = %actor,
                        other = %other,
                        op = op.as_str(),
                        detail = %detail,
                        "Connection operation aborted: relation sets out of sync"
                    ),
                    ConnectionError::Store(e) => warn!(
                        actor = %actor,
                        other = %other,
                        op = op.as_str(),
                        error = %e,
                        "Connection operation failed"
                    ),
                    _ => info!(
                        actor = %actor,
                        other = %other,
                        op = op.as_str(),
                        outcome,
                        "Connection operation refused"
                    ),
                }
                Err(err)
            }
        }
    }

    /// `from` proposes a connection to `to`
    pub async fn send_request(&self, from: Uuid, to: Uuid) -> Result<&'static str, ConnectionError> {
        self.apply(from, to, ConnectionOp::Send).await
    }

    /// `receiver` accepts the pending request from `sender`
    pub async fn accept_request(
        &self,
        receiver: Uuid,
        sender: Uuid,
    ) -> Result<&'static str, ConnectionError> {
        self.apply(receiver, sender, ConnectionOp::Accept).await
    }

    /// `receiver` declines the pending request from `sender`
    pub async fn reject_request(
        &self,
        receiver: Uuid,
        sender: Uuid,
    ) -> Result<&'static str, ConnectionError> {
        self.apply(receiver, sender, ConnectionOp::Reject).await
    }

    /// `sender` withdraws its pending request to `receiver`
    pub async fn cancel_request(
        &self,
        sender: Uuid,
        receiver: Uuid,
    ) -> Result<&'static str, ConnectionError> {
        self.apply(sender, receiver, ConnectionOp::Cancel).await
    }

    pub async fn status(&self, viewer: Uuid, other: Uuid) -> Result<StatusView, ConnectionError> {
        if viewer == other {
            return Ok(StatusView::own_profile());
        }
        let state = self.accounts.pair_state(viewer, other).await?;
        Ok(state.into())
    }

    async fn related(&self, viewer: Uuid, relation: Relation, list: &'static str) -> Vec<AccountSummary> {
        match self.accounts.list_related(viewer, relation).await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(viewer = %viewer, list, error = %e, "Connection list degraded to empty");
                Vec::new()
            }
        }
    }

    /// Accounts with a pending request to the viewer
    pub async fn incoming(&self, viewer: Uuid) -> Vec<AccountSummary> {
        self.related(viewer, Relation::Received, "incoming").await
    }

    /// Accounts the viewer has a pending request to
    pub async fn outgoing(&self, viewer: Uuid) -> Vec<AccountSummary> {
        self.related(viewer, Relation::Sent, "outgoing").await
    }

    pub async fn connections(&self, viewer: Uuid) -> Vec<AccountSummary> {
        self.related(viewer, Relation::Connected, "connections").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, ConnectionStatus, PairState, Visibility};
    use crate::repository::{InMemoryStore, MockAccountStore};

    async fn two_accounts() -> (ConnectionService, Uuid, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let a = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let b = Account::new("Ben", "ben@campus.edu", Visibility::Private);
        store.upsert_account(&a).await.unwrap();
        store.upsert_account(&b).await.unwrap();
        (ConnectionService::new(store), a.id, b.id)
    }

    async fn status_of(service: &ConnectionService, viewer: Uuid, other: Uuid) -> ConnectionStatus {
        service.status(viewer, other).await.unwrap().status
    }

    #[tokio::test]
    async fn test_send_then_statuses_mirror() {
        let (service, a, b) = two_accounts().await;

        assert_eq!(service.send_request(a, b).await.unwrap(), "Connection request sent");
        assert_eq!(status_of(&service, a, b).await, ConnectionStatus::RequestSent);
        assert_eq!(status_of(&service, b, a).await, ConnectionStatus::RequestReceived);
    }

    #[tokio::test]
    async fn test_reverse_send_refused() {
        let (service, a, b) = two_accounts().await;
        service.send_request(a, b).await.unwrap();

        let err = service.send_request(b, a).await.unwrap_err();
        assert!(matches!(err, ConnectionError::ReverseRequestExists));
        assert_eq!(service.outgoing(b).await.len(), 0);
        assert_eq!(service.incoming(b).await.len(), 1);
    }

    #[tokio::test]
    async fn test_accept_is_not_idempotent() {
        let (service, a, b) = two_accounts().await;
        service.send_request(a, b).await.unwrap();

        assert_eq!(service.accept_request(b, a).await.unwrap(), "Connection accepted");
        assert_eq!(status_of(&service, a, b).await, ConnectionStatus::Connected);
        assert_eq!(status_of(&service, b, a).await, ConnectionStatus::Connected);

        let err = service.accept_request(b, a).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NoSuchRequest));

        let err = service.send_request(a, b).await.unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyConnected));
    }

    #[tokio::test]
    async fn test_cancel_restores_initial_state() {
        let (service, a, b) = two_accounts().await;
        service.send_request(a, b).await.unwrap();
        service.cancel_request(a, b).await.unwrap();

        let view = service.status(a, b).await.unwrap();
        assert_eq!(view.status, ConnectionStatus::NotConnected);
        assert!(view.can_send_request);
        assert!(service.incoming(b).await.is_empty());
        assert!(service.outgoing(a).await.is_empty());
    }

    #[tokio::test]
    async fn test_reject_by_receiver_only() {
        let (service, a, b) = two_accounts().await;
        service.send_request(a, b).await.unwrap();

        // The sender cannot reject its own request
        assert!(matches!(
            service.reject_request(a, b).await,
            Err(ConnectionError::NoSuchRequest)
        ));
        assert_eq!(service.reject_request(b, a).await.unwrap(), "Request rejected");
        assert!(service.connections(a).await.is_empty());
    }

    #[tokio::test]
    async fn test_self_operations() {
        let (service, a, _) = two_accounts().await;

        assert!(matches!(
            service.send_request(a, a).await,
            Err(ConnectionError::SelfRequest)
        ));
        assert!(matches!(
            service.accept_request(a, a).await,
            Err(ConnectionError::NoSuchRequest)
        ));
        assert_eq!(status_of(&service, a, a).await, ConnectionStatus::OwnProfile);
    }

    #[tokio::test]
    async fn test_lists_degrade_when_store_unavailable() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_list_related()
            .returning(|_, _| Err(StoreError::Unavailable("connection refused".into())));

        let service = ConnectionService::new(Arc::new(accounts));
        assert!(service.incoming(Uuid::new_v4()).await.is_empty());
        assert!(service.connections(Uuid::new_v4()).await.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_surfaces_store_failure() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_apply_transition()
            .returning(|_, _, _| Err(StoreError::Unavailable("connection refused".into()).into()));

        let service = ConnectionService::new(Arc::new(accounts));
        let err = service
            .send_request(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Store(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_status_reports_pair_state() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_pair_state()
            .returning(|_, _| Ok(PairState::Received));

        let service = ConnectionService::new(Arc::new(accounts));
        let view = service.status(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(view.status, ConnectionStatus::RequestReceived);
        assert!(!view.can_send_request);
    }
}
