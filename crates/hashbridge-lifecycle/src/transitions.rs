//! Pure state-machine edges.
//!
//! `apply_transition` is the single source of truth for which
//! `(OrderStatus, LifecycleEvent) -> OrderStatus` moves are legal. Nothing
//! here touches the store — `LifecycleManager` wraps this with the
//! per-order serialization and the actual store mutation.

use hashbridge_core::error::RelayError;
use hashbridge_core::order::OrderStatus;

/// Events that drive an order's state machine: the core transition
/// diagram plus the "any state with an active escrow" timeout branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Submit,
    Cancel,
    /// An auction bid was accepted — the resolver has committed liquidity.
    Fill,
    /// A chain client observed an on-chain HTLC creation tx for this order,
    /// ahead of the escrow record being indexed. Gives partial-fill flows
    /// — multiple `secret_hashes` — a place to land before the first full
    /// escrow is observed.
    HtlcObserved,
    FirstEscrowObserved,
    SecondEscrowObserved,
    SecretRevealedOnChain,
    ClaimSucceededOnOppositeChain,
    TimelockExpiredNoClaim,
    AllEscrowsRefunded,
}

/// Return the next status for `(current, event)`, or an error if the edge
/// does not exist — every observed transition must be one of the declared
/// edges; an attempt like pending -> completed is rejected.
pub fn apply_transition(
    current: OrderStatus,
    event: LifecycleEvent,
) -> Result<OrderStatus, RelayError> {
    use LifecycleEvent::*;
    use OrderStatus::*;

    let next = match (current, event) {
        (Pending, Submit) => AuctionActive,
        (AuctionActive, Cancel) => Cancelled,
        (AuctionActive, Fill) => Filled,
        (Filled, HtlcObserved) => HtlcCreated,
        (Filled, FirstEscrowObserved) => EscrowCreated,
        (HtlcCreated, FirstEscrowObserved) => EscrowCreated,
        (EscrowCreated, SecondEscrowObserved) => BothEscrowed,
        (BothEscrowed, SecretRevealedOnChain) => SecretRevealed,
        // Idempotent double-reveal: already past secret_revealed, a second
        // reveal for the opposite chain is a no-op that keeps the current
        // status.
        (SecretRevealed, SecretRevealedOnChain) => SecretRevealed,
        (Completed, SecretRevealedOnChain) => Completed,
        (SecretRevealed, ClaimSucceededOnOppositeChain) => Completed,
        // Any state with an active on-chain escrow may time out.
        (Filled, TimelockExpiredNoClaim)
        | (HtlcCreated, TimelockExpiredNoClaim)
        | (EscrowCreated, TimelockExpiredNoClaim)
        | (BothEscrowed, TimelockExpiredNoClaim)
        | (SecretRevealed, TimelockExpiredNoClaim) => Expired,
        (Expired, AllEscrowsRefunded) => Refunded,
        (from, attempted) => {
            return Err(RelayError::IllegalTransition {
                from: from.to_string(),
                attempted: format!("{attempted:?}"),
            })
        }
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges_are_legal() {
        let mut status = OrderStatus::Pending;
        for event in [
            LifecycleEvent::Submit,
            LifecycleEvent::Fill,
            LifecycleEvent::FirstEscrowObserved,
            LifecycleEvent::SecondEscrowObserved,
            LifecycleEvent::SecretRevealedOnChain,
            LifecycleEvent::ClaimSucceededOnOppositeChain,
        ] {
            status = apply_transition(status, event).unwrap();
        }
        assert_eq!(status, OrderStatus::Completed);
    }

    #[test]
    fn pending_to_completed_is_illegal() {
        let result = apply_transition(
            OrderStatus::Pending,
            LifecycleEvent::ClaimSucceededOnOppositeChain,
        );
        assert!(matches!(result, Err(RelayError::IllegalTransition { .. })));
    }

    #[test]
    fn double_reveal_is_idempotent() {
        let once =
            apply_transition(OrderStatus::BothEscrowed, LifecycleEvent::SecretRevealedOnChain)
                .unwrap();
        assert_eq!(once, OrderStatus::SecretRevealed);
        let twice =
            apply_transition(once, LifecycleEvent::SecretRevealedOnChain).unwrap();
        assert_eq!(twice, OrderStatus::SecretRevealed);
    }

    #[test]
    fn timeout_reachable_from_every_escrowed_state() {
        for status in [
            OrderStatus::Filled,
            OrderStatus::HtlcCreated,
            OrderStatus::EscrowCreated,
            OrderStatus::BothEscrowed,
            OrderStatus::SecretRevealed,
        ] {
            assert_eq!(
                apply_transition(status, LifecycleEvent::TimelockExpiredNoClaim).unwrap(),
                OrderStatus::Expired
            );
        }
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(apply_transition(status, LifecycleEvent::Submit).is_err());
        }
    }
}
