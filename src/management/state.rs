//! Composite lifecycle of the management link pair.
//!
//! The sender and receiver attach independently. The instance state is the
//! conjunction of both: it is `Open` only after each side has reported open,
//! and it leaves `Open` as soon as either side regresses.

use crate::amqp::EndpointState;

/// Lifecycle state of a management instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementState {
    /// Not opened, or closed
    Idle,
    /// `open_async` called, waiting for both links
    Opening,
    /// Both links attached
    Open,
    /// `close` in progress
    Closing,
    /// A link failed after the instance was open (terminal)
    Error,
}

/// Which link of the pair reported a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    /// The message sender
    Sender,
    /// The message receiver
    Receiver,
}

/// Result reported to `on_open_complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenResult {
    /// Both links attached
    Ok,
    /// A link failed while attaching
    Error,
    /// `close` was called while attaching
    Cancelled,
}

/// Which sides have reported open during the current open attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPair {
    sender_open: bool,
    receiver_open: bool,
}

impl LinkPair {
    /// Record that `side` reached open; returns true once both have
    fn mark_open(&mut self, side: LinkSide) -> bool {
        match side {
            LinkSide::Sender => self.sender_open = true,
            LinkSide::Receiver => self.receiver_open = true,
        }
        self.sender_open && self.receiver_open
    }

    /// Forget both sides
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check whether `side` has reported open
    #[cfg(test)]
    pub fn is_open(&self, side: LinkSide) -> bool {
        match side {
            LinkSide::Sender => self.sender_open,
            LinkSide::Receiver => self.receiver_open,
        }
    }
}

/// Notification to deliver after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Fire `on_open_complete`
    OpenComplete(OpenResult),
    /// Fire `on_error`
    Error,
}

/// Outcome of feeding one link state change into the composite state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// New composite state
    pub state: ManagementState,
    /// Callback to fire, if any
    pub notification: Option<Notification>,
}

impl Transition {
    fn stay(state: ManagementState) -> Self {
        Self {
            state,
            notification: None,
        }
    }

    fn to(state: ManagementState, notification: Notification) -> Self {
        Self {
            state,
            notification: Some(notification),
        }
    }
}

/// Compute the composite state after `side` moved from `previous` to `new`.
pub fn transition(
    state: ManagementState,
    links: &mut LinkPair,
    side: LinkSide,
    new: EndpointState,
    previous: EndpointState,
) -> Transition {
    if new == previous {
        return Transition::stay(state);
    }

    match state {
        ManagementState::Opening => match new {
            EndpointState::Opening => Transition::stay(state),
            EndpointState::Open => {
                if links.mark_open(side) {
                    Transition::to(
                        ManagementState::Open,
                        Notification::OpenComplete(OpenResult::Ok),
                    )
                } else {
                    Transition::stay(state)
                }
            },
            EndpointState::Idle | EndpointState::Closing | EndpointState::Error => Transition::to(
                ManagementState::Idle,
                Notification::OpenComplete(OpenResult::Error),
            ),
        },
        ManagementState::Open => match new {
            EndpointState::Open => Transition::stay(state),
            EndpointState::Idle
            | EndpointState::Opening
            | EndpointState::Closing
            | EndpointState::Error => Transition::to(ManagementState::Error, Notification::Error),
        },
        ManagementState::Closing => match new {
            EndpointState::Idle | EndpointState::Closing => Transition::stay(state),
            EndpointState::Opening | EndpointState::Open | EndpointState::Error => {
                Transition::to(ManagementState::Error, Notification::Error)
            },
        },
        ManagementState::Idle | ManagementState::Error => Transition::stay(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use EndpointState as E;
    use ManagementState as M;

    fn step(state: M, links: &mut LinkPair, side: LinkSide, new: E, prev: E) -> Transition {
        transition(state, links, side, new, prev)
    }

    #[test]
    fn test_open_requires_both_sides() {
        let mut links = LinkPair::default();

        let t = step(M::Opening, &mut links, LinkSide::Sender, E::Open, E::Opening);
        assert_eq!(t, Transition::stay(M::Opening));
        assert!(links.is_open(LinkSide::Sender));

        let t = step(M::Opening, &mut links, LinkSide::Receiver, E::Open, E::Opening);
        assert_eq!(t.state, M::Open);
        assert_eq!(
            t.notification,
            Some(Notification::OpenComplete(OpenResult::Ok))
        );
    }

    #[test]
    fn test_open_in_reverse_order() {
        let mut links = LinkPair::default();
        let t = step(M::Opening, &mut links, LinkSide::Receiver, E::Open, E::Idle);
        assert_eq!(t.state, M::Opening);
        let t = step(M::Opening, &mut links, LinkSide::Sender, E::Open, E::Idle);
        assert_eq!(t.state, M::Open);
    }

    #[test]
    fn test_same_side_twice_does_not_open() {
        let mut links = LinkPair::default();
        step(M::Opening, &mut links, LinkSide::Sender, E::Open, E::Opening);
        let t = step(M::Opening, &mut links, LinkSide::Sender, E::Open, E::Closing);
        assert_eq!(t, Transition::stay(M::Opening));
    }

    #[test]
    fn test_opening_failures() {
        for new in [E::Idle, E::Closing, E::Error] {
            for side in [LinkSide::Sender, LinkSide::Receiver] {
                let mut links = LinkPair::default();
                let t = step(M::Opening, &mut links, side, new, E::Opening);
                assert_eq!(t.state, M::Idle);
                assert_eq!(
                    t.notification,
                    Some(Notification::OpenComplete(OpenResult::Error))
                );
            }
        }
    }

    #[test]
    fn test_opening_to_opening_is_ignored() {
        let mut links = LinkPair::default();
        let t = step(M::Opening, &mut links, LinkSide::Receiver, E::Opening, E::Idle);
        assert_eq!(t, Transition::stay(M::Opening));
    }

    #[test]
    fn test_unchanged_state_is_ignored() {
        let mut links = LinkPair::default();
        let t = step(M::Open, &mut links, LinkSide::Sender, E::Error, E::Error);
        assert_eq!(t, Transition::stay(M::Open));
    }

    #[test]
    fn test_regression_from_open_is_error() {
        for new in [E::Idle, E::Opening, E::Closing, E::Error] {
            let mut links = LinkPair::default();
            let t = step(M::Open, &mut links, LinkSide::Receiver, new, E::Open);
            assert_eq!(t.state, M::Error);
            assert_eq!(t.notification, Some(Notification::Error));
        }
    }

    #[test]
    fn test_closing_transitions() {
        let mut links = LinkPair::default();
        for new in [E::Idle, E::Closing] {
            let t = step(M::Closing, &mut links, LinkSide::Sender, new, E::Open);
            assert_eq!(t, Transition::stay(M::Closing));
        }
        for new in [E::Opening, E::Open, E::Error] {
            let t = step(M::Closing, &mut links, LinkSide::Sender, new, E::Closing);
            assert_eq!(t.state, M::Error);
            assert_eq!(t.notification, Some(Notification::Error));
        }
    }

    #[test]
    fn test_error_and_idle_are_inert() {
        let mut links = LinkPair::default();
        for state in [M::Error, M::Idle] {
            for new in [E::Idle, E::Opening, E::Open, E::Closing, E::Error] {
                let t = step(state, &mut links, LinkSide::Sender, new, E::Open);
                assert_eq!(t, Transition::stay(state));
            }
        }
    }
}
