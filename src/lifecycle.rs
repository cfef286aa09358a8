//! The booking state machine. Every status change in the store goes through
//! `can_transition`; the store's compare-and-set enforces it atomically.
//!
//! ```text
//! REQUESTED -> BROADCASTED        dispatcher fans out
//! BROADCASTED -> ACCEPTED         a driver wins the race
//! BROADCASTED -> CANCELLED        user or admin cancels before any accept
//! ACCEPTED -> IN_PROGRESS         driver starts the trip
//! ACCEPTED -> CANCELLED           user, driver, or admin cancels before start
//! IN_PROGRESS -> COMPLETED        driver marks complete
//! REQUESTED -> CANCELLED          user or admin cancels before broadcast
//! ```
//!
//! COMPLETED and CANCELLED are terminal. Rating attaches to a COMPLETED
//! booking without changing its status.

use crate::entities::booking::BookingStatus;
use crate::entities::user::UserRole;

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Requested, Broadcasted)
            | (Requested, Cancelled)
            | (Broadcasted, Accepted)
            | (Broadcasted, Cancelled)
            | (Accepted, InProgress)
            | (Accepted, Cancelled)
            | (InProgress, Completed)
    )
}

pub fn is_terminal(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Completed | BookingStatus::Cancelled)
}

pub fn is_cancellable(status: BookingStatus) -> bool {
    can_transition(status, BookingStatus::Cancelled)
}

/// Who may cancel from a given status. Drivers may only cancel a booking
/// they have already accepted; users and admins may cancel any
/// not-yet-started booking.
pub fn may_cancel(role: UserRole, status: BookingStatus) -> bool {
    if !is_cancellable(status) {
        return false;
    }
    match role {
        UserRole::User | UserRole::Admin => true,
        UserRole::Driver => status == BookingStatus::Accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 6] =
        [Requested, Broadcasted, Accepted, InProgress, Completed, Cancelled];

    #[test]
    fn test_legal_edges_exactly() {
        let legal = [
            (Requested, Broadcasted),
            (Requested, Cancelled),
            (Broadcasted, Accepted),
            (Broadcasted, Cancelled),
            (Accepted, InProgress),
            (Accepted, Cancelled),
            (InProgress, Completed),
        ];
        for from in ALL {
            for to in ALL {
                let expected = legal.contains(&(from, to));
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for from in [Completed, Cancelled] {
            assert!(is_terminal(from));
            for to in ALL {
                assert!(!can_transition(from, to));
            }
        }
    }

    #[test]
    fn test_no_backward_edges() {
        // A path through the happy lifecycle never revisits a state.
        let path = [Requested, Broadcasted, Accepted, InProgress, Completed];
        for (i, from) in path.iter().enumerate() {
            for earlier in &path[..=i] {
                assert!(!can_transition(*from, *earlier));
            }
        }
    }

    #[test]
    fn test_in_progress_not_cancellable() {
        assert!(!is_cancellable(InProgress));
        assert!(is_cancellable(Requested));
        assert!(is_cancellable(Broadcasted));
        assert!(is_cancellable(Accepted));
    }

    #[test]
    fn test_driver_cancels_only_after_accept() {
        assert!(may_cancel(UserRole::Driver, Accepted));
        assert!(!may_cancel(UserRole::Driver, Broadcasted));
        assert!(may_cancel(UserRole::User, Broadcasted));
        assert!(may_cancel(UserRole::Admin, Requested));
        assert!(!may_cancel(UserRole::User, InProgress));
    }
}
