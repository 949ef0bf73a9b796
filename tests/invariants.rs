//! Property tests for the pure governance math
//!
//! The approval threshold, the vote counters, and the Pacific day-boundary
//! functions are all deterministic and total; these checks hammer them with
//! generated inputs instead of hand-picked cases.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use updraft::models::{RequestType, UpdateRequest, VoteChoice};
use updraft::security::clock;
use updraft::security::limiter::is_request_expired;
use updraft::voting::required_approvals;

/// Instants well inside a calendar month, 2020 through 2034
///
/// The Pacific offset is approximated per month, so the hours right at a
/// month transition can see the offset flip mid-computation. Staying clear
/// of the first and last days keeps every derived boundary on one offset,
/// which is the regime the flooring properties describe.
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (2020i32..2035, 1u32..=12, 2u32..=27, 0u32..24, 0u32..60)
        .prop_map(|(y, mo, d, h, mi)| Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap())
}

proptest! {
    #[test]
    fn required_approvals_within_bounds(total in 1u32..500) {
        let required = required_approvals(total, 0.75);
        prop_assert!(required >= 1);
        prop_assert!(required <= total);
        // Rounded up: one fewer approval is strictly below the ratio
        prop_assert!(f64::from(required) >= f64::from(total) * 0.75);
        prop_assert!(f64::from(required - 1) < f64::from(total) * 0.75);
    }

    #[test]
    fn vote_counters_stay_consistent(
        votes in proptest::collection::vec((0u8..12, prop::bool::ANY), 0..30)
    ) {
        let t0 = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        let mut request = UpdateRequest::new(
            "requester",
            "Requester",
            RequestType::DemocraticUpdate,
            t0,
            Duration::minutes(10),
        );

        for (admin, approve) in votes {
            let choice = if approve { VoteChoice::Approve } else { VoteChoice::Reject };
            request.cast_vote(format!("admin-{admin}"), choice);

            prop_assert_eq!(request.vote_count, request.approve_count + request.reject_count);
            prop_assert_eq!(request.vote_count as usize, request.votes.len());
        }
    }

    #[test]
    fn day_start_is_a_flooring_projection(instant in instant_strategy()) {
        let start = clock::day_start(instant);
        prop_assert!(start <= instant);
        // Never more than a Pacific day (plus DST slack) behind
        prop_assert!(instant - start < Duration::hours(25));
        // Flooring twice changes nothing
        prop_assert_eq!(clock::day_start(start), start);
        // Every instant of the same local day shares the boundary
        prop_assert_eq!(clock::day_start(start + Duration::hours(1)), start);
    }

    #[test]
    fn next_midnight_is_strictly_ahead(instant in instant_strategy()) {
        let next = clock::next_midnight(instant);
        prop_assert!(next > instant);
        prop_assert!(next - instant <= Duration::hours(25));
        // The next boundary starts a later day than the current one
        prop_assert!(clock::day_start(next) > clock::day_start(instant));
    }

    #[test]
    fn expiry_boundary_is_exclusive(
        start in instant_strategy(),
        elapsed_secs in 0i64..7200,
    ) {
        let now = start + Duration::seconds(elapsed_secs);
        let expired = is_request_expired(start, now, Duration::minutes(10));
        prop_assert_eq!(expired, elapsed_secs > 600);
    }
}
