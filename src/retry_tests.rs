// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the update retry policy.

#[cfg(test)]
mod tests {
    use crate::retry::*;
    use hickory_proto::op::ResponseCode;
    use std::time::Duration;

    #[test]
    fn test_transient_failures() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Io("connection reset".to_string()).is_transient());
        assert!(FailureKind::Status(ResponseCode::ServFail).is_transient());
    }

    #[test]
    fn test_fatal_failures() {
        for code in [
            ResponseCode::NotAuth,
            ResponseCode::Refused,
            ResponseCode::NotZone,
            ResponseCode::FormErr,
            ResponseCode::BADSIG,
            ResponseCode::BADKEY,
            ResponseCode::BADTIME,
        ] {
            assert!(
                !FailureKind::Status(code).is_transient(),
                "{code:?} should not be retried"
            );
        }
        assert!(!FailureKind::Tsig("bad key".to_string()).is_transient());
    }

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(1, &FailureKind::Timeout),
            Decision::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(
            policy.decide(2, &FailureKind::Timeout),
            Decision::RetryAfter(Duration::from_millis(400))
        );
        assert_eq!(policy.decide(3, &FailureKind::Timeout), Decision::GiveUp);
    }

    #[test]
    fn test_fatal_failure_gives_up_on_first_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(1, &FailureKind::Status(ResponseCode::NotAuth)),
            Decision::GiveUp
        );
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 20,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_before_retry(5), Duration::from_millis(3_200));
        assert_eq!(policy.delay_before_retry(6), Duration::from_secs(5));
        assert_eq!(policy.delay_before_retry(40), Duration::from_secs(5));
    }

    #[test]
    fn test_immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(
            policy.decide(1, &FailureKind::Timeout),
            Decision::RetryAfter(Duration::ZERO)
        );
        assert_eq!(policy.decide(3, &FailureKind::Timeout), Decision::GiveUp);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(FailureKind::Timeout.to_string(), "request timed out");
        assert_eq!(
            FailureKind::Io("reset".to_string()).to_string(),
            "I/O error: reset"
        );
    }
}
