//! Single conversion boundary from observation to verdict

use super::predicate::Predicate;
use crate::models::{Observation, Verdict};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Applies a predicate to an observation; never panics and never errors
///
/// A transport failure is INCONCLUSIVE and the predicate is not invoked.
/// A predicate fault or panic is INCONCLUSIVE with the fault as detail.
pub fn evaluate(observation: &Observation, predicate: &Predicate) -> Verdict {
    if let Some(err) = observation.transport_error() {
        return Verdict::inconclusive(format!("no observation ({err})"));
    }

    match panic::catch_unwind(AssertUnwindSafe(|| predicate.check(observation))) {
        Ok(Ok(check)) if check.holds => Verdict::pass().with_detail(check.detail),
        Ok(Ok(check)) => Verdict::fail(
            check
                .detail
                .unwrap_or_else(|| format!("expected {predicate}")),
        ),
        Ok(Err(fault)) => {
            debug!("Predicate fault: {fault}");
            Verdict::inconclusive(format!("could not evaluate: {fault}"))
        }
        Err(payload) => Verdict::inconclusive(format!(
            "predicate panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        HttpResponse, ObservationKind, ResponseBody, TransportError, TransportErrorKind,
        VerdictStatus,
    };
    use crate::verdict::predicate::{Check, PredicateFault};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ok_response(status: u16) -> Observation {
        Observation::http(
            vec![HttpResponse {
                attempt: 1,
                request: "GET http://api/health".to_string(),
                status,
                headers: BTreeMap::new(),
                body: ResponseBody::Empty,
            }],
            Duration::from_millis(3),
        )
    }

    fn refused() -> Observation {
        Observation::failed(
            ObservationKind::Http,
            TransportError::new(TransportErrorKind::ConnectionRefused, "connection refused"),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_pass_and_fail() {
        assert_eq!(
            evaluate(&ok_response(400), &Predicate::StatusEquals(400)).status,
            VerdictStatus::Pass
        );
        let verdict = evaluate(&ok_response(200), &Predicate::StatusEquals(400));
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.detail.as_deref(), Some("expected 400, got 200"));
    }

    #[test]
    fn test_transport_error_skips_predicate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let predicate = Predicate::custom("counting", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Check::pass())
        });

        let verdict = evaluate(&refused(), &predicate);

        assert_eq!(verdict.status, VerdictStatus::Inconclusive);
        assert!(verdict
            .detail
            .expect("detail")
            .contains("connection refused"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_predicate_is_inconclusive() {
        let predicate = Predicate::custom("explodes", |_| panic!("body parse blew up"));
        let verdict = evaluate(&ok_response(200), &predicate);
        assert_eq!(verdict.status, VerdictStatus::Inconclusive);
        assert!(verdict.detail.expect("detail").contains("body parse blew up"));
    }

    #[test]
    fn test_fault_is_inconclusive() {
        let predicate = Predicate::custom("faulty", |_| Err(PredicateFault::new("bad shape")));
        let verdict = evaluate(&ok_response(200), &predicate);
        assert_eq!(verdict.status, VerdictStatus::Inconclusive);
    }

    #[test]
    fn test_plain_bool_custom_without_detail_gets_description() {
        let predicate = Predicate::custom("always false", |_| Ok(false.into()));
        let verdict = evaluate(&ok_response(200), &predicate);
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(
            verdict.detail.as_deref(),
            Some("expected custom(always false)")
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let obs = ok_response(503);
        let predicate = Predicate::NotServerError;
        assert_eq!(evaluate(&obs, &predicate), evaluate(&obs, &predicate));
    }
}
