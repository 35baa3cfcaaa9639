use super::*;
use crate::{error::TransportError, registry::DispatchOutcome};
use serde_json::json;

fn correlator(mode: CorrelationMode, timeout: Duration) -> (Arc<EventRegistry>, Correlator) {
    let registry = Arc::new(EventRegistry::new());
    let correlator = Correlator::new(Arc::clone(&registry), mode, timeout);
    (registry, correlator)
}

fn record_token(tokens: &Mutex<Vec<CorrelationId>>, token: Option<CorrelationId>) {
    tokens
        .lock()
        .expect("tokens")
        .push(token.expect("queued mode threads a token"));
}

#[tokio::test]
async fn resolves_with_command_and_final_payload() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let call = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok("sent"));
    let respond = async {
        tokio::task::yield_now().await;
        registry.dispatch(EventName::Init, &json!({ "status": "success" }))
    };
    let (result, outcome) = futures::join!(call, respond);

    let response = result.expect("resolved");
    assert_eq!(response.command_payload, "sent");
    assert_eq!(response.final_payload, json!({ "status": "success" }));
    assert_eq!(outcome, DispatchOutcome::Handled);
}

#[tokio::test]
async fn response_dispatched_inside_trigger_is_not_lost() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let response = correlator
        .await_command(EventName::Init, CommandId::Init, |_| {
            registry.dispatch(EventName::Init, &json!({ "status": "success" }));
            Ok(())
        })
        .await
        .expect("resolved");

    assert_eq!(response.final_payload["status"], "success");
}

#[tokio::test]
async fn resolves_only_once_and_unsubscribes() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let call = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok(()));
    let respond = async {
        tokio::task::yield_now().await;
        let first = registry.dispatch(EventName::Init, &json!({ "n": 1 }));
        let second = registry.dispatch(EventName::Init, &json!({ "n": 2 }));
        (first, second)
    };
    let (result, (first, second)) = futures::join!(call, respond);

    assert_eq!(result.expect("resolved").final_payload, json!({ "n": 1 }));
    assert_eq!(first, DispatchOutcome::Handled);
    assert_eq!(second, DispatchOutcome::NoHandler);
    assert!(!registry.is_subscribed(EventName::Init));
}

#[tokio::test]
async fn times_out_and_ignores_late_response() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_millis(30));

    let err = correlator
        .await_command(EventName::PaymentResponse, CommandId::Pay, |_| Ok(()))
        .await
        .expect_err("no response must time out");

    match &err {
        CommandError::Timeout { command, elapsed } => {
            assert_eq!(*command, CommandId::Pay);
            assert_eq!(*elapsed, Duration::from_millis(30));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "Command pay timed out after 30ms");
    assert!(!registry.is_subscribed(EventName::PaymentResponse));
    assert_eq!(
        registry.dispatch(EventName::PaymentResponse, &json!({ "status": "success" })),
        DispatchOutcome::NoHandler
    );
}

#[tokio::test]
async fn trigger_failure_releases_waiter_without_waiting() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(600));

    let err = correlator
        .await_command::<(), _>(EventName::PaymentResponse, CommandId::Pay, |_| {
            Err(TransportError::Unsupported.into())
        })
        .await
        .expect_err("trigger failure");

    assert!(matches!(
        err,
        CommandError::Trigger {
            command: CommandId::Pay,
            source: TriggerError::Transport(TransportError::Unsupported),
        }
    ));
    assert!(!registry.is_subscribed(EventName::PaymentResponse));
    assert_eq!(correlator.pending_count(EventName::PaymentResponse), 0);
}

// Concurrent calls on one event name no longer steal each other's response.
#[tokio::test]
async fn queued_mode_resolves_untagged_responses_in_fifo_order() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let first = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |_| Ok(1));
    let second = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |_| Ok(2));
    let respond = async {
        tokio::task::yield_now().await;
        assert_eq!(correlator.pending_count(EventName::PaymentResponse), 2);
        registry.dispatch(EventName::PaymentResponse, &json!({ "reply": "a" }));
        registry.dispatch(EventName::PaymentResponse, &json!({ "reply": "b" }));
    };
    let (first, second, ()) = futures::join!(first, second, respond);

    let first = first.expect("first resolved");
    let second = second.expect("second resolved");
    assert_eq!((first.command_payload, first.final_payload), (1, json!({ "reply": "a" })));
    assert_eq!((second.command_payload, second.final_payload), (2, json!({ "reply": "b" })));
    assert!(!registry.is_subscribed(EventName::PaymentResponse));
}

#[tokio::test]
async fn queued_mode_routes_tagged_responses_to_their_caller() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));
    let tokens = Mutex::new(Vec::new());

    let first = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |token| {
        record_token(&tokens, token);
        Ok("first")
    });
    let second = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |token| {
        record_token(&tokens, token);
        Ok("second")
    });
    let respond = async {
        tokio::task::yield_now().await;
        let tokens = tokens.lock().expect("tokens").clone();
        // Answer in reverse order.
        for (reply, token) in ["for-second", "for-first"].into_iter().zip(tokens.iter().rev()) {
            registry.dispatch(
                EventName::PaymentResponse,
                &json!({ "reply": reply, "correlation_id": token }),
            );
        }
    };
    let (first, second, ()) = futures::join!(first, second, respond);

    assert_eq!(first.expect("first").final_payload["reply"], "for-first");
    assert_eq!(second.expect("second").final_payload["reply"], "for-second");
}

#[tokio::test]
async fn unknown_token_is_dropped_and_call_stays_pending() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));
    let tokens = Mutex::new(Vec::new());

    let call = correlator.await_command(EventName::Init, CommandId::Init, |token| {
        record_token(&tokens, token);
        Ok(())
    });
    let respond = async {
        tokio::task::yield_now().await;
        registry.dispatch(
            EventName::Init,
            &json!({ "status": "stray", "correlation_id": CorrelationId::new() }),
        );
        assert_eq!(correlator.pending_count(EventName::Init), 1);
        let token = tokens.lock().expect("tokens")[0];
        registry.dispatch(
            EventName::Init,
            &json!({ "status": "success", "correlation_id": token }),
        );
    };
    let (result, ()) = futures::join!(call, respond);

    assert_eq!(result.expect("resolved").final_payload["status"], "success");
}

#[tokio::test]
async fn single_slot_mode_displaces_earlier_call() {
    let (registry, correlator) = correlator(CorrelationMode::SingleSlot, Duration::from_secs(5));

    let first = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |token| {
        assert!(token.is_none());
        Ok(1)
    });
    let second = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |_| Ok(2));
    let respond = async {
        tokio::task::yield_now().await;
        registry.dispatch(EventName::PaymentResponse, &json!({ "reply": "only" }));
    };
    let (first, second, ()) = futures::join!(first, second, respond);

    assert!(matches!(
        first.expect_err("displaced"),
        CommandError::Displaced {
            command: CommandId::Pay,
            event: EventName::PaymentResponse,
        }
    ));
    assert_eq!(second.expect("second").final_payload["reply"], "only");
}

#[tokio::test]
async fn cancel_all_fails_pending_calls() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let call = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok(()));
    let cancel = async {
        tokio::task::yield_now().await;
        correlator.cancel_all();
    };
    let (result, ()) = futures::join!(call, cancel);

    assert!(matches!(
        result.expect_err("cancelled"),
        CommandError::Cancelled {
            command: CommandId::Init
        }
    ));
    assert!(!registry.is_subscribed(EventName::Init));
}

#[tokio::test]
async fn new_call_overrides_foreign_handler_for_event() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));
    registry.subscribe(EventName::Init, |_| Err(anyhow!("should be replaced")));

    let call = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok(()));
    let respond = async {
        tokio::task::yield_now().await;
        registry.dispatch(EventName::Init, &json!({ "status": "success" }))
    };
    let (result, outcome) = futures::join!(call, respond);

    assert!(result.is_ok());
    assert_eq!(outcome, DispatchOutcome::Handled);
}

#[tokio::test]
async fn dropped_call_releases_waiter_and_subscription() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let call = correlator.await_command(EventName::PaymentResponse, CommandId::Pay, |_| Ok(()));
    let abandoned = tokio::time::timeout(Duration::from_millis(5), call).await;

    assert!(abandoned.is_err());
    assert_eq!(correlator.pending_count(EventName::PaymentResponse), 0);
    assert!(!registry.is_subscribed(EventName::PaymentResponse));
    assert_eq!(
        registry.dispatch(EventName::PaymentResponse, &json!({ "status": "success" })),
        DispatchOutcome::NoHandler
    );
}

#[tokio::test]
async fn dropped_call_leaves_other_waiters_routed() {
    let (registry, correlator) = correlator(CorrelationMode::Queued, Duration::from_secs(5));

    let kept = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok("kept"));
    let dropped = correlator.await_command(EventName::Init, CommandId::Init, |_| Ok("dropped"));
    let respond = async {
        let _ = tokio::time::timeout(Duration::from_millis(5), dropped).await;
        assert_eq!(correlator.pending_count(EventName::Init), 1);
        registry.dispatch(EventName::Init, &json!({ "reply": "kept" }))
    };
    let (result, outcome) = futures::join!(kept, respond);

    assert_eq!(outcome, DispatchOutcome::Handled);
    let response = result.expect("kept call resolves");
    assert_eq!(response.command_payload, "kept");
    assert!(!registry.is_subscribed(EventName::Init));
}

#[test]
fn correlation_mode_parses_config_values() {
    assert_eq!(CorrelationMode::parse("queued"), Some(CorrelationMode::Queued));
    assert_eq!(
        CorrelationMode::parse(" Single-Slot "),
        Some(CorrelationMode::SingleSlot)
    );
    assert_eq!(CorrelationMode::parse("fifo"), None);
}
