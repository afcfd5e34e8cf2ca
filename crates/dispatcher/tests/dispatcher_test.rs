use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_core::{
    DispatchContext, DispatchOutcome, DispatchRequest, FnTransformer, Forward, LinkMethod,
    MonitoringEvent, RelayError, RelayResult, ShutdownSignal,
};
use relay_dispatcher::{Dispatcher, PresumedTimeoutRegistry, PRESUMED_TIMEOUT_REASON};
use relay_testing_utils::{
    DispatchConfigBuilder, RecordingAuditLog, RecordingMonitoringSink, ScriptedListener,
    ScriptedReply, ScriptedSender,
};
use tokio::time::Instant;

#[tokio::test]
async fn test_synchronous_dispatch_returns_reply() {
    let sender = Arc::new(ScriptedSender::responding(|payload| {
        ScriptedReply::Reply(format!("<reply>{payload}</reply>"))
    }));
    let dispatcher = Dispatcher::builder(DispatchConfigBuilder::new("orders").build(), sender.clone())
        .build()
        .unwrap();

    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "<reply>a</reply>"));
    assert_eq!(sender.call_count(), 1);
    assert_eq!(dispatcher.sender_name(), "orders-sender");
    assert_eq!(dispatcher.listener_name(), None);
}

#[tokio::test(start_paused = true)]
async fn test_presumed_timeout_short_circuits_within_interval() {
    let sender = Arc::new(
        ScriptedSender::new().with_script(vec![ScriptedReply::Timeout("no answer".into())]),
    );
    let monitoring = RecordingMonitoringSink::new();
    let config = DispatchConfigBuilder::new("orders")
        .with_presumed_timeout(10)
        .build();
    let dispatcher = Dispatcher::builder(config, sender.clone())
        .with_monitoring(Arc::new(monitoring.clone()))
        .build()
        .unwrap();

    // t=0: real timeout
    let first = dispatcher.dispatch(DispatchRequest::new("one")).await;
    assert!(matches!(first, DispatchOutcome::TimedOut(ref r) if r == "no answer"));
    assert_eq!(sender.call_count(), 1);

    // t=3: presumed, sender untouched
    tokio::time::advance(Duration::from_secs(3)).await;
    let second = dispatcher.dispatch(DispatchRequest::new("two")).await;
    assert!(matches!(second, DispatchOutcome::TimedOut(ref r) if r == PRESUMED_TIMEOUT_REASON));
    assert_eq!(sender.call_count(), 1);

    // t=15: contacts the sender again
    tokio::time::advance(Duration::from_secs(12)).await;
    let third = dispatcher.dispatch(DispatchRequest::new("three")).await;
    assert!(matches!(third, DispatchOutcome::Success(ref r) if r == "three"));
    assert_eq!(sender.call_count(), 2);

    assert_eq!(
        monitoring.event_names(),
        vec![
            "Sender Timeout",
            "Sender Timeout",
            "Sender Received Result on Time"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_presumed_timeout_is_shared_by_name() {
    let registry = Arc::new(PresumedTimeoutRegistry::new());
    let config = DispatchConfigBuilder::new("shared")
        .with_presumed_timeout(10)
        .build();

    let failing = Arc::new(
        ScriptedSender::new().with_script(vec![ScriptedReply::Timeout("slow".into())]),
    );
    let first = Dispatcher::builder(config.clone(), failing)
        .with_registry(registry.clone())
        .build()
        .unwrap();
    let healthy = Arc::new(ScriptedSender::new());
    let second = Dispatcher::builder(config, healthy.clone())
        .with_registry(registry)
        .build()
        .unwrap();

    assert!(first.dispatch(DispatchRequest::new("x")).await.is_timed_out());
    let outcome = second.dispatch(DispatchRequest::new("y")).await;
    assert!(matches!(outcome, DispatchOutcome::TimedOut(ref r) if r == PRESUMED_TIMEOUT_REASON));
    assert_eq!(healthy.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_time_out_on_result_retries_with_backoff() {
    let sender = Arc::new(ScriptedSender::responding(|_| {
        ScriptedReply::Reply("TIMEOUT".into())
    }));
    let monitoring = RecordingMonitoringSink::new();
    let config = DispatchConfigBuilder::new("orders")
        .with_retries(2, 1, 10)
        .with_time_out_on_result("TIMEOUT")
        .build();
    let dispatcher = Dispatcher::builder(config, sender.clone())
        .with_monitoring(Arc::new(monitoring.clone()))
        .build()
        .unwrap();

    let start = Instant::now();
    let outcome = dispatcher.dispatch(DispatchRequest::new("item-2")).await;

    match outcome {
        DispatchOutcome::TimedOut(reason) => assert_eq!(reason, "timeOutOnResult [TIMEOUT]"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(sender.call_count(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(3));

    let sent = sender.sent();
    assert_eq!(sent[1].at - sent[0].at, Duration::from_secs(1));
    assert_eq!(sent[2].at - sent[1].at, Duration::from_secs(2));
    assert_eq!(monitoring.count(MonitoringEvent::TimeoutOccurred), 1);
}

#[tokio::test(start_paused = true)]
async fn test_max_retries_zero_is_single_attempt() {
    let sender = Arc::new(
        ScriptedSender::new().with_script(vec![ScriptedReply::Failure("refused".into())]),
    );
    let dispatcher = Dispatcher::builder(DispatchConfigBuilder::new("orders").build(), sender.clone())
        .build()
        .unwrap();

    let start = Instant::now();
    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Failed(RelayError::TransportFailure(ref m)) if m == "refused"
    ));
    assert_eq!(sender.call_count(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_exception_on_result_reports_exception() {
    let sender = Arc::new(ScriptedSender::responding(|_| ScriptedReply::Reply("BOOM".into())));
    let monitoring = RecordingMonitoringSink::new();
    let config = DispatchConfigBuilder::new("orders")
        .with_exception_on_result("BOOM")
        .build();
    let dispatcher = Dispatcher::builder(config, sender)
        .with_monitoring(Arc::new(monitoring.clone()))
        .build()
        .unwrap();

    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    match outcome {
        DispatchOutcome::Failed(e) => assert_eq!(e.detail(), "exceptionOnResult [BOOM]"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(monitoring.event_names(), vec!["Sender Exception Caught"]);
}

#[tokio::test]
async fn test_empty_result_literals_are_ignored() {
    let sender = Arc::new(ScriptedSender::responding(|_| ScriptedReply::Reply(String::new())));
    let monitoring = RecordingMonitoringSink::new();
    let config = DispatchConfigBuilder::new("orders")
        .with_time_out_on_result("")
        .with_exception_on_result("")
        .build();
    let dispatcher = Dispatcher::builder(config, sender.clone())
        .with_monitoring(Arc::new(monitoring.clone()))
        .build()
        .unwrap();

    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r.is_empty()));
    assert_eq!(sender.call_count(), 1);
    assert!(monitoring.event_names().is_empty());
}

#[tokio::test]
async fn test_timeout_cleared_only_after_pending_timeout() {
    let sender = Arc::new(ScriptedSender::new());
    let monitoring = RecordingMonitoringSink::new();
    let dispatcher = Dispatcher::builder(DispatchConfigBuilder::new("orders").build(), sender)
        .with_monitoring(Arc::new(monitoring.clone()))
        .build()
        .unwrap();

    dispatcher.dispatch(DispatchRequest::new("a")).await;
    dispatcher.dispatch(DispatchRequest::new("b")).await;

    assert!(monitoring.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_asynchronous_sender_correlates_by_message_id() {
    let context = DispatchContext::new();
    let message_id = context.message_id().unwrap().to_string();

    let sender = Arc::new(ScriptedSender::new().asynchronous());
    let listener = Arc::new(
        ScriptedListener::new(Duration::from_secs(5)).with_reply(&message_id, "<ack/>"),
    );
    let config = DispatchConfigBuilder::new("orders")
        .with_link_method(LinkMethod::MessageId)
        .build();
    let dispatcher = Dispatcher::builder(config, sender)
        .with_listener(listener.clone())
        .build()
        .unwrap();

    let outcome = dispatcher
        .dispatch(DispatchRequest::new("a").with_context(context))
        .await;

    assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "<ack/>"));
    assert_eq!(listener.received_keys(), vec![message_id]);
    assert_eq!(dispatcher.listener_name(), Some("orders-replylistener"));
}

#[tokio::test(start_paused = true)]
async fn test_asynchronous_sender_correlates_by_correlation_id() {
    let sender = Arc::new(ScriptedSender::new().asynchronous());
    let listener = Arc::new(
        ScriptedListener::new(Duration::from_secs(5))
            .with_name("replies")
            .with_reply("corr-1", "<ack/>"),
    );
    let dispatcher = Dispatcher::builder(DispatchConfigBuilder::new("orders").build(), sender)
        .with_listener(listener.clone())
        .build()
        .unwrap();

    let request = DispatchRequest::new("a")
        .with_context(DispatchContext::new().with_correlation_id("corr-1"));
    let outcome = dispatcher.dispatch(request).await;

    assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "<ack/>"));
    assert_eq!(listener.received_keys(), vec!["corr-1"]);
    assert_eq!(dispatcher.listener_name(), Some("replies"));
}

#[tokio::test(start_paused = true)]
async fn test_listener_timeout_is_retried() {
    let sender = Arc::new(ScriptedSender::new().asynchronous());
    let listener = Arc::new(ScriptedListener::new(Duration::from_secs(2)));
    let config = DispatchConfigBuilder::new("orders")
        .with_link_method(LinkMethod::MessageId)
        .with_retries(1, 1, 1)
        .build();
    let dispatcher = Dispatcher::builder(config, sender.clone())
        .with_listener(listener)
        .build()
        .unwrap();

    let start = Instant::now();
    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(outcome.is_timed_out());
    assert_eq!(sender.call_count(), 2);
    // two reply waits of 2s plus one backoff of 1s
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}

#[test]
fn test_listener_with_synchronous_sender_is_rejected() {
    let result = Dispatcher::builder(
        DispatchConfigBuilder::new("orders").build(),
        Arc::new(ScriptedSender::new()),
    )
    .with_listener(Arc::new(ScriptedListener::new(Duration::from_secs(1))))
    .build();

    assert!(matches!(result.err(), Some(RelayError::Configuration(_))));
}

#[tokio::test]
async fn test_audit_record_stored_on_success() {
    let audit_log = RecordingAuditLog::new();
    let dispatcher = Dispatcher::builder(
        DispatchConfigBuilder::new("orders").build(),
        Arc::new(ScriptedSender::new()),
    )
    .with_audit_log(Arc::new(audit_log.clone()))
    .with_label(Arc::new(FnTransformer(
        |text: &str, _: &HashMap<String, String>| -> RelayResult<String> {
            Ok(format!("label:{}", text.len()))
        },
    )))
    .build()
    .unwrap();

    let context = DispatchContext::new();
    let message_id = context.message_id().unwrap().to_string();
    let outcome = dispatcher
        .dispatch(DispatchRequest::new("<order/>").with_context(context))
        .await;
    assert!(outcome.is_success());

    let records = audit_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message_id, message_id);
    assert_eq!(records[0].correlation_id, "-");
    assert_eq!(records[0].trail, "no audit trail");
    assert_eq!(records[0].label.as_deref(), Some("label:8"));
    assert_eq!(records[0].payload, "<order/>");
}

#[tokio::test]
async fn test_audit_failure_fails_dispatch() {
    let monitoring = RecordingMonitoringSink::new();
    let dispatcher = Dispatcher::builder(
        DispatchConfigBuilder::new("orders").build(),
        Arc::new(ScriptedSender::new()),
    )
    .with_audit_log(Arc::new(RecordingAuditLog::failing()))
    .with_monitoring(Arc::new(monitoring.clone()))
    .build()
    .unwrap();

    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(matches!(outcome, DispatchOutcome::Failed(RelayError::AuditLog(_))));
    assert_eq!(monitoring.count(MonitoringEvent::ExceptionCaught), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_predicate_on_reply_content() {
    let sender = Arc::new(ScriptedSender::new().with_script(vec![
        ScriptedReply::Reply("<status>retry</status>".into()),
        ScriptedReply::Reply("<status>ok</status>".into()),
    ]));
    let config = DispatchConfigBuilder::new("orders").with_retries(1, 1, 1).build();
    let predicate = |reply: &str| reply.contains("retry");
    let dispatcher = Dispatcher::builder(config, sender.clone())
        .with_retry_predicate(Arc::new(predicate))
        .build()
        .unwrap();

    let outcome = dispatcher.dispatch(DispatchRequest::new("a")).await;

    assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "<status>ok</status>"));
    assert_eq!(sender.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_forwards() {
    let config = DispatchConfigBuilder::new("timeouts")
        .with_result_on_time_out("<timeout-default/>")
        .build();
    let dispatcher = Dispatcher::builder(
        config,
        Arc::new(ScriptedSender::new().with_script(vec![ScriptedReply::Timeout("t".into())])),
    )
    .build()
    .unwrap();
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("a")).await,
        Forward::Success("<timeout-default/>".into())
    );

    let config = DispatchConfigBuilder::new("presumed")
        .with_presumed_timeout(30)
        .build();
    let dispatcher = Dispatcher::builder(
        config,
        Arc::new(ScriptedSender::new().with_script(vec![ScriptedReply::Timeout("t".into())])),
    )
    .build()
    .unwrap();
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("a")).await,
        Forward::Timeout("t".into())
    );
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("b")).await.name(),
        "presumedTimeout"
    );

    let config = DispatchConfigBuilder::new("checked")
        .with_check_root_tag("reply")
        .build();
    let dispatcher = Dispatcher::builder(config, Arc::new(ScriptedSender::new()))
        .build()
        .unwrap();
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("<reply/>")).await,
        Forward::Success("<reply/>".into())
    );
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("<other/>")).await,
        Forward::IllegalResult("<other/>".into())
    );

    let dispatcher = Dispatcher::builder(
        DispatchConfigBuilder::new("failing").build(),
        Arc::new(ScriptedSender::new().with_script(vec![ScriptedReply::Failure("down".into())])),
    )
    .build()
    .unwrap();
    let forward = dispatcher.dispatch_or_forward(DispatchRequest::new("a")).await;
    assert_eq!(forward.name(), "exception");
    assert_eq!(forward.message(), Some("transport failure: down"));
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_aborts_reply_wait() {
    let signal = ShutdownSignal::new();
    let sender = Arc::new(ScriptedSender::new().asynchronous());
    let listener = Arc::new(ScriptedListener::new(Duration::from_secs(300)));
    let config = DispatchConfigBuilder::new("orders")
        .with_link_method(LinkMethod::MessageId)
        .with_retries(3, 1, 1)
        .build();
    let dispatcher = Arc::new(
        Dispatcher::builder(config, sender.clone())
            .with_listener(listener)
            .with_interrupt(signal.token())
            .build()
            .unwrap(),
    );

    let task = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.dispatch(DispatchRequest::new("a")).await }
    });
    tokio::time::sleep(Duration::from_secs(10)).await;
    signal.trigger();

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Interrupted));
    assert_eq!(sender.call_count(), 1);
    assert_eq!(
        dispatcher.dispatch_or_forward(DispatchRequest::new("b")).await,
        Forward::Interrupt
    );
}

#[tokio::test]
async fn test_concurrent_dispatches_share_dispatcher() {
    let sender = Arc::new(ScriptedSender::new().with_delay(|_| Duration::from_millis(5)));
    let dispatcher = Arc::new(
        Dispatcher::builder(DispatchConfigBuilder::new("orders").build(), sender.clone())
            .build()
            .unwrap(),
    );

    let outcomes = futures::future::join_all((0..8).map(|i| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.dispatch(DispatchRequest::new(format!("m{i}"))).await }
    }))
    .await;

    assert!(outcomes.iter().all(DispatchOutcome::is_success));
    assert_eq!(sender.call_count(), 8);
}
