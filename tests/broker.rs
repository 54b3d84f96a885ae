// tests/broker.rs
//
// Outbound calls: correlation, ack/response routing, timeouts and orphans.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use busrpc::{
    // ---
    create_memory_connection,
    Action,
    CallState,
    ClientEventKind,
    CorrelationId,
    Frame,
    IdGenerator,
    Result,
    RpcBroker,
    RpcBrokerBuilder,
    RpcConfig,
    RpcError,
    SequentialIds,
    Topic,
};

const ACK_TIMEOUT: Duration = Duration::from_millis(100);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

fn broker() -> (RpcBroker, UnboundedReceiver<Frame>) {
    // ---
    let (connection, outbox) = create_memory_connection();
    let broker = RpcBrokerBuilder::new(connection)
        .ack_timeout(ACK_TIMEOUT)
        .response_timeout(RESPONSE_TIMEOUT)
        .id_generator(Arc::new(SequentialIds::new("u")))
        .build()
        .expect("valid config");
    (broker, outbox)
}

fn rpc(action: Action, data: &[&str]) -> Frame {
    Frame::rpc(action, data.iter().map(|s| s.to_string()).collect())
}

#[tokio::test(start_paused = true)]
async fn ack_then_response_resolves_exactly_once() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    common::init_logging();

    let (broker, mut outbox) = broker();

    let pending = broker.make("add", &json!({ "a": 1, "b": 2 })).await?;
    assert_eq!(pending.correlation_id().as_str(), "u1");

    let request = outbox.try_recv().expect("request frame");
    assert_eq!(request.topic, Topic::Rpc);
    assert_eq!(request.action, Action::Request);
    assert_eq!(request.data, vec!["add", "u1", r#"O{"a":1,"b":2}"#]);

    let id = CorrelationId::from("u1");
    assert_eq!(broker.call_state(&id), Some(CallState::AwaitingAck));

    broker.handle(rpc(Action::Ack, &["add", "u1"])).await?;
    assert_eq!(broker.call_state(&id), Some(CallState::AwaitingResponse));

    broker.handle(rpc(Action::Response, &["add", "u1", "N3"])).await?;
    assert_eq!(broker.call_state(&id), None);
    assert_eq!(broker.pending_calls(), 0);

    // Late duplicates are orphans: no error, nothing re-delivered.
    broker.handle(rpc(Action::Response, &["add", "u1", "N4"])).await?;
    broker.handle(rpc(Action::Ack, &["add", "u1"])).await?;
    broker
        .handle(rpc(Action::Error, &["NO_RPC_PROVIDER", "add", "u1"]))
        .await?;

    assert_eq!(pending.await?, json!(3));
    assert!(outbox.try_recv().is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_ack_fails_with_ack_timeout() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let pending = broker.make("slow", &json!(null)).await?;
    let id = pending.correlation_id().clone();

    let started = tokio::time::Instant::now();
    let err = pending.await.unwrap_err();
    assert!(matches!(err, RpcError::AckTimeout), "{err:?}");
    assert!(started.elapsed() >= ACK_TIMEOUT);
    assert!(started.elapsed() < RESPONSE_TIMEOUT);

    // The out-of-order ACK and RESPONSE arrive after the deadline.
    broker.handle(rpc(Action::Ack, &["slow", id.as_str()])).await?;
    broker
        .handle(rpc(Action::Response, &["slow", id.as_str(), "N1"]))
        .await?;

    assert_eq!(broker.pending_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn uniform_deadline_reports_the_missing_ack() -> Result<()> {
    // ---
    let (connection, _outbox) = create_memory_connection();
    let broker = RpcBrokerBuilder::new(connection)
        .config(RpcConfig::uniform(ACK_TIMEOUT))
        .build()?;

    let mut pending = Vec::new();
    for i in 0..20 {
        pending.push(broker.make("slow", &json!(i)).await?);
    }

    for call in pending {
        let err = call.await.unwrap_err();
        assert!(matches!(err, RpcError::AckTimeout), "{err:?}");
    }
    assert_eq!(broker.pending_calls(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn uniform_deadline_reports_the_missing_ack_across_threads() -> Result<()> {
    // ---
    let (connection, _outbox) = create_memory_connection();
    let broker = RpcBrokerBuilder::new(connection)
        .config(RpcConfig::uniform(Duration::from_millis(20)))
        .build()?;

    let mut pending = Vec::new();
    for i in 0..200 {
        pending.push(broker.make("slow", &json!(i)).await?);
    }

    for call in pending {
        let err = call.await.unwrap_err();
        assert!(matches!(err, RpcError::AckTimeout), "{err:?}");
    }
    Ok(())
}

#[test]
fn response_deadline_shorter_than_ack_deadline_is_refused() {
    // ---
    let (connection, _outbox) = create_memory_connection();
    let result = RpcBrokerBuilder::new(connection)
        .ack_timeout(Duration::from_millis(500))
        .response_timeout(Duration::from_millis(100))
        .build();
    assert!(matches!(result, Err(RpcError::InvalidArgument(_))));
}

#[tokio::test(start_paused = true)]
async fn acknowledged_call_without_response_fails_with_response_timeout() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let pending = broker.make("slow", &json!("x")).await?;
    broker.handle(rpc(Action::Ack, &["slow", "u1"])).await?;

    // Well past the ack deadline the call is still waiting.
    tokio::time::sleep(ACK_TIMEOUT * 2).await;
    assert_eq!(
        broker.call_state(&"u1".into()),
        Some(CallState::AwaitingResponse)
    );

    let err = pending.await.unwrap_err();
    assert!(matches!(err, RpcError::ResponseTimeout), "{err:?}");
    assert_eq!(broker.pending_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn error_frames_fail_the_call_with_the_server_code() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let no_provider = broker.make("add", &json!(1)).await?;
    let remote = broker.make("div", &json!(0)).await?;

    // ERROR carries the code first: code, name, correlation id.
    broker
        .handle(rpc(Action::Error, &["NO_RPC_PROVIDER", "add", "u1"]))
        .await?;
    broker
        .handle(rpc(Action::Error, &["DIVIDE_BY_ZERO", "div", "u2"]))
        .await?;

    assert!(matches!(
        no_provider.await,
        Err(RpcError::NoProviderAvailable)
    ));
    match remote.await {
        Err(RpcError::Remote(code)) => assert_eq!(code, "DIVIDE_BY_ZERO"),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(broker.pending_calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn response_without_prior_ack_still_resolves() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let pending = broker.make("echo", &json!("hi")).await?;
    broker
        .handle(rpc(Action::Response, &["echo", "u1", "Shi"]))
        .await?;

    assert_eq!(pending.await?, json!("hi"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn calls_resolve_independently() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let answered = broker.make("fast", &json!(1)).await?;
    let ignored = broker.make("lost", &json!(2)).await?;

    broker.handle(rpc(Action::Ack, &["fast", "u1"])).await?;
    broker.handle(rpc(Action::Response, &["fast", "u1", "T"])).await?;

    assert_eq!(answered.await?, json!(true));
    assert_eq!(broker.pending_calls(), 1);
    assert!(matches!(ignored.await, Err(RpcError::AckTimeout)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn undecodable_response_fails_the_call() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();

    let pending = broker.make("add", &json!(1)).await?;
    broker
        .handle(rpc(Action::Response, &["add", "u1", "Q??"]))
        .await?;

    assert!(matches!(pending.await, Err(RpcError::Encoding(_))));
    assert_eq!(broker.pending_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn live_correlation_ids_are_unique() -> Result<()> {
    // ---
    let (connection, mut outbox) = create_memory_connection();
    let broker = RpcBrokerBuilder::new(connection).build()?;

    let mut pending = Vec::new();
    for i in 0..100 {
        pending.push(broker.make("add", &json!(i)).await?);
    }

    let ids: HashSet<_> = pending.iter().map(|p| p.correlation_id().clone()).collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(broker.pending_calls(), 100);

    let mut sent = HashSet::new();
    while let Ok(frame) = outbox.try_recv() {
        sent.insert(frame.data[1].clone());
    }
    assert_eq!(sent.len(), 100);
    Ok(())
}

struct FixedIds;

impl IdGenerator for FixedIds {
    fn next_id(&self) -> CorrelationId {
        CorrelationId::from("same")
    }
}

#[tokio::test(start_paused = true)]
async fn generator_clash_with_a_live_call_is_refused() -> Result<()> {
    // ---
    let (connection, mut outbox) = create_memory_connection();
    let broker = RpcBrokerBuilder::new(connection)
        .ack_timeout(ACK_TIMEOUT)
        .id_generator(Arc::new(FixedIds))
        .build()?;

    let first = broker.make("add", &json!(1)).await?;
    assert!(matches!(
        broker.make("add", &json!(2)).await,
        Err(RpcError::IdCollision)
    ));
    assert_eq!(broker.pending_calls(), 1);

    broker
        .handle(rpc(Action::Response, &["add", "same", "N1"]))
        .await?;
    assert_eq!(first.await?, json!(1));

    // Free again once the first call is gone.
    let second = broker.make("add", &json!(3)).await?;
    assert_eq!(second.correlation_id().as_str(), "same");

    // only the two successful requests went out
    assert_eq!(outbox.try_recv().unwrap().action, Action::Request);
    assert_eq!(outbox.try_recv().unwrap().action, Action::Request);
    assert!(outbox.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn failed_send_leaves_nothing_pending() {
    // ---
    let (broker, outbox) = broker();
    drop(outbox);

    let result = broker.make("add", &json!(1)).await;
    assert!(matches!(result, Err(RpcError::Transport(_))));
    assert_eq!(broker.pending_calls(), 0);
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let (broker, _outbox) = broker();
    assert!(matches!(
        broker.make("", &json!(1)).await,
        Err(RpcError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn malformed_frames_are_reported_not_indexed() -> Result<()> {
    // ---
    let (broker, _outbox) = broker();
    let mut events = broker.events();

    let result = broker.handle(rpc(Action::Response, &["add"])).await;
    assert!(matches!(result, Err(RpcError::InvalidFrame(_))));

    let event = events.try_recv().expect("parse error event");
    assert_eq!(event.kind, ClientEventKind::MessageParseError);
    assert_eq!(event.topic, Topic::Rpc);
    Ok(())
}

#[tokio::test]
async fn frames_on_other_topics_are_ignored() -> Result<()> {
    // ---
    let (broker, mut outbox) = broker();
    let mut events = broker.events();

    broker
        .handle(Frame::new(Topic::Event, Action::Subscribe, vec!["news".into()]))
        .await?;

    assert!(outbox.try_recv().is_err());
    assert!(events.try_recv().is_err());
    Ok(())
}

#[test]
fn zero_timeouts_are_rejected() {
    // ---
    let (connection, _outbox) = create_memory_connection();
    let result = RpcBrokerBuilder::new(connection)
        .response_timeout(Duration::ZERO)
        .build();
    assert!(matches!(result, Err(RpcError::InvalidArgument(_))));
}
