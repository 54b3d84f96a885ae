// tests/integration.rs
//
// End to end: a caller broker and a provider broker joined by a small
// in-test relay standing in for the message server.

mod common;

use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use busrpc::{
    // ---
    create_memory_connection,
    Action,
    Frame,
    Result,
    RpcBroker,
    RpcBrokerBuilder,
    RpcError,
    RpcResponse,
    NO_RPC_PROVIDER,
};

use common::{AddRequest, AddResponse};

struct Loopback {
    // ---
    caller: RpcBroker,
    provider: RpcBroker,
    tasks: Vec<JoinHandle<()>>,
}

impl Loopback {
    // ---
    fn new(response_timeout: Duration) -> Result<Self> {
        // ---
        let (caller_conn, mut caller_out) = create_memory_connection();
        let (provider_conn, mut provider_out) = create_memory_connection();

        let caller = RpcBrokerBuilder::new(caller_conn)
            .ack_timeout(response_timeout)
            .response_timeout(response_timeout)
            .build()?;
        let provider = RpcBrokerBuilder::new(provider_conn).build()?;

        // caller -> server -> provider: requests only
        let to_provider = provider.clone();
        let requests = tokio::spawn(async move {
            while let Some(frame) = caller_out.recv().await {
                if frame.action == Action::Request {
                    let _ = to_provider.handle(frame).await;
                }
            }
        });

        // provider -> server: subscriptions are acked back to the provider,
        // everything else is forwarded to the caller's inbox
        let (caller_tx, caller_in) = mpsc::channel(64);
        let subscriber = provider.clone();
        let answers = tokio::spawn(async move {
            while let Some(frame) = provider_out.recv().await {
                let forward = match frame.action {
                    Action::Subscribe | Action::Unsubscribe => {
                        let ack = Frame::rpc(
                            Action::Ack,
                            vec![frame.action.code().to_string(), frame.data[0].clone()],
                        );
                        let _ = subscriber.handle(ack).await;
                        continue;
                    }
                    // single provider: nobody else to hand a rejection to
                    Action::Rejection => Frame::rpc(
                        Action::Error,
                        vec![
                            NO_RPC_PROVIDER.to_string(),
                            frame.data[0].clone(),
                            frame.data[1].clone(),
                        ],
                    ),
                    _ => frame,
                };
                if caller_tx.send(forward).await.is_err() {
                    break;
                }
            }
        });

        let inbox = caller.spawn(caller_in);

        Ok(Self {
            caller,
            provider,
            tasks: vec![requests, answers, inbox],
        })
    }

    async fn with_math(response_timeout: Duration) -> Result<Self> {
        // ---
        let loopback = Self::new(response_timeout)?;
        loopback
            .provider
            .provide_handler("add", |req: AddRequest| async move {
                Ok(AddResponse { sum: req.a + req.b })
            })
            .await?;
        Ok(loopback)
    }

    fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

#[tokio::test]
async fn test_basic_request() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    common::init_logging();

    log::info!("Starting basic request test");

    let loopback = Loopback::with_math(Duration::from_secs(2)).await?;

    let resp: AddResponse = loopback
        .caller
        .request("add", AddRequest { a: 2, b: 3 })
        .await?;

    assert_eq!(resp.sum, 5);
    assert_eq!(loopback.caller.pending_calls(), 0);
    assert_eq!(loopback.provider.pending_acks(), 0);

    loopback.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests() {
    // ---
    #[cfg(feature = "logging")]
    common::init_logging();

    let loopback = Loopback::with_math(Duration::from_secs(2)).await.unwrap();

    let mut handles = Vec::new();

    for i in 0..10 {
        // ---
        let c = loopback.caller.clone();

        handles.push(tokio::spawn(async move {
            let resp: AddResponse = c.request("add", AddRequest { a: i, b: i }).await.unwrap();
            resp.sum
        }));
    }

    for (i, task) in handles.into_iter().enumerate() {
        let sum = task.await.unwrap();
        assert_eq!(sum, (i as i32) * 2);
    }
    assert_eq!(loopback.caller.pending_calls(), 0);
    loopback.shutdown();
}

#[tokio::test]
async fn test_unprovided_name() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    common::init_logging();

    let loopback = Loopback::with_math(Duration::from_secs(2)).await?;

    let result = loopback.caller.make("mul", &json!([2, 3])).await?.await;
    assert!(matches!(result, Err(RpcError::NoProviderAvailable)));

    loopback.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_declined_request() -> Result<()> {
    // ---
    let loopback = Loopback::new(Duration::from_secs(2))?;
    loopback
        .provider
        .provide("busy", |_, response: RpcResponse| async move {
            let _ = response.decline().await;
        })
        .await?;

    let result = loopback.caller.make("busy", &json!(null)).await?.await;
    assert!(matches!(result, Err(RpcError::NoProviderAvailable)));

    loopback.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_timeout() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    common::init_logging();

    let loopback = Loopback::new(Duration::from_millis(200))?;
    loopback
        .provider
        .provide("add", |_, response: RpcResponse| async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            let _ = response.respond(&0).await;
        })
        .await?;

    log::info!("test_timeout: sending 1 + 1");

    let result = loopback
        .caller
        .request::<_, AddResponse>("add", AddRequest { a: 1, b: 1 })
        .await;

    log::info!("test_timeout: {:?}", result);
    assert!(matches!(result, Err(RpcError::ResponseTimeout)));

    loopback.shutdown();
    Ok(())
}
