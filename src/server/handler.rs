use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use super::RpcResponse;
use crate::{Result, RpcError};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased provider callback.
///
/// `call` runs the synchronous part of the provider (where it may turn off
/// auto-ack) and returns the rest as a future the broker spawns.
pub(crate) trait ProviderFn: Send + Sync {
    fn call(&self, payload: Value, response: RpcResponse) -> BoxFuture<'static, ()>;
}

/// Shared provider pointer, cloned out of the registry for each request.
pub(crate) type ProviderPtr = Arc<dyn ProviderFn>;

/// Raw provider: gets the decoded payload and the response handle, and
/// answers through the handle itself.
pub(crate) struct Provider<F, Fut>
where
    F: Fn(Value, RpcResponse) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> Provider<F, Fut>
where
    F: Fn(Value, RpcResponse) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    pub(crate) fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> ProviderFn for Provider<F, Fut>
where
    F: Fn(Value, RpcResponse) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, payload: Value, response: RpcResponse) -> BoxFuture<'static, ()> {
        Box::pin((self.func)(payload, response))
    }
}

/// Typed provider: the payload is deserialized into `TReq`, an `Ok(TResp)`
/// becomes the response, and an `Err` (or an undecodable request) becomes a
/// rejection carrying the error text.
pub(crate) struct TypedProvider<F, Fut, TReq, TResp>
where
    F: Fn(TReq) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TResp>> + Send,
    TReq: DeserializeOwned,
    TResp: Serialize,
{
    func: F,
    _phantom: PhantomData<fn(TReq, TResp, Fut)>,
}

impl<F, Fut, TReq, TResp> TypedProvider<F, Fut, TReq, TResp>
where
    F: Fn(TReq) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TResp>> + Send,
    TReq: DeserializeOwned,
    TResp: Serialize,
{
    pub(crate) fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut, TReq, TResp> ProviderFn for TypedProvider<F, Fut, TReq, TResp>
where
    F: Fn(TReq) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TResp>> + Send + 'static,
    TReq: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
{
    fn call(&self, payload: Value, response: RpcResponse) -> BoxFuture<'static, ()> {
        // ---
        let req: TReq = match serde_json::from_value(payload) {
            Ok(r) => r,
            Err(e) => {
                return Box::pin(async move {
                    finish(&response, response.reject(format!("invalid request: {e}")).await);
                })
            }
        };

        let fut = (self.func)(req);

        Box::pin(async move {
            // owned `Value`: `respond` keeps its argument borrowed across the send
            let sent = match fut.await.and_then(|resp| Ok(serde_json::to_value(resp)?)) {
                Ok(value) => response.respond(&value).await,
                Err(RpcError::Remote(code)) => response.reject(code).await,
                Err(e) => response.reject(e.to_string()).await,
            };
            finish(&response, sent);
        })
    }
}

fn finish(response: &RpcResponse, sent: Result<()>) {
    if let Err(_e) = sent {
        log_error!(
            "provider {} ({}) could not answer: {_e}",
            response.name(),
            response.correlation_id()
        );
    }
}
