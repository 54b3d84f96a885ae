//! RPC broker.
//!
//! The single entry and exit point of the crate. Outbound, it turns
//! [`make`](RpcBroker::make), [`provide`](RpcBroker::provide) and
//! [`unprovide`](RpcBroker::unprovide) into frames on the shared connection.
//! Inbound, [`handle`](RpcBroker::handle) routes every RPC frame to exactly
//! one of: a live outbound call, a local provider, or the subscription-ack
//! registry.
//!
//! # Concurrency
//!
//! The call index and the provider map each sit behind their own mutex. Locks
//! are held only for map operations and never across an `.await`; frames are
//! sent after the lock is released. Removing a call from the index is what
//! claims it for resolution, so a RESPONSE racing the call's own timeout
//! resolves it at most once and the loser sees an orphan.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::ack_timeout::AckTimeoutRegistry;
use crate::client::{Call, CallState, CallTable, Expiry, PendingCall};
use crate::events::{ClientEvent, ClientEventKind, EventEmitter};
use crate::protocol::CodecPtr;
use crate::server::{Provider, ProviderPtr, ProviderRegistry, RpcResponse, TypedProvider};
use crate::sync::lock_ignore_poison;
use crate::{
    // ---
    Action,
    ConnectionPtr,
    CorrelationId,
    Frame,
    FrameConsumer,
    IdGeneratorPtr,
    Result,
    RpcConfig,
    RpcError,
    RpcMessage,
    Topic,
    NO_RPC_PROVIDER,
};

/// How many times `make` asks the id generator for an id that is not live.
const MAX_ID_ATTEMPTS: usize = 8;

/// Error code sent back when an inbound request payload cannot be decoded.
const INVALID_PAYLOAD: &str = "INVALID_RPC_PAYLOAD";

/// Request/response correlation core for one connection.
///
/// Cheap to clone (internally `Arc`-backed). Build one with
/// [`RpcBrokerBuilder`](crate::RpcBrokerBuilder).
///
/// # Example
///
/// ```no_run
/// use busrpc::{create_memory_connection, RpcBrokerBuilder};
/// use serde_json::json;
///
/// # async fn example() -> busrpc::Result<()> {
/// let (connection, _outbox) = create_memory_connection();
/// let broker = RpcBrokerBuilder::new(connection).build()?;
///
/// let pending = broker.make("add", &json!({ "a": 1, "b": 2 })).await?;
/// // ... frames from the server are fed to `broker.handle(frame)` ...
/// let sum = pending.await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcBroker {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    connection: ConnectionPtr,
    codec: CodecPtr,
    ids: IdGeneratorPtr,
    config: RpcConfig,

    calls: Mutex<CallTable>,
    providers: Mutex<ProviderRegistry>,
    subscription_acks: AckTimeoutRegistry,
    events: EventEmitter,
}

impl RpcBroker {
    /// Create a broker (internal use by `RpcBrokerBuilder`).
    pub(crate) fn new(
        connection: ConnectionPtr,
        codec: CodecPtr,
        ids: IdGeneratorPtr,
        config: RpcConfig,
    ) -> Self {
        // ---
        let events = EventEmitter::new();
        let subscription_acks =
            AckTimeoutRegistry::new(Topic::Rpc, config.subscription_timeout, events.clone());

        Self {
            inner: Arc::new(Inner {
                connection,
                codec,
                ids,
                config,
                calls: Mutex::new(CallTable::new()),
                providers: Mutex::new(ProviderRegistry::new()),
                subscription_acks,
                events,
            }),
        }
    }

    /// Register a provider answering requests for `name`.
    ///
    /// The callback gets the decoded payload and an [`RpcResponse`] bound to
    /// the request; it answers through the handle. The synchronous part of
    /// the callback runs while the inbound frame is handled; the returned
    /// future is spawned.
    ///
    /// # Errors
    ///
    /// - `RpcError::AlreadyRegistered` if `name` already has a local provider
    /// - `RpcError::InvalidArgument` if `name` is empty
    /// - the connection's error if SUBSCRIBE cannot be sent; the
    ///   registration is rolled back
    pub async fn provide<F, Fut>(&self, name: &str, provider: F) -> Result<()>
    where
        F: Fn(Value, RpcResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_provider(name, Arc::new(Provider::new(provider)))
            .await
    }

    /// Register a typed provider for `name`.
    ///
    /// The request payload is deserialized into `TReq`. `Ok(resp)` is sent
    /// back as the response; `Err(e)` and undecodable requests are rejected
    /// with the error text as code.
    ///
    /// # Errors
    ///
    /// Same as [`provide`](Self::provide).
    pub async fn provide_handler<TReq, TResp, F, Fut>(&self, name: &str, handler: F) -> Result<()>
    where
        TReq: DeserializeOwned + Send + 'static,
        TResp: Serialize + Send + 'static,
        F: Fn(TReq) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResp>> + Send + 'static,
    {
        self.register_provider(name, Arc::new(TypedProvider::new(handler)))
            .await
    }

    async fn register_provider(&self, name: &str, provider: ProviderPtr) -> Result<()> {
        // ---
        require_name(name)?;

        lock_ignore_poison(&self.inner.providers).register(name, provider)?;
        self.inner.subscription_acks.add(name, Action::Subscribe);

        let sent = self
            .send(Frame::rpc(Action::Subscribe, vec![name.to_string()]))
            .await;

        if let Err(err) = sent {
            lock_ignore_poison(&self.inner.providers).remove(name);
            self.inner.subscription_acks.clear(name, Action::Subscribe);
            return Err(err);
        }

        log_debug!("providing RPC {name}");
        Ok(())
    }

    /// Stop providing `name`.
    ///
    /// A name with no local provider is a no-op: no frame, no error.
    ///
    /// # Errors
    ///
    /// The connection's error if UNSUBSCRIBE cannot be sent. The provider is
    /// removed locally either way.
    pub async fn unprovide(&self, name: &str) -> Result<()> {
        // ---
        let removed = lock_ignore_poison(&self.inner.providers).remove(name);
        if !removed {
            log_debug!("unprovide({name}): not provided, nothing to do");
            return Ok(());
        }

        self.inner.subscription_acks.add(name, Action::Unsubscribe);
        self.send(Frame::rpc(Action::Unsubscribe, vec![name.to_string()]))
            .await
    }

    /// Re-send SUBSCRIBE for every local provider, restarting their ack
    /// deadlines. Call after the connection has been re-established.
    ///
    /// # Errors
    ///
    /// The first send error; names after it are not re-subscribed.
    pub async fn resubscribe(&self) -> Result<()> {
        // ---
        let names = lock_ignore_poison(&self.inner.providers).names();
        log_info!("re-subscribing {} provider(s)", names.len());

        for name in names {
            self.inner.subscription_acks.add(&name, Action::Subscribe);
            self.send(Frame::rpc(Action::Subscribe, vec![name])).await?;
        }
        Ok(())
    }

    /// Call the remote RPC `name` with `payload`.
    ///
    /// Sends `REQUEST(name, correlationId, typed payload)` and returns a
    /// [`PendingCall`] that resolves with the response payload or the error
    /// that ended the call. The ack and response deadlines start now.
    ///
    /// # Errors
    ///
    /// Only setup failures are returned here:
    /// - `RpcError::InvalidArgument` if `name` is empty
    /// - `RpcError::Serialization` / `RpcError::Encoding` if the payload
    ///   cannot be encoded
    /// - `RpcError::IdCollision` if no free correlation id could be generated
    /// - the connection's error if REQUEST cannot be sent (nothing is left
    ///   pending in that case)
    pub async fn make<T>(&self, name: &str, payload: &T) -> Result<PendingCall>
    where
        T: Serialize + ?Sized,
    {
        // ---
        require_name(name)?;

        let value = serde_json::to_value(payload)?;
        let typed = self.inner.codec.encode(&value)?;

        let (tx, rx) = oneshot::channel();

        let correlation_id = {
            let mut calls = lock_ignore_poison(&self.inner.calls);
            let correlation_id = self.fresh_id(&calls)?;
            let serial = calls.next_serial();

            let mut call = Call::new(name, serial, tx);
            call.arm(
                self.spawn_timer(&correlation_id, serial, Expiry::Ack, self.inner.config.ack_timeout),
                self.spawn_timer(
                    &correlation_id,
                    serial,
                    Expiry::Response,
                    self.inner.config.response_timeout,
                ),
            );
            calls.insert(correlation_id.clone(), call);
            correlation_id
        };

        let request = Frame::rpc(
            Action::Request,
            vec![name.to_string(), correlation_id.to_string(), typed],
        );

        if let Err(err) = self.send(request).await {
            // never reached the wire; withdraw the call
            drop(lock_ignore_poison(&self.inner.calls).take(&correlation_id));
            return Err(err);
        }

        Ok(PendingCall::new(correlation_id, rx))
    }

    /// Typed convenience over [`make`](Self::make): send `req`, await the
    /// outcome, and deserialize the response into `TResp`.
    ///
    /// # Errors
    ///
    /// Anything `make` returns, the call's own failure (`AckTimeout`,
    /// `ResponseTimeout`, `NoProviderAvailable`, `Remote`), or
    /// `RpcError::Serialization` if the response does not fit `TResp`.
    pub async fn request<TReq, TResp>(&self, name: &str, req: TReq) -> Result<TResp>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        let value = self.make(name, &req).await?.await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Route one inbound frame.
    ///
    /// Frames on other topics are ignored. Frames that match no live call
    /// (already resolved, timed out, or never ours) are discarded; late
    /// frames racing a timeout are expected.
    ///
    /// # Errors
    ///
    /// - `RpcError::InvalidFrame` if the frame's fields do not fit its
    ///   action (also reported as a `MessageParseError` event)
    /// - the connection's error if an answer to an inbound request cannot be
    ///   sent
    pub async fn handle(&self, frame: Frame) -> Result<()> {
        // ---
        if frame.topic != Topic::Rpc {
            log_debug!("ignoring {} frame on topic {}", frame.action, frame.topic);
            return Ok(());
        }

        let message = match RpcMessage::parse(&frame) {
            Ok(message) => message,
            Err(err) => {
                self.inner.events.emit(ClientEvent::new(
                    Topic::Rpc,
                    ClientEventKind::MessageParseError,
                    format!("{err} (raw: {:?})", frame.raw),
                ));
                return Err(err);
            }
        };

        match message {
            RpcMessage::Request {
                name,
                correlation_id,
                payload,
            } => self.respond_to_request(name, correlation_id, &payload).await,

            RpcMessage::SubscriptionAck { action, name } => {
                if !self.inner.subscription_acks.clear(&name, action) {
                    log_debug!("unsolicited {} ack for {name}", action.code());
                }
                Ok(())
            }

            RpcMessage::Ack {
                name,
                correlation_id,
            } => {
                self.inner.acknowledge(&name, &correlation_id);
                Ok(())
            }

            RpcMessage::Response {
                name,
                correlation_id,
                payload,
            } => {
                if let Some(call) = self.inner.claim(&name, &correlation_id) {
                    match self.inner.codec.decode(&payload) {
                        Ok(value) => call.resolve(value),
                        Err(err) => call.fail(err),
                    }
                }
                Ok(())
            }

            RpcMessage::Error {
                code,
                name,
                correlation_id,
            } => {
                if let Some(call) = self.inner.claim(&name, &correlation_id) {
                    call.fail(RpcError::from_remote_code(&code));
                }
                Ok(())
            }
        }
    }

    /// Spawn a receive loop feeding `inbox` into [`handle`](Self::handle),
    /// in arrival order.
    pub fn spawn(&self, inbox: mpsc::Receiver<Frame>) -> JoinHandle<()> {
        crate::run(self.clone(), inbox)
    }

    /// Subscribe to client error events (subscription ack timeouts, parse
    /// errors).
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Number of outbound calls still awaiting resolution.
    pub fn pending_calls(&self) -> usize {
        lock_ignore_poison(&self.inner.calls).len()
    }

    /// State of a live call; `None` once it has been resolved or failed.
    pub fn call_state(&self, correlation_id: &CorrelationId) -> Option<CallState> {
        lock_ignore_poison(&self.inner.calls).state(correlation_id)
    }

    /// Whether a local provider is registered for `name`.
    pub fn is_providing(&self, name: &str) -> bool {
        lock_ignore_poison(&self.inner.providers).contains(name)
    }

    /// Number of subscribe/unsubscribe acknowledgments still outstanding.
    pub fn pending_acks(&self) -> usize {
        self.inner.subscription_acks.pending()
    }

    /// Timeouts this broker enforces.
    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    async fn respond_to_request(
        &self,
        name: String,
        correlation_id: CorrelationId,
        payload: &str,
    ) -> Result<()> {
        // ---
        let provider = lock_ignore_poison(&self.inner.providers).get(&name);

        let Some(provider) = provider else {
            log_debug!("no local provider for {name} ({correlation_id})");
            return self
                .send(Frame::rpc(
                    Action::Error,
                    vec![NO_RPC_PROVIDER.to_string(), name, correlation_id.to_string()],
                ))
                .await;
        };

        let response = RpcResponse::new(
            self.inner.connection.clone(),
            self.inner.codec.clone(),
            name,
            correlation_id,
        );

        let value = match self.inner.codec.decode(payload) {
            Ok(value) => value,
            Err(_err) => {
                log_warn!(
                    "undecodable request for {} ({}): {_err}",
                    response.name(),
                    response.correlation_id()
                );
                return response.reject(INVALID_PAYLOAD).await;
            }
        };

        let work = provider.call(value, response.clone());

        if response.auto_ack() {
            match response.ack().await {
                Ok(()) | Err(RpcError::MultipleResponse { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        tokio::spawn(work);
        Ok(())
    }

    fn fresh_id(&self, calls: &CallTable) -> Result<CorrelationId> {
        // ---
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.inner.ids.next_id();
            if !calls.contains(&id) {
                return Ok(id);
            }
            log_debug!("correlation id {id} is still live, drawing another");
        }
        Err(RpcError::IdCollision)
    }

    fn spawn_timer(
        &self,
        correlation_id: &CorrelationId,
        serial: u64,
        expiry: Expiry,
        after: Duration,
    ) -> JoinHandle<()> {
        // ---
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let correlation_id = correlation_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&correlation_id, serial, expiry);
            }
        })
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        self.inner.connection.send_frame(frame).await
    }
}

impl Inner {
    fn acknowledge(&self, name: &str, correlation_id: &CorrelationId) {
        // ---
        let mut calls = lock_ignore_poison(&self.calls);
        match calls.get_mut(correlation_id) {
            Some(call) => {
                if !call.acknowledge() {
                    log_debug!("duplicate ack for {name} ({correlation_id})");
                }
            }
            None => {
                log_debug!("orphan ack for {name} ({correlation_id})");
            }
        }
    }

    /// Take a call out of the index for resolution.
    fn claim(&self, _name: &str, correlation_id: &CorrelationId) -> Option<Call> {
        // ---
        let call = lock_ignore_poison(&self.calls).take(correlation_id);
        match &call {
            Some(_call) if _call.name() != _name => {
                log_debug!(
                    "frame for {_name} resolves {correlation_id}, which was made for {}",
                    _call.name()
                );
            }
            Some(_) => {}
            None => {
                log_debug!("orphan frame for {_name} ({correlation_id}) discarded");
            }
        }
        call
    }

    /// A call timer fired. No-op unless the same call is still live and the
    /// timer still applies to its state.
    fn expire(&self, correlation_id: &CorrelationId, serial: u64, expiry: Expiry) {
        // ---
        let call = lock_ignore_poison(&self.calls).take_if(correlation_id, serial, |call| {
            call.is_expirable_by(expiry)
        });

        if let Some(call) = call {
            let err = call.timeout_error();
            log_debug!("RPC {} ({correlation_id}) timed out: {err}", call.name());
            call.fail(err);
        }
    }
}

#[async_trait::async_trait]
impl FrameConsumer for RpcBroker {
    async fn handle_frame(&self, frame: Frame) -> Result<()> {
        self.handle(frame).await
    }

    fn report_parse_error(&self, err: RpcError) {
        self.inner.events.emit(ClientEvent::new(
            Topic::Rpc,
            ClientEventKind::MessageParseError,
            err.to_string(),
        ));
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RpcError::InvalidArgument("RPC name must not be empty".into()));
    }
    Ok(())
}
