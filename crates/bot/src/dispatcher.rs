//! Update dispatcher
//!
//! Activates exactly one delivery mode and hands every non-empty update to
//! the update handler.
//!
//! * Polling: a background task drains the subscription and spawns one
//!   detached task per update. Invocations are not awaited, retried or
//!   ordered, and a failing one never stops the loop.
//! * Webhook: the URL is registered once and `POST /hook/telegram` waits for
//!   each update's invocation before answering `200 OK`, regardless of the
//!   handler outcome.
//!
//! Both paths share the same empty-update filter.

use crate::client::{BotClient, UpdateStream};
use crate::handlers::{HandlerContext, UpdateHandler};
use crate::update::{InboundMessage, InboundUpdate};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chatgate_core::{webhook_target, DeliveryMode, StartupError, WEBHOOK_PATH};
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

/// Dispatcher before a delivery mode is active
#[derive(Clone)]
pub struct UpdateDispatcher {
    handler: Arc<dyn UpdateHandler>,
    ctx: HandlerContext,
}

/// The active delivery mode
pub enum Delivery {
    /// Consumer task draining the polling subscription
    Polling { consumer: JoinHandle<()> },

    /// Registered webhook and the route that receives it
    Webhook { url: Url, routes: Router },
}

impl UpdateDispatcher {
    pub fn new(handler: Arc<dyn UpdateHandler>, ctx: HandlerContext) -> Self {
        Self { handler, ctx }
    }

    /// Activate the delivery mode
    ///
    /// Consumes the dispatcher, so a process can only ever activate one mode.
    /// Webhook registration failure is startup-fatal; there is no fallback
    /// to polling.
    pub async fn activate<C>(
        self,
        mode: &DeliveryMode,
        client: &C,
        poll_timeout_secs: u32,
    ) -> Result<Delivery, StartupError>
    where
        C: BotClient + ?Sized,
    {
        match mode {
            DeliveryMode::Polling => {
                tracing::info!("Hook was not provided, starting bot with polling");

                let updates = client.subscribe_updates(poll_timeout_secs).await;
                let consumer = self.spawn_consumer(updates);

                Ok(Delivery::Polling { consumer })
            }
            DeliveryMode::Webhook { base_url } => {
                let url = webhook_target(base_url).map_err(|e| {
                    StartupError::WebhookRegistration {
                        url: format!("{}{}", base_url.trim_end_matches('/'), WEBHOOK_PATH),
                        reason: e.to_string(),
                    }
                })?;

                client.register_webhook(url.clone()).await.map_err(|e| {
                    StartupError::WebhookRegistration {
                        url: url.to_string(),
                        reason: format!("{e:#}"),
                    }
                })?;

                tracing::info!(url = %url, "✓ Webhook registration completed");

                Ok(Delivery::Webhook {
                    url,
                    routes: self.webhook_routes(),
                })
            }
        }
    }

    /// Spawn a detached handler invocation for one polled update
    ///
    /// Returns `None` when the update carries no message.
    pub fn dispatch(&self, update: InboundUpdate) -> Option<JoinHandle<()>> {
        let message = admit(update)?;
        let handler = Arc::clone(&self.handler);
        let ctx = self.ctx.clone();

        Some(tokio::spawn(async move {
            invoke(handler.as_ref(), &ctx, message).await;
        }))
    }

    /// Handle one pushed update and wait for the handler to finish
    ///
    /// The invocation runs in its own task so a panicking handler cannot
    /// unwind the caller. Returns whether the handler ran.
    pub async fn handle_inline(&self, update: InboundUpdate) -> bool {
        let Some(invocation) = self.dispatch(update) else {
            return false;
        };

        if let Err(e) = invocation.await {
            tracing::warn!("Update handler task failed: {}", e);
        }
        true
    }

    fn spawn_consumer(self, mut updates: UpdateStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                self.dispatch(update);
            }
            tracing::info!("Update subscription ended, polling consumer stopped");
        })
    }

    fn webhook_routes(self) -> Router {
        Router::new()
            .route(WEBHOOK_PATH, post(receive_update))
            .with_state(self)
    }
}

impl Delivery {
    pub const fn mode_name(&self) -> &'static str {
        match self {
            Self::Polling { .. } => "polling",
            Self::Webhook { .. } => "webhook",
        }
    }

    /// Register the delivery's routes, if any, on `router`
    ///
    /// Polling registers nothing and hands back its consumer task.
    pub fn mount(self, router: Router) -> (Router, Option<JoinHandle<()>>) {
        match self {
            Self::Polling { consumer } => (router, Some(consumer)),
            Self::Webhook { routes, .. } => (router.merge(routes), None),
        }
    }
}

/// Webhook endpoint; the platform always gets `200 OK`
async fn receive_update(State(dispatcher): State<UpdateDispatcher>, body: Bytes) -> StatusCode {
    match serde_json::from_slice::<InboundUpdate>(&body) {
        Ok(update) => {
            dispatcher.handle_inline(update).await;
        }
        Err(e) => {
            tracing::debug!("Ignoring undecodable webhook body: {}", e);
        }
    }

    StatusCode::OK
}

/// Empty-update filter shared by both delivery modes
fn admit(update: InboundUpdate) -> Option<InboundMessage> {
    let update_id = update.update_id;
    let message = update.into_message();

    if message.is_none() {
        tracing::debug!("Skipping update {} without message", update_id);
    }

    message
}

async fn invoke(handler: &dyn UpdateHandler, ctx: &HandlerContext, message: InboundMessage) {
    let chat_id = message.chat.id;
    let message_id = message.message_id;

    if let Err(e) = handler.handle(ctx, message).await {
        tracing::warn!(chat_id, message_id, "Update handler failed: {:#}", e);
    }
}
