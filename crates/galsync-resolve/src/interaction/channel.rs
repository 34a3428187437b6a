use std::time::Duration;

use async_trait::async_trait;
use galsync_core::config::InteractionConfig;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::{InteractionGateway, InteractionRequest, InteractionResponse};

/// A question waiting for a front end to answer it.
#[derive(Debug)]
pub struct PendingInteraction {
    pub request: InteractionRequest,
    responder: oneshot::Sender<InteractionResponse>,
}

impl PendingInteraction {
    /// Send the answer back. Returns `false` if the asker already gave up.
    pub fn respond(self, response: InteractionResponse) -> bool {
        self.responder.send(response).is_ok()
    }
}

/// Gateway for event-loop front ends: each question is sent over a channel
/// and the calling task suspends until an answer arrives or the timeout
/// elapses, in which case the request's default applies.
pub struct ChannelGateway {
    tx: mpsc::Sender<PendingInteraction>,
    timeout: Duration,
}

impl ChannelGateway {
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<PendingInteraction>) {
        let (tx, rx) = mpsc::channel(8);
        (Self { tx, timeout }, rx)
    }

    /// Gateway whose unanswered prompts fall back after `interaction.timeout_secs`.
    pub fn from_config(config: &InteractionConfig) -> (Self, mpsc::Receiver<PendingInteraction>) {
        Self::new(Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl InteractionGateway for ChannelGateway {
    async fn respond(&self, request: InteractionRequest) -> InteractionResponse {
        let default = request.default_response();
        let kind = request.kind();
        let (responder, answer) = oneshot::channel();

        if self.tx.send(PendingInteraction { request, responder }).await.is_err() {
            warn!(kind, "no front end listening, using default");
            return default;
        }

        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                warn!(kind, "front end dropped the question, using default");
                default
            }
            Err(_) => {
                info!(kind, timeout_secs = self.timeout.as_secs(), "interaction timed out, using default");
                default
            }
        }
    }
}
