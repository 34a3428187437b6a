use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{InteractionGateway, InteractionRequest, InteractionResponse};

/// Test gateway: answers from a queue and records every question asked.
/// Once the queue runs dry each request gets its default answer.
pub(crate) struct ScriptedGateway {
    answers: Mutex<VecDeque<InteractionResponse>>,
    asked: Mutex<Vec<InteractionRequest>>,
}

impl ScriptedGateway {
    pub(crate) fn new(answers: impl IntoIterator<Item = InteractionResponse>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn silent() -> Self {
        Self::new([])
    }

    pub(crate) fn asked(&self) -> Vec<InteractionRequest> {
        self.asked.lock().unwrap().clone()
    }

    pub(crate) fn asked_count(&self) -> usize {
        self.asked.lock().unwrap().len()
    }
}

#[async_trait]
impl InteractionGateway for ScriptedGateway {
    async fn respond(&self, request: InteractionRequest) -> InteractionResponse {
        let default = request.default_response();
        self.asked.lock().unwrap().push(request);
        self.answers.lock().unwrap().pop_front().unwrap_or(default)
    }
}
