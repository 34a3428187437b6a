use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::InteractionGateway;

/// The single interaction lock.
///
/// Only one prompt is outstanding process-wide. Callers that run a
/// lookup → prompt → mutate sequence hold the guard for the whole sequence.
#[derive(Clone)]
pub struct InteractionGate {
    gateway: Arc<dyn InteractionGateway>,
    lock: Arc<Mutex<()>>,
}

/// Exclusive access to the gateway while held.
pub struct GateGuard<'a> {
    gateway: &'a (dyn InteractionGateway + 'static),
    _guard: MutexGuard<'a, ()>,
}

impl InteractionGate {
    pub fn new(gateway: Arc<dyn InteractionGateway>) -> Self {
        Self {
            gateway,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn acquire(&self) -> GateGuard<'_> {
        let guard = self.lock.lock().await;
        GateGuard {
            gateway: self.gateway.as_ref(),
            _guard: guard,
        }
    }
}

impl Deref for GateGuard<'_> {
    type Target = dyn InteractionGateway;

    fn deref(&self) -> &Self::Target {
        self.gateway
    }
}
