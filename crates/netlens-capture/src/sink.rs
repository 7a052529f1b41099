//! At-most-once result delivery.

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::CaptureError;
use crate::model::CaptureResult;

pub type CaptureOutcome = Result<CaptureResult, CaptureError>;

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The caller dropped its receiver.
    CallerGone,
    /// A result was already delivered; this one is discarded.
    AlreadyDelivered,
}

/// Holds the caller's reply channel until the first delivery.
#[derive(Debug)]
pub struct ResultSink {
    reply: Option<oneshot::Sender<CaptureOutcome>>,
}

impl ResultSink {
    pub fn new(reply: oneshot::Sender<CaptureOutcome>) -> Self {
        Self { reply: Some(reply) }
    }

    pub fn is_pending(&self) -> bool {
        self.reply.is_some()
    }

    pub fn deliver(&mut self, outcome: CaptureOutcome) -> Delivery {
        let Some(reply) = self.reply.take() else {
            warn!("Discarding duplicate capture result");
            return Delivery::AlreadyDelivered;
        };
        match reply.send(outcome) {
            Ok(()) => Delivery::Delivered,
            Err(_) => {
                debug!("Capture caller went away before the result was ready");
                Delivery::CallerGone
            }
        }
    }
}
