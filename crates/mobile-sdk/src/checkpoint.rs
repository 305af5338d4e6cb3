//! Checkpoint requests — an immutable description of a checkpoint trigger,
//! built fluently and handed to the session for execution.

use std::sync::Arc;

use campaign_core::SdkResult;

use crate::session::{CampaignSession, SubmitOutcome};
use crate::surface::{SurfaceCallbacks, SurfaceHost};

#[derive(Debug, Clone)]
pub struct CheckpointRequest {
    name: String,
    navigate: bool,
    callbacks: SurfaceCallbacks,
}

impl CheckpointRequest {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Navigate the open surface instead of opening a new one.
    pub fn navigate(&self) -> bool {
        self.navigate
    }

    pub fn callbacks(&self) -> &SurfaceCallbacks {
        &self.callbacks
    }
}

/// Fluent builder returned by [`CampaignSession::checkpoint`]. Setting the
/// same option twice keeps the latest value.
pub struct CheckpointBuilder<'s> {
    session: &'s CampaignSession,
    request: CheckpointRequest,
}

impl<'s> CheckpointBuilder<'s> {
    pub(crate) fn new(session: &'s CampaignSession, name: impl Into<String>) -> Self {
        Self {
            session,
            request: CheckpointRequest {
                name: name.into(),
                navigate: false,
                callbacks: SurfaceCallbacks::default(),
            },
        }
    }

    pub fn on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.request.callbacks.on_close = Some(Arc::new(callback));
        self
    }

    pub fn on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.request.callbacks.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_invalid(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.request.callbacks.on_invalid = Some(Arc::new(callback));
        self
    }

    pub fn navigate(mut self, navigate: bool) -> Self {
        self.request.navigate = navigate;
        self
    }

    pub fn build(self) -> CheckpointRequest {
        self.request
    }

    /// Hand the finished request to the session.
    pub fn submit(self, host: Arc<dyn SurfaceHost>) -> SdkResult<SubmitOutcome> {
        let session = self.session;
        session.submit(self.request, host)
    }
}
