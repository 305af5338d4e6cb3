//! Client SDK runtime — binds a user identity to a live referral campaign and
//! drives the user through campaign checkpoints rendered in a web surface.

pub mod checkpoint;
pub mod config;
pub mod logging;
pub mod placement_url;
pub mod queue;
pub mod resolver;
pub mod services;
pub mod session;
pub mod surface;

pub use checkpoint::{CheckpointBuilder, CheckpointRequest};
pub use config::SdkConfig;
pub use logging::{LogLevel, SdkLogger};
pub use placement_url::PlacementUrlBuilder;
pub use queue::DeferredActionQueue;
pub use resolver::PlacementResolver;
pub use services::{CampaignService, HttpCampaignApi, IdentityService, StaticCampaignApi};
pub use session::{CampaignSession, SessionStatus, SkipReason, SubmitOutcome};
pub use surface::{SurfaceCallbacks, SurfaceHost, SurfaceRequest, WebSurface};
