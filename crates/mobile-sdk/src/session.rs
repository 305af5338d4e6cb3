//! Campaign session — initialization/identification lifecycle, the active
//! campaign, customer and checkpoint list, and checkpoint execution.
//!
//! One `CampaignSession` is owned by the host and shared by reference.
//! State transitions are guarded by a read/write lock; identify calls are
//! serialized by an async mutex and are the only suspension point.
//!
//! Operations submitted before identification completes are queued and
//! replayed in order right after the next successful identify. Operations
//! submitted while that replay runs go to its next cycle.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};

use campaign_core::event_bus::NavigationEventBus;
use campaign_core::types::{
    Campaign, Checkpoint, CustomProperties, Customer, Environment, IdentifyRequest,
};
use campaign_core::{SdkError, SdkResult};

use crate::checkpoint::{CheckpointBuilder, CheckpointRequest};
use crate::config::{validate_base_url, SdkConfig};
use crate::logging::{LogLevel, LogSink, SdkLogger, TracingSink};
use crate::placement_url::PlacementUrlBuilder;
use crate::queue::DeferredActionQueue;
use crate::resolver::PlacementResolver;
use crate::services::{CampaignService, HttpCampaignApi, IdentityService};
use crate::surface::{SurfaceCallbacks, SurfaceHost, SurfaceRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    Uninitialized,
    /// Initialized, no customer identified.
    Initialized,
    Identifying,
    Identified,
}

/// What happened to a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Waiting for identification to complete.
    Queued,
    /// A new surface was opened.
    Opened,
    /// A navigate event was published to the open surface.
    Navigated,
    /// Nothing to do; the reason is logged.
    Skipped(SkipReason),
    /// Opening or navigating the surface failed; onInvalid was invoked.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownCheckpoint,
    NoPlacement,
    PlacementNotFound,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UnknownCheckpoint => "checkpoint not found",
            Self::NoPlacement => "checkpoint has no placement",
            Self::PlacementNotFound => "placement not found in campaign",
        })
    }
}

/// For hosts that treat a skipped operation as a failure.
impl From<SkipReason> for SdkError {
    fn from(reason: SkipReason) -> Self {
        SdkError::Resolution(reason.to_string())
    }
}

/// Operation waiting in the deferred queue.
pub(crate) enum DeferredAction {
    Checkpoint {
        request: CheckpointRequest,
        host: Arc<dyn SurfaceHost>,
    },
    OpenPlacement {
        placement_id: String,
        callbacks: SurfaceCallbacks,
        host: Arc<dyn SurfaceHost>,
    },
    Navigate {
        placement_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credentials {
    access_key: String,
    environment: Environment,
}

struct SessionState {
    status: SessionStatus,
    credentials: Option<Credentials>,
    /// Bumped on every initialize; an identify started under an older epoch is discarded.
    epoch: u64,
    ui_base_url: String,
    campaign: Option<Campaign>,
    customer: Option<Customer>,
    checkpoints: Vec<Checkpoint>,
}

/// A placement resolved to its destination.
struct Destination {
    placement_id: String,
    url: String,
    background_color: Option<String>,
}

pub struct CampaignSession {
    state: RwLock<SessionState>,
    identify_lock: tokio::sync::Mutex<()>,
    queue: DeferredActionQueue<DeferredAction>,
    bus: NavigationEventBus,
    identity: Arc<dyn IdentityService>,
    campaigns: Arc<dyn CampaignService>,
    logger: SdkLogger,
}

impl CampaignSession {
    pub fn new(
        config: &SdkConfig,
        identity: Arc<dyn IdentityService>,
        campaigns: Arc<dyn CampaignService>,
    ) -> SdkResult<Self> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(SessionState {
                status: SessionStatus::Uninitialized,
                credentials: None,
                epoch: 0,
                ui_base_url: config.ui_base_url.clone(),
                campaign: None,
                customer: None,
                checkpoints: Vec::new(),
            }),
            identify_lock: tokio::sync::Mutex::new(()),
            queue: DeferredActionQueue::new(),
            bus: NavigationEventBus::new(),
            identity,
            campaigns,
            logger: SdkLogger::new(
                config.enable_sdk_logging,
                config.log_level,
                Arc::new(TracingSink),
            ),
        })
    }

    /// Session backed by the REST campaign API.
    pub fn with_http(config: &SdkConfig) -> SdkResult<Self> {
        let api = Arc::new(HttpCampaignApi::from_config(config)?);
        Self::new(config, api.clone(), api)
    }

    /// Route SDK log records to `sink` instead of `tracing`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.logger = SdkLogger::new(self.logger.is_enabled(), self.logger.min_level(), sink);
        self
    }

    /// Share an existing navigation bus (e.g. one the host's surfaces already use).
    pub fn with_navigation_bus(mut self, bus: NavigationEventBus) -> Self {
        self.bus = bus;
        self
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Record the access key and environment. Calling it again only replaces
    /// them: an identified customer, campaign and checkpoints are kept. When
    /// the credentials change, an identify still in flight is discarded.
    pub fn initialize(&self, access_key: &str, environment: Environment) -> SdkResult<()> {
        if access_key.trim().is_empty() {
            self.logger
                .error("Failed to initialize: access key cannot be empty");
            return Err(SdkError::Configuration("access key cannot be empty".into()));
        }

        let credentials = Credentials {
            access_key: access_key.to_string(),
            environment,
        };
        let mut state = self.state.write();
        let changed = state.credentials.as_ref() != Some(&credentials);
        if changed {
            state.epoch += 1;
            state.credentials = Some(credentials);
        }
        if state.status == SessionStatus::Uninitialized {
            state.status = SessionStatus::Initialized;
        }
        let status = state.status;
        drop(state);

        info!(%environment, changed, ?status, "campaign session initialized");
        self.logger
            .info(format!("SDK initialized for {environment} environment"));
        Ok(())
    }

    /// Identify the customer, then load the live campaign and its checkpoints.
    ///
    /// On success the deferred queue is replayed before this returns. If the
    /// customer or campaign fetch fails nothing is applied. A failed
    /// checkpoint fetch still identifies the customer, with no checkpoints.
    pub async fn identify(
        &self,
        external_user_id: &str,
        email: &str,
        name: &str,
        custom_properties: Option<CustomProperties>,
    ) -> SdkResult<Customer> {
        if !self.is_initialized() {
            self.logger.error(
                "Failed to identify user: SDK not initialized. Call initialize() first.",
            );
            return Err(SdkError::Configuration("SDK not initialized".into()));
        }
        if external_user_id.trim().is_empty() {
            self.logger
                .error("Failed to identify user: externalUserId cannot be empty");
            return Err(SdkError::Validation("externalUserId cannot be empty".into()));
        }
        if email.trim().is_empty() {
            self.logger
                .error("Failed to identify user: email cannot be empty");
            return Err(SdkError::Validation("email cannot be empty".into()));
        }

        let request = IdentifyRequest {
            external_user_id: external_user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            custom_properties,
        };

        let _serial = self.identify_lock.lock().await;

        let (credentials, epoch, previous) = {
            let mut state = self.state.write();
            let Some(credentials) = state.credentials.clone() else {
                return Err(SdkError::Configuration("SDK not initialized".into()));
            };
            let previous = state.status;
            if previous == SessionStatus::Initialized {
                state.status = SessionStatus::Identifying;
            }
            (credentials, state.epoch, previous)
        };
        debug!(external_user_id, "identify started");

        let (customer, campaign, checkpoints) = match self.fetch_identity(&credentials, &request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let mut state = self.state.write();
                if state.status == SessionStatus::Identifying {
                    state.status = previous;
                }
                drop(state);
                self.logger
                    .error(format!("Failed to identify user or fetch campaign: {e}"));
                return Err(e);
            }
        };

        let drain = {
            let mut state = self.state.write();
            if state.epoch != epoch {
                if state.status == SessionStatus::Identifying {
                    state.status = previous;
                }
                drop(state);
                self.logger
                    .warn("Discarding identify result: credentials changed while it was in flight");
                return Err(SdkError::Configuration(
                    "credentials changed during identify".into(),
                ));
            }
            state.customer = Some(customer.clone());
            state.campaign = Some(campaign);
            state.checkpoints = checkpoints;
            state.status = SessionStatus::Identified;
            // Claim the queue before releasing the lock so later submissions
            // line up behind the ones already waiting.
            self.queue.start_drain()
        };

        info!(customer_id = %customer.id, "customer identified");
        self.logger
            .info(format!("Customer identified: {}", customer.id));

        if let Some(drain) = drain {
            let replayed = drain.run(|action| self.run_deferred(action));
            self.logger
                .debug(format!("Processed identify completion queue ({replayed} actions)"));
        }

        Ok(customer)
    }

    async fn fetch_identity(
        &self,
        credentials: &Credentials,
        request: &IdentifyRequest,
    ) -> SdkResult<(Customer, Campaign, Vec<Checkpoint>)> {
        let customer = self
            .identity
            .identify(&credentials.access_key, request)
            .await?;
        let campaign = self
            .campaigns
            .get_live_campaign(&credentials.access_key, credentials.environment, &customer.id)
            .await?;

        let checkpoints = match self
            .campaigns
            .get_campaign_checkpoints(&credentials.access_key, &campaign.id)
            .await
        {
            Ok(checkpoints) => {
                self.logger
                    .info(format!("Fetched {} campaign checkpoints", checkpoints.len()));
                checkpoints
            }
            Err(e) => {
                self.logger
                    .error(format!("Failed to fetch campaign checkpoints: {e}"));
                Vec::new()
            }
        };

        Ok((customer, campaign, checkpoints))
    }

    /// Clear the customer and checkpoints; the campaign is kept.
    pub fn reset_session(&self) {
        let mut state = self.state.write();
        state.customer = None;
        state.checkpoints.clear();
        if state.status > SessionStatus::Initialized {
            state.status = SessionStatus::Initialized;
        }
        drop(state);
        self.logger.info("User session cleared");
    }

    // ─── Checkpoints and placements ─────────────────────────────────────

    pub fn checkpoint(&self, name: impl Into<String>) -> CheckpointBuilder<'_> {
        match self.status() {
            SessionStatus::Uninitialized => self.logger.error(
                "Cannot create checkpoint: SDK not initialized. Call initialize() first.",
            ),
            SessionStatus::Identified => {}
            _ => self
                .logger
                .warn("User not identified yet. Checkpoint will run after identification."),
        }
        CheckpointBuilder::new(self, name)
    }

    pub fn submit(
        &self,
        request: CheckpointRequest,
        host: Arc<dyn SurfaceHost>,
    ) -> SdkResult<SubmitOutcome> {
        let name = request.name().to_string();
        match self.admit(DeferredAction::Checkpoint { request, host }, "trigger checkpoint")? {
            Some(action) => Ok(self.run(action)),
            None => {
                self.logger
                    .warn(format!("User not identified yet. Queueing checkpoint '{name}'."));
                Ok(SubmitOutcome::Queued)
            }
        }
    }

    /// Open a placement directly by identifier.
    pub fn open_placement(
        &self,
        placement_id: &str,
        callbacks: SurfaceCallbacks,
        host: Arc<dyn SurfaceHost>,
    ) -> SdkResult<SubmitOutcome> {
        self.require_placement_id(placement_id)?;
        let action = DeferredAction::OpenPlacement {
            placement_id: placement_id.to_string(),
            callbacks,
            host,
        };
        match self.admit(action, "open placement")? {
            Some(action) => Ok(self.run(action)),
            None => {
                self.logger.warn(format!(
                    "User not identified yet. Queueing placement '{placement_id}'."
                ));
                Ok(SubmitOutcome::Queued)
            }
        }
    }

    /// Send the open surface to a placement.
    pub fn navigate(&self, placement_id: &str) -> SdkResult<SubmitOutcome> {
        self.require_placement_id(placement_id)?;
        let action = DeferredAction::Navigate {
            placement_id: placement_id.to_string(),
        };
        match self.admit(action, "navigate")? {
            Some(action) => Ok(self.run(action)),
            None => {
                self.logger.warn(format!(
                    "User not identified yet. Queueing navigation to '{placement_id}'."
                ));
                Ok(SubmitOutcome::Queued)
            }
        }
    }

    /// Tell the backend the current campaign is being displayed.
    pub async fn ping_campaign(&self) -> SdkResult<()> {
        let (access_key, campaign_id) = {
            let state = self.state.read();
            match (&state.credentials, &state.campaign) {
                (Some(credentials), Some(campaign)) => {
                    (credentials.access_key.clone(), campaign.id.clone())
                }
                _ => {
                    return Err(SdkError::Configuration("no campaign loaded".into()));
                }
            }
        };
        self.campaigns.ping(&access_key, &campaign_id).await
    }

    /// Returns the action back when it can run now, or `None` once queued.
    /// The state lock is held across the check so an identify cannot commit
    /// between the status read and the enqueue.
    fn admit(&self, action: DeferredAction, operation: &str) -> SdkResult<Option<DeferredAction>> {
        let state = self.state.read();
        if state.status == SessionStatus::Uninitialized {
            drop(state);
            self.logger.error(format!(
                "Cannot {operation}: SDK not initialized. Call initialize() first."
            ));
            return Err(SdkError::Configuration(format!(
                "cannot {operation}: SDK not initialized"
            )));
        }
        let ready = state.status == SessionStatus::Identified;
        Ok(self.queue.defer_unless_ready(action, ready))
    }

    fn require_placement_id(&self, placement_id: &str) -> SdkResult<()> {
        if placement_id.trim().is_empty() {
            self.logger.error("Placement ID cannot be empty");
            return Err(SdkError::Validation("placement id cannot be empty".into()));
        }
        Ok(())
    }

    fn run_deferred(&self, action: DeferredAction) {
        let outcome = self.run(action);
        debug!(?outcome, "deferred action replayed");
    }

    fn run(&self, action: DeferredAction) -> SubmitOutcome {
        match action {
            DeferredAction::Checkpoint { request, host } => self.execute_checkpoint(&request, host),
            DeferredAction::OpenPlacement {
                placement_id,
                callbacks,
                host,
            } => match self.destination(&placement_id) {
                Ok(destination) => self.open_surface(destination, callbacks, host),
                Err(reason) => SubmitOutcome::Skipped(reason),
            },
            DeferredAction::Navigate { placement_id } => match self.destination(&placement_id) {
                Ok(destination) => {
                    self.publish(&destination);
                    SubmitOutcome::Navigated
                }
                Err(reason) => SubmitOutcome::Skipped(reason),
            },
        }
    }

    fn execute_checkpoint(
        &self,
        request: &CheckpointRequest,
        host: Arc<dyn SurfaceHost>,
    ) -> SubmitOutcome {
        let name = request.name();
        let placement_id = {
            let state = self.state.read();
            let Some(checkpoint) = PlacementResolver::find_checkpoint(&state.checkpoints, name)
            else {
                drop(state);
                self.logger
                    .debug(format!("Checkpoint with name '{name}' not found."));
                return SubmitOutcome::Skipped(SkipReason::UnknownCheckpoint);
            };
            match checkpoint.target_placement() {
                Some(id) => id.to_string(),
                None => {
                    drop(state);
                    self.logger
                        .debug(format!("Checkpoint '{name}' does not have a placement."));
                    return SubmitOutcome::Skipped(SkipReason::NoPlacement);
                }
            }
        };

        let destination = match self.destination(&placement_id) {
            Ok(destination) => destination,
            Err(reason) => return SubmitOutcome::Skipped(reason),
        };

        if request.navigate() {
            let callbacks = request.callbacks();
            let navigated = catch_unwind(AssertUnwindSafe(|| {
                self.publish(&destination);
                callbacks.success();
            }));
            match navigated {
                Ok(()) => SubmitOutcome::Navigated,
                Err(_) => {
                    self.logger.error(format!(
                        "Error navigating to placement {}",
                        destination.placement_id
                    ));
                    callbacks.invalid();
                    SubmitOutcome::Invalid
                }
            }
        } else {
            self.open_surface(destination, request.callbacks().clone(), host)
        }
    }

    /// Resolve a placement in the current campaign and build its URL.
    fn destination(&self, placement_id: &str) -> Result<Destination, SkipReason> {
        let state = self.state.read();
        let found = state.campaign.as_ref().zip(state.credentials.as_ref()).and_then(
            |(campaign, credentials)| {
                PlacementResolver::resolve(campaign, placement_id).map(|placement| Destination {
                    placement_id: placement_id.to_string(),
                    url: PlacementUrlBuilder::new(&state.ui_base_url).build(
                        placement,
                        &credentials.access_key,
                        &campaign.id,
                        state.customer.as_ref().map(|c| c.id.as_str()),
                    ),
                    background_color: placement.background_color().map(str::to_string),
                })
            },
        );
        drop(state);

        found.ok_or_else(|| {
            self.logger
                .warn(format!("Placement {placement_id} not found in campaign"));
            SkipReason::PlacementNotFound
        })
    }

    fn publish(&self, destination: &Destination) {
        let delivered = self
            .bus
            .publish(&destination.url, destination.background_color.as_deref());
        self.logger.debug(format!(
            "Navigating to placement {} with URL: {} ({delivered} listeners)",
            destination.placement_id, destination.url
        ));
    }

    fn open_surface(
        &self,
        destination: Destination,
        callbacks: SurfaceCallbacks,
        host: Arc<dyn SurfaceHost>,
    ) -> SubmitOutcome {
        let request = SurfaceRequest {
            url: destination.url.clone(),
            background_color: destination.background_color.clone(),
            callbacks: callbacks.clone(),
        };
        let result = catch_unwind(AssertUnwindSafe(|| host.open(request)))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("surface host panicked")));

        match result {
            Ok(()) => {
                self.logger.debug(format!(
                    "Opened placement {} with URL: {}",
                    destination.placement_id, destination.url
                ));
                SubmitOutcome::Opened
            }
            Err(e) => {
                self.logger.error(format!(
                    "Error opening placement {}: {e}",
                    destination.placement_id
                ));
                callbacks.invalid();
                SubmitOutcome::Invalid
            }
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn is_initialized(&self) -> bool {
        self.status() != SessionStatus::Uninitialized
    }

    pub fn is_identified(&self) -> bool {
        self.status() == SessionStatus::Identified
    }

    pub fn current_campaign(&self) -> Option<Campaign> {
        self.state.read().campaign.clone()
    }

    pub fn current_customer(&self) -> Option<Customer> {
        self.state.read().customer.clone()
    }

    pub fn campaign_checkpoints(&self) -> Vec<Checkpoint> {
        self.state.read().checkpoints.clone()
    }

    /// Operations waiting for identification.
    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    pub fn navigation_bus(&self) -> &NavigationEventBus {
        &self.bus
    }

    pub fn set_logging_enabled(&self, enabled: bool, level: LogLevel) {
        self.logger.set_enabled(enabled, level);
        self.logger.info(format!(
            "Logging {} at level {level:?}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    /// Point placement URLs at a different UI origin (staging, sample apps).
    /// The API origin belongs to the service collaborators and is fixed when
    /// they are built; use [`SdkConfig::api_base_url`] with
    /// [`with_http`](Self::with_http) to change it.
    pub fn set_ui_base_url(&self, ui_base_url: &str) -> SdkResult<()> {
        validate_base_url("ui_base_url", ui_base_url)?;
        self.state.write().ui_base_url = ui_base_url.to_string();
        self.logger.debug(format!("UI base URL set to {ui_base_url}"));
        Ok(())
    }
}
