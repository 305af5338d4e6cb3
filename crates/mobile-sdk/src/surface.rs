//! Modal web surface — the host collaborator that renders placements, the
//! bridge messages it sends back, and a controller that ties a renderer to
//! completion callbacks and the navigation bus.

use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use campaign_core::event_bus::{NavigateEvent, NavigationEventBus, Subscription};
use campaign_core::SdkResult;

pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Completion callbacks wired to a surface's close/success/invalid signals.
#[derive(Clone, Default)]
pub struct SurfaceCallbacks {
    pub on_close: Option<Callback>,
    pub on_success: Option<Callback>,
    pub on_invalid: Option<Callback>,
}

impl SurfaceCallbacks {
    pub fn close(&self) {
        if let Some(cb) = &self.on_close {
            cb();
        }
    }

    pub fn success(&self) {
        if let Some(cb) = &self.on_success {
            cb();
        }
    }

    pub fn invalid(&self) {
        if let Some(cb) = &self.on_invalid {
            cb();
        }
    }
}

impl std::fmt::Debug for SurfaceCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceCallbacks")
            .field("on_close", &self.on_close.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_invalid", &self.on_invalid.is_some())
            .finish()
    }
}

/// Everything a host needs to open a placement.
#[derive(Debug, Clone)]
pub struct SurfaceRequest {
    pub url: String,
    pub background_color: Option<String>,
    pub callbacks: SurfaceCallbacks,
}

/// Host application capability to open a full-screen web surface.
pub trait SurfaceHost: Send + Sync {
    fn open(&self, request: SurfaceRequest) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SharedData {
    #[serde(default)]
    pub title: Option<String>,
}

/// Message posted by the page running inside the surface.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BridgeMessage {
    Close,
    Success,
    Invalid,
    Shared {
        #[serde(default)]
        data: Option<SharedData>,
    },
}

impl BridgeMessage {
    pub fn parse(raw: &str) -> SdkResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Non-empty share title carried by a `shared` message.
    pub fn share_title(&self) -> Option<&str> {
        match self {
            Self::Shared { data: Some(data) } => data.title.as_deref().filter(|t| !t.is_empty()),
            _ => None,
        }
    }
}

/// The platform view a [`WebSurface`] drives.
pub trait SurfaceRenderer: Send + Sync {
    fn load_url(&self, url: &str) -> anyhow::Result<()>;
    fn set_background_color(&self, color: &str) -> anyhow::Result<()>;
    fn share_text(&self, text: &str) -> anyhow::Result<()>;
    fn dismiss(&self);
}

/// Controller for one open surface. Listens for navigate events while open
/// and stops listening when closed or dropped.
pub struct WebSurface {
    renderer: Arc<dyn SurfaceRenderer>,
    callbacks: Mutex<Option<SurfaceCallbacks>>,
    subscription: Mutex<Option<Subscription>>,
}

impl WebSurface {
    pub fn open(
        bus: &NavigationEventBus,
        request: SurfaceRequest,
        renderer: Arc<dyn SurfaceRenderer>,
    ) -> anyhow::Result<Self> {
        if let Some(color) = &request.background_color {
            apply_background(renderer.as_ref(), color);
        }
        renderer.load_url(&request.url)?;

        let listener_renderer = Arc::clone(&renderer);
        let subscription = bus.subscribe(Arc::new(move |event: &NavigateEvent| {
            if let Some(color) = &event.background_color {
                apply_background(listener_renderer.as_ref(), color);
            }
            if let Err(e) = listener_renderer.load_url(&event.destination_url) {
                warn!(url = %event.destination_url, error = %e, "surface failed to load navigate destination");
            }
        }));

        debug!(url = %request.url, "web surface opened");
        Ok(Self {
            renderer,
            callbacks: Mutex::new(Some(request.callbacks)),
            subscription: Mutex::new(Some(subscription)),
        })
    }

    pub fn is_open(&self) -> bool {
        self.callbacks.lock().is_some()
    }

    /// Handle a raw bridge message. Malformed or unknown messages are logged
    /// and ignored.
    pub fn handle_message(&self, raw: &str) -> Option<BridgeMessage> {
        let message = match BridgeMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, raw, "ignoring unparseable bridge message");
                return None;
            }
        };

        match &message {
            BridgeMessage::Close => self.close(),
            BridgeMessage::Success => {
                if let Some(callbacks) = self.callbacks() {
                    callbacks.success();
                }
            }
            BridgeMessage::Invalid => {
                if let Some(callbacks) = self.callbacks() {
                    callbacks.invalid();
                }
            }
            BridgeMessage::Shared { .. } => {
                if let Some(title) = message.share_title() {
                    if let Err(e) = self.renderer.share_text(title) {
                        warn!(error = %e, "share action failed");
                    }
                }
            }
        }
        Some(message)
    }

    /// Close the surface: fires onClose once, dismisses, and unsubscribes.
    pub fn close(&self) {
        let Some(callbacks) = self.callbacks.lock().take() else {
            return;
        };
        self.subscription.lock().take();
        callbacks.close();
        self.renderer.dismiss();
        debug!("web surface closed");
    }

    fn callbacks(&self) -> Option<SurfaceCallbacks> {
        self.callbacks.lock().clone()
    }
}

fn apply_background(renderer: &dyn SurfaceRenderer, color: &str) {
    // An unparseable color keeps the current background.
    if let Err(e) = renderer.set_background_color(color) {
        debug!(color, error = %e, "ignoring invalid background color");
    }
}

/// Host that records every open request, for tests. Can be told to fail.
#[derive(Default)]
pub struct RecordingSurfaceHost {
    opened: Mutex<Vec<SurfaceRequest>>,
    failure: Mutex<Option<String>>,
}

impl RecordingSurfaceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(message.into())),
        }
    }

    pub fn opened(&self) -> Vec<SurfaceRequest> {
        self.opened.lock().clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.opened.lock().len()
    }
}

impl SurfaceHost for RecordingSurfaceHost {
    fn open(&self, request: SurfaceRequest) -> anyhow::Result<()> {
        if let Some(message) = self.failure.lock().clone() {
            anyhow::bail!(message);
        }
        self.opened.lock().push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeRenderer {
        loaded: Mutex<Vec<String>>,
        backgrounds: Mutex<Vec<String>>,
        shared: Mutex<Vec<String>>,
        dismissed: AtomicUsize,
    }

    impl SurfaceRenderer for FakeRenderer {
        fn load_url(&self, url: &str) -> anyhow::Result<()> {
            self.loaded.lock().push(url.to_string());
            Ok(())
        }

        fn set_background_color(&self, color: &str) -> anyhow::Result<()> {
            if !color.starts_with('#') {
                anyhow::bail!("not a hex color");
            }
            self.backgrounds.lock().push(color.to_string());
            Ok(())
        }

        fn share_text(&self, text: &str) -> anyhow::Result<()> {
            self.shared.lock().push(text.to_string());
            Ok(())
        }

        fn dismiss(&self) {
            self.dismissed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_parse_bridge_messages() {
        assert_eq!(BridgeMessage::parse(r#"{"event":"close"}"#).unwrap(), BridgeMessage::Close);
        assert_eq!(
            BridgeMessage::parse(r#"{"event":"success","extra":1}"#).unwrap(),
            BridgeMessage::Success
        );
        let shared = BridgeMessage::parse(r#"{"event":"shared","data":{"title":"Join me!"}}"#).unwrap();
        assert_eq!(shared.share_title(), Some("Join me!"));
        let empty = BridgeMessage::parse(r#"{"event":"shared","data":{"title":""}}"#).unwrap();
        assert_eq!(empty.share_title(), None);
        assert!(BridgeMessage::parse(r#"{"event":"resize"}"#).is_err());
        assert!(matches!(
            BridgeMessage::parse("not json"),
            Err(campaign_core::SdkError::Serialization(_))
        ));
    }

    #[test]
    fn test_surface_dispatches_callbacks() {
        let bus = NavigationEventBus::new();
        let renderer = Arc::new(FakeRenderer::default());
        let (closes, successes, invalids) = (
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        );
        let request = SurfaceRequest {
            url: "https://ui/placements/referrer".into(),
            background_color: Some("#FFFFFF".into()),
            callbacks: SurfaceCallbacks {
                on_close: Some(counting(&closes)),
                on_success: Some(counting(&successes)),
                on_invalid: Some(counting(&invalids)),
            },
        };

        let surface = WebSurface::open(&bus, request, renderer.clone()).unwrap();
        assert_eq!(*renderer.loaded.lock(), vec!["https://ui/placements/referrer"]);
        assert_eq!(*renderer.backgrounds.lock(), vec!["#FFFFFF"]);
        assert_eq!(bus.listener_count(), 1);

        surface.handle_message(r#"{"event":"success"}"#);
        surface.handle_message(r#"{"event":"invalid"}"#);
        assert!(surface.handle_message("{broken").is_none());
        surface.handle_message(r#"{"event":"close"}"#);
        surface.handle_message(r#"{"event":"close"}"#);
        // Closed surfaces stop reporting.
        surface.handle_message(r#"{"event":"success"}"#);

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(invalids.load(Ordering::SeqCst), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.dismissed.load(Ordering::SeqCst), 1);
        assert!(!surface.is_open());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_surface_follows_navigate_events() {
        let bus = NavigationEventBus::new();
        let renderer = Arc::new(FakeRenderer::default());
        let request = SurfaceRequest {
            url: "https://ui/placements/a".into(),
            background_color: None,
            callbacks: SurfaceCallbacks::default(),
        };
        let surface = WebSurface::open(&bus, request, renderer.clone()).unwrap();

        bus.publish("https://ui/placements/b", Some("#000000"));
        bus.publish("https://ui/placements/c", Some("blue"));
        assert_eq!(
            *renderer.loaded.lock(),
            vec!["https://ui/placements/a", "https://ui/placements/b", "https://ui/placements/c"]
        );
        assert_eq!(*renderer.backgrounds.lock(), vec!["#000000"]);

        drop(surface);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_shared_message_forwards_title() {
        let bus = NavigationEventBus::new();
        let renderer = Arc::new(FakeRenderer::default());
        let request = SurfaceRequest {
            url: "https://ui/placements/a".into(),
            background_color: None,
            callbacks: SurfaceCallbacks::default(),
        };
        let surface = WebSurface::open(&bus, request, renderer.clone()).unwrap();

        surface.handle_message(r#"{"event":"shared","data":{"title":"Get $10 off"}}"#);
        surface.handle_message(r#"{"event":"shared"}"#);
        assert_eq!(*renderer.shared.lock(), vec!["Get $10 off"]);
        assert!(surface.is_open());
    }

    #[test]
    fn test_recording_host_failure() {
        let host = RecordingSurfaceHost::failing("no activity");
        let result = host.open(SurfaceRequest {
            url: "https://ui".into(),
            background_color: None,
            callbacks: SurfaceCallbacks::default(),
        });
        assert!(result.is_err());
        assert_eq!(host.count(), 0);
    }
}
