//! Shared campaign data model, error taxonomy and the navigation event bus
//! used by the client SDK runtime.

pub mod error;
pub mod event_bus;
pub mod types;

pub use error::{SdkError, SdkResult};
pub use event_bus::{NavigateEvent, NavigateListener, NavigationEventBus, Subscription};
pub use types::{Campaign, Checkpoint, Customer, Environment, Placement};
