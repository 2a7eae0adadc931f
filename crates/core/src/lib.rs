//! UiSim Core
//!
//! Interaction engine for server-rendered, stateful UI forms: component search
//! over the UI tree, save request construction, reconciliation of full and
//! delta responses, grid paging, and the session that ties them together.

pub mod builder;
pub mod cache;
pub mod component;
pub mod config;
pub mod error;
pub mod grid;
pub mod reconciler;
pub mod search;
pub mod session;
pub mod transport;
pub mod value;

#[cfg(feature = "http")]
pub mod http;

// Re-export commonly used types
pub use builder::SaveRequestBuilder;
pub use cache::DatatypeCache;
pub use component::{Component, ComponentKind};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use grid::{GridController, GridFlavor, GridOp, GridState};
pub use reconciler::reconcile;
pub use search::{find_component, try_find_component, ComponentQuery};
pub use session::{GridTarget, LabelKind, UiSession};
pub use transport::{Transport, UiRequest};
pub use value::{TypedValue, UploadedDocument};

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpTransport};

/// UiSim version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
