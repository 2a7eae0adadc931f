//! UiSim Journeys
//!
//! Declarative multi-step user journeys over uisim-core sessions.
//!
//! A journey is a YAML file naming the entry form and an ordered list of
//! actions. The runner opens the form, runs each action through a
//! [`uisim_core::UiSession`], and stops at the first failing step.
//! [`run_users`] replays one journey for many simulated users at once.
//!
//! ```yaml
//! name: create-order
//! entry_uri: /suite/rest/a/sites/latest/orders/page/new
//! steps:
//!   - action: fill_text_field
//!     label: Customer
//!     value: ACME
//!   - action: click
//!     label: Submit
//! ```

pub mod error;
pub mod runner;
pub mod spec;

pub use error::{JourneyError, JourneyResult};
pub use runner::{execute_step, run_journey, run_steps, run_users, JourneyReport, LoadReport, StepResult};
pub use spec::{GridRef, JourneySpec, JourneyStep, PageDirection};

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back to `default_level`.
///
/// Does nothing when a subscriber is already installed.
pub fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
