//! Report automated test results to a slick test management server.
//!
//! This crate is the reporting core that framework adapters build on. A
//! [`SessionController`] is constructed once at suite startup from a
//! [`ConfigurationSource`] and a [`SlickClientFactory`]; on first use it
//! resolves the project, optional test plan, and a fresh test run. A
//! [`ResultTracker`] translates the framework's start/pass/fail/skip
//! events into result lifecycle updates, and the [`ActiveResult`] handle
//! it returns carries ad-hoc logging and file attachments from inside the
//! test body.
//!
//! Reporting is strictly best-effort: a missing configuration or an
//! unreachable server disables the session, and no reporting failure ever
//! changes the outcome of a test.
//!
//! ```no_run
//! use slick_report::config::EnvConfigurationSource;
//! use slick_report::lifecycle::{ResultTracker, TestFailure};
//! use slick_report::meta::{TestDescription, TestMetadata};
//! use slick_report::session::SessionController;
//! use std::sync::Arc;
//! # fn client_factory() -> Arc<dyn slick_report::client::SlickClientFactory> { unimplemented!() }
//!
//! let controller = Arc::new(SessionController::new(
//!     Arc::new(EnvConfigurationSource::new()),
//!     client_factory(),
//! ));
//! let tracker = ResultTracker::new(controller);
//!
//! let test = TestDescription::new("checkout::cart", "add_item").with_metadata(
//!     TestMetadata::new("Add item to cart")
//!         .component("Checkout")
//!         .feature("Cart")
//!         .step("add an item", "cart count is 1"),
//! );
//!
//! let active = tracker.starting(&test);
//! let mut log = active.logger();
//! log.info("adding item");
//! // ... run the test ...
//! log.flush();
//! tracker.succeeded(&test);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logbuffer;
pub mod meta;
pub mod model;
pub mod session;
pub mod testing;

pub use client::{SlickClient, SlickClientFactory};
pub use config::{ConfigurationSource, EnvConfigurationSource};
pub use error::SlickError;
pub use lifecycle::{ActiveResult, ResultTracker, SkipPolicy, TestFailure};
pub use logbuffer::{LogLevel, ResultLogger};
pub use meta::{TestDescription, TestMetadata};
pub use session::SessionController;
