//! HTTP record/replay controller.
//!
//! Requests below the resource root (`/c8yctrl` by default) go to the admin
//! interface. Everything else is either answered from the current pact
//! (apply mode) or forwarded to the backend, optionally recording the
//! response (record mode).
//!
//! - `server` - construction, start and stop
//! - `router` - admin vs. traffic dispatch
//! - `admin` - pact selection, status, log level, listings
//! - `mock` - recorded response lookup and rendering
//! - `proxy` - forwarding and recording
//! - `state` - per-controller shared state

mod admin;
mod client;
mod headers;
mod mock;
mod proxy;
mod router;
mod server;
mod state;
mod traffic;
mod types;

pub use headers::{X_C8YCTRL_MOCKED, X_C8YCTRL_PROXIED, X_C8YCTRL_RECORDED};
pub use mock::MockNotFoundResponder;
pub use router::ControllerRoute;
pub use server::{Controller, ControllerBuilder, ControllerHandle};
pub use state::Session;
