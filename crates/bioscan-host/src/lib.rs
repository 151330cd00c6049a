//! Privileged host process for the bioscan capture stack.
//!
//! The host is the only process that opens a fingerprint reader. It loads
//! [`HostConfig`], installs logging, starts the unprivileged UI surface,
//! and serves the capability bridge to it until the UI goes away. The
//! reader is released before the host exits, however the session ends.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and validation
//! - [`backend`]: driver shim selection
//! - [`context`]: the per-run [`HostContext`]
//! - [`ui`]: UI child process and its bridge pipes
//! - [`monitor`]: periodic presence checks and auto-reconnect
//! - [`session`]: startup, serving, and ordered teardown
//! - [`logging`]: tracing subscriber setup

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod session;
pub mod ui;

pub use config::{BackendKind, ConfigError, HostConfig};
pub use context::{HostContext, HostService};
pub use error::{HostError, Result};
pub use session::SessionEnd;
pub use ui::{UiError, UiSurface};
