//! venvsync core library: declared environment spec, config persistence,
//! process execution, errors.
//!
//! Public API surface:
//! - [`types`]: [`EnvironmentSpec`] and its defaults
//! - [`error`]: [`ConfigError`], [`ProcessError`]
//! - [`config`]: load / save / validate
//! - [`process`]: [`CommandRunner`] and the std-backed [`SystemRunner`]

pub mod config;
pub mod error;
pub mod process;
pub mod types;

pub use error::{ConfigError, ProcessError};
pub use process::{CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use types::EnvironmentSpec;
