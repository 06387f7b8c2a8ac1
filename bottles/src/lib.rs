//! bottles - manage Windows-compatible runtime environments
//!
//! A bottle is an isolated prefix for the wine compatibility runtime plus a
//! `bottle.json` document describing it: runner, DLL components (DXVK,
//! VKD3D, DXVK-NVAPI, LatencyFleX), Windows identity and free-form
//! parameters.
//!
//! # Layers
//!
//! - [`config`]: the bottle document and [`ConfigStore`](config::ConfigStore),
//!   the only writer of `bottle.json`
//! - [`components`]: installed versions and DLL install/uninstall with
//!   backup and restore of the prefix's originals
//! - [`registry`]: registry bundles imported in one pass, Windows identities
//! - [`manager`]: the lifecycle (create, repair, runner switch, toggles)
//!
//! Everything that spawns a process goes through
//! [`CommandRunner`](command_runner::CommandRunner), so the lifecycle can be
//! driven in tests with [`MockCommandRunner`](command_runner::MockCommandRunner).

pub mod cli;
pub mod command_runner;
pub mod commands;
pub mod components;
pub mod config;
pub mod context;
pub mod error;
pub mod external;
pub mod manager;
pub mod output;
pub mod registry;
pub mod result;
pub mod settings;
pub mod wine;

pub use cli::{Cli, Commands};
pub use config::{Arch, BottleConfig, Environment};
pub use context::Context;
pub use error::{BottlesError, Result};
pub use manager::{BottleRequest, Manager};
