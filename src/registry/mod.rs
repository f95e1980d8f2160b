//! # Registry Module
//!
//! Boot-time tables the dispatcher and resolver read from: component classes
//! per kind, capability functions per target, and response formatters.
//! Plugins contribute capability functions through a `plugin.json` manifest
//! naming the targets each function is grafted onto.

mod core;
mod plugin;

pub use core::Registries;
pub use plugin::{Plugin, PluginManifest, MANIFEST_FILE};
