// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] checks it and builds the validated [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, LoaderSection, RawConfigFile};
pub use validate::validate_config;
