// src/lib.rs

#![cfg_attr(not(feature = "std"), no_std)]
#![doc = "Loads the declared module configuration of a backplane from JSON."]
#![doc = ""]
#![doc = "This `no_std + alloc` library maps a JSON document onto the core's"]
#![doc = "`DeclaredEntry` rows and `BridgeConfig` overrides."]
#![doc = ""]
#![doc = "- `load_document_from_str`: parses and validates a full document."]
#![doc = "- `save_declared_to_string`: writes a declared list back to JSON."]
#![doc = "- `JsonConfigLoader` (`std`): a file-backed `ConfigLoader`."]

extern crate alloc;

mod error;
mod loader;
mod model;
mod validation;

pub use error::ConfigError;
#[cfg(feature = "std")]
pub use loader::JsonConfigLoader;
pub use loader::{load_declared_from_str, load_document_from_str, save_declared_to_string};
pub use model::{BridgeSection, ConfigDocument, DeviceDeclaration, TimingsSection};
pub use validation::{validate_declared, validate_document};
