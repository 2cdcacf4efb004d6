// crates/backplane-rs-config/src/loader.rs

use crate::error::ConfigError;
use crate::model::{ConfigDocument, DeviceDeclaration};
use crate::validation::validate_document;
use alloc::string::String;
use alloc::vec::Vec;
use backplane_rs::DeclaredEntry;
use log::debug;

/// Parses and validates a complete configuration document.
pub fn load_document_from_str(s: &str) -> Result<ConfigDocument, ConfigError> {
    let document: ConfigDocument = serde_json::from_str(s)?;
    validate_document(&document)?;
    debug!(
        "[Config] Parsed document with {} declared modules.",
        document.devices.len()
    );
    Ok(document)
}

/// Parses a document and returns only its declared modules.
pub fn load_declared_from_str(s: &str) -> Result<Vec<DeclaredEntry>, ConfigError> {
    load_document_from_str(s).map(|document| document.declared())
}

/// Serializes a declared list into a document with default bridge settings.
pub fn save_declared_to_string(declared: &[DeclaredEntry]) -> Result<String, ConfigError> {
    let document = ConfigDocument {
        devices: declared.iter().map(DeviceDeclaration::from).collect(),
        ..ConfigDocument::default()
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// A `ConfigLoader` reading the declared configuration from a JSON file.
///
/// The file is re-read on every call, so a reset picks up edits.
/// A missing file is an error, not an empty configuration.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct JsonConfigLoader {
    path: std::path::PathBuf,
}

#[cfg(feature = "std")]
impl JsonConfigLoader {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Reads and validates the whole document, keeping the detailed error.
    pub fn load_document(&self) -> Result<ConfigDocument, ConfigError> {
        let contents = std::fs::read_to_string(&self.path)?;
        load_document_from_str(&contents)
    }
}

#[cfg(feature = "std")]
impl backplane_rs::ConfigLoader for JsonConfigLoader {
    fn load_declared_configuration(
        &mut self,
    ) -> Result<Vec<DeclaredEntry>, backplane_rs::BackplaneError> {
        match self.load_document() {
            Ok(document) => {
                log::info!(
                    "[Config] Loaded {} declared modules from {}.",
                    document.devices.len(),
                    self.path.display()
                );
                Ok(document.declared())
            }
            Err(e) => {
                log::error!("[Config] Failed to load {}: {}", self.path.display(), e);
                Err(e.to_backplane_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use backplane_rs::{Address, ModuleType};

    #[test]
    fn test_save_then_load_keeps_entries() {
        let declared = vec![DeclaredEntry {
            address: Address(32),
            module_type: ModuleType::DO,
            input_length: 0,
            output_length: 1,
            output_offset: 12,
            serial_number: 4711,
            ..DeclaredEntry::default()
        }];
        let json = save_declared_to_string(&declared).unwrap();
        assert!(json.contains("\"outputOffset\": 12"));
        assert_eq!(load_declared_from_str(&json).unwrap(), declared);
    }

    #[test]
    fn test_invalid_document_rejected() {
        let json = r#"{ "bridge": { "rightBase": 255 } }"#;
        assert!(matches!(
            load_document_from_str(json),
            Err(ConfigError::InvalidBridge(_))
        ));
    }
}
