//! Generator configuration.
//!
//! Every field has a default matching the stock OpenCV-style bindings, so an
//! empty (or absent) config file is valid.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::codegen::typemap::TypeRules;
use crate::errors::{DeclbindError, DeclbindResult};

/// What to do with a class declaring more than one base.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MultiBasePolicy {
    /// Log a warning and keep only the first base.
    #[default]
    FirstWithWarning,
    /// Abort generation.
    Reject,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Root namespace of the native API; also the host module name.
    pub module_name: String,
    /// File-name prefix for every generated artifact.
    pub output_prefix: String,
    /// Header paths are included from the last occurrence of this marker.
    pub include_marker: String,
    /// Base classes whose descendants dispatch polymorphically.
    pub polymorphic_roots: Vec<String>,
    pub multi_base: MultiBasePolicy,
    pub types: TypeRules,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            module_name: "cv".to_string(),
            output_prefix: "pyopencv".to_string(),
            include_marker: "opencv2/".to_string(),
            polymorphic_roots: vec!["Algorithm".to_string()],
            multi_base: MultiBasePolicy::default(),
            types: TypeRules::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load a config file (or defaults when `path` is `None`) and apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> DeclbindResult<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                serde_json::from_str::<GeneratorConfig>(&content).map_err(|e| {
                    DeclbindError::Config(format!("{}: {e}", p.display()))
                })?
            }
            None => GeneratorConfig::default(),
        };
        if strict_bases_enabled() {
            debug!("DECLBIND_STRICT_BASES set, rejecting multi-base classes");
            config.multi_base = MultiBasePolicy::Reject;
        }
        if config.module_name.trim().is_empty() {
            return Err(DeclbindError::Config("module_name must not be empty".to_string()));
        }
        Ok(config)
    }

    /// The `<module>::` prefix stripped from native base names.
    pub fn native_root_prefix(&self) -> String {
        format!("{}::", self.module_name)
    }

    pub fn is_polymorphic_root(&self, base: &str) -> bool {
        self.polymorphic_roots.iter().any(|r| r == base)
    }
}

pub fn strict_bases_enabled() -> bool {
    match std::env::var("DECLBIND_STRICT_BASES") {
        Ok(val) => {
            let v = val.trim().to_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => false,
    }
}
