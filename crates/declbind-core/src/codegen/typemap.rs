//! Static type tables consulted while building variants and emitting
//! conversion code.

use serde::Deserialize;

/// Arguments of these types abort generation.
pub const FORBIDDEN_ARG_TYPES: &[&str] = &["void*"];

/// Arguments of these types are never exposed; the native call receives their
/// default (or a null pointer).
pub const IGNORED_ARG_TYPES: &[&str] = &["RNG*"];

/// Pointer types that are declared by value and passed by address.
pub const PASS_BY_VAL_TYPES: &[&str] = &[
    "Point*", "Point2f*", "Rect*", "String*", "double*", "float*", "int*",
];

/// Aggregates that are expensive to construct. Output-only arguments of these
/// types become optional call-site parameters.
pub const HEAVY_TYPES: &[&str] = &["Mat", "vector_Mat", "cuda::GpuMat", "UMat", "vector_UMat"];

/// Default-literal rewrites for arguments whose storage is a different
/// matrix flavour than the one the native default names:
/// (type marker, already-rewritten marker, replacement for `Mat`).
const DEFAULT_REWRITES: &[(&str, &str, &str)] = &[
    ("UMat", "UMat", "UMat"),
    ("cuda::GpuMat", "GpuMat", "cuda::GpuMat"),
];

/// How a primitive type is stored, parsed and default-initialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMapping {
    pub storage: String,
    pub format: char,
    pub default: String,
}

impl TypeMapping {
    /// Mapping for anything not in the primitive table: parsed as a Python
    /// object and converted explicitly.
    pub fn object(storage: &str, default: &str) -> Self {
        Self {
            storage: storage.to_string(),
            format: 'O',
            default: default.to_string(),
        }
    }

    pub fn is_object(&self) -> bool {
        self.format == 'O'
    }
}

const SIMPLE_ARGTYPE_MAPPING: &[(&str, &str, char, &str)] = &[
    ("bool", "bool", 'b', "0"),
    ("size_t", "size_t", 'I', "0"),
    ("int", "int", 'i', "0"),
    ("float", "float", 'f', "0.f"),
    ("double", "double", 'd', "0"),
    ("c_string", "char*", 's', "(char*)\"\""),
];

/// Look up `ty` in the primitive table.
pub fn simple_mapping(ty: &str) -> Option<TypeMapping> {
    SIMPLE_ARGTYPE_MAPPING
        .iter()
        .find(|(name, ..)| *name == ty)
        .map(|(_, storage, format, default)| TypeMapping {
            storage: storage.to_string(),
            format: *format,
            default: default.to_string(),
        })
}

/// Primitive mapping for `ty`, or an object mapping with `fallback_default`.
pub fn lookup(ty: &str, fallback_default: &str) -> TypeMapping {
    simple_mapping(ty).unwrap_or_else(|| TypeMapping::object(ty, fallback_default))
}

/// Rewrite a native default such as `Mat()` for an argument stored as
/// `UMat` or `cuda::GpuMat`.
pub fn rewrite_default(ty: &str, default: &str) -> String {
    let mut rewritten = default.to_string();
    for (marker, guard, replacement) in DEFAULT_REWRITES {
        if ty.contains(marker) && rewritten.contains("Mat") && !rewritten.contains(guard) {
            rewritten = rewritten.replace("Mat", replacement);
        }
    }
    rewritten
}

/// Configurable type lists. Defaults mirror the constants above.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TypeRules {
    pub forbidden: Vec<String>,
    pub ignored: Vec<String>,
    pub pass_by_value: Vec<String>,
    pub heavy: Vec<String>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for TypeRules {
    fn default() -> Self {
        Self {
            forbidden: owned(FORBIDDEN_ARG_TYPES),
            ignored: owned(IGNORED_ARG_TYPES),
            pass_by_value: owned(PASS_BY_VAL_TYPES),
            heavy: owned(HEAVY_TYPES),
        }
    }
}

impl TypeRules {
    pub fn is_forbidden(&self, ty: &str) -> bool {
        self.forbidden.iter().any(|t| t == ty)
    }

    pub fn is_ignored(&self, ty: &str) -> bool {
        self.ignored.iter().any(|t| t == ty)
    }

    pub fn is_pass_by_value(&self, ty: &str) -> bool {
        self.pass_by_value.iter().any(|t| t == ty)
    }

    pub fn is_heavy(&self, ty: &str) -> bool {
        self.heavy.iter().any(|t| t == ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_mapping_known_types() {
        let m = simple_mapping("float").unwrap();
        assert_eq!(m.storage, "float");
        assert_eq!(m.format, 'f');
        assert_eq!(m.default, "0.f");
        let s = simple_mapping("c_string").unwrap();
        assert_eq!(s.storage, "char*");
        assert_eq!(s.format, 's');
    }

    #[test]
    fn test_lookup_falls_back_to_object() {
        let m = lookup("Mat", "");
        assert!(m.is_object());
        assert_eq!(m.storage, "Mat");
        assert_eq!(m.default, "");
    }

    #[test]
    fn test_rewrite_default_for_umat_and_gpumat() {
        assert_eq!(rewrite_default("UMat", "Mat()"), "UMat()");
        assert_eq!(rewrite_default("UMat", "UMat()"), "UMat()");
        assert_eq!(rewrite_default("cuda::GpuMat", "Mat()"), "cuda::GpuMat()");
        assert_eq!(rewrite_default("cuda::GpuMat", "GpuMat()"), "GpuMat()");
        assert_eq!(rewrite_default("Mat", "Mat()"), "Mat()");
    }

    #[test]
    fn test_default_rules() {
        let rules = TypeRules::default();
        assert!(rules.is_forbidden("void*"));
        assert!(rules.is_ignored("RNG*"));
        assert!(rules.is_pass_by_value("int*"));
        assert!(rules.is_heavy("vector_Mat"));
        assert!(!rules.is_heavy("int"));
    }
}
