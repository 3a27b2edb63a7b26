//! Error types for the declbind core library.

/// Top-level error enum for the declbind core library.
///
/// Every variant is fatal for a generation run: classification and hierarchy
/// resolution finish before anything is emitted, so an error here means no
/// output file has been touched.
#[derive(Debug, thiserror::Error)]
pub enum DeclbindError {
    #[error("class {name} (cname={cname}) already exists")]
    DuplicateClass { name: String, cname: String },

    #[error("constant {name} (cname={cname}) already exists")]
    DuplicateConstant { name: String, cname: String },

    #[error("unable to resolve base {base} for {class}")]
    UnresolvedBase { base: String, class: String },

    #[error("class {class} has more than one base class ({bases}); multiple inheritance is rejected")]
    MultipleBases { class: String, bases: String },

    #[error("forbidden type \"{ty}\" for argument \"{arg}\" in \"{func}\" (\"{class}\")")]
    ForbiddenArgType {
        ty: String,
        arg: String,
        func: String,
        class: String,
    },

    #[error("argument \"{arg}\" of ignored type \"{ty}\" in \"{func}\" has no default value")]
    MissingDefault { ty: String, arg: String, func: String },

    #[error("unknown class {0}")]
    UnknownClass(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DeclbindResult<T> = Result<T, DeclbindError>;
