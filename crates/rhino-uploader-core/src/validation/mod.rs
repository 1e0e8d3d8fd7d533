//! Validation modules

pub mod file;

pub use file::{
    file_extension, format_size_mb, normalize_extension, validate, validate_selection,
    FileConstraints, ValidationVerdict,
};
