//! Client-side checks run before any network call.
//!
//! `validate` is pure: the same file and constraints always yield the same
//! verdict. The extension check runs first, then the declared MIME type, then
//! the name length, then the size, so a file failing several checks reports a
//! type error.

use serde::{Deserialize, Serialize};

use crate::config::UploaderConfig;
use crate::constants::{
    BYTES_PER_MB, DEFAULT_ACCEPTED_EXTENSIONS, DEFAULT_ACCEPTED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE,
    MAX_FILENAME_LENGTH, TOO_MANY_FILES_MESSAGE,
};
use crate::models::UploadFile;

/// Constraints a candidate file is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConstraints {
    pub max_size_bytes: u64,
    /// Extensions with a leading dot, e.g. ".3dm". Compared case-insensitively.
    pub accepted_extensions: Vec<String>,
    /// Only consulted when the file declares a content type
    pub accepted_mime_types: Vec<String>,
}

impl FileConstraints {
    pub fn new<I, S>(max_size_bytes: u64, accepted_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_size_bytes,
            accepted_extensions: accepted_extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            accepted_mime_types: Vec::new(),
        }
    }

    pub fn with_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accepted_mime_types = mime_types
            .into_iter()
            .map(|m| normalize_mime_type(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    fn accepts_extension(&self, extension: &str) -> bool {
        !extension.is_empty()
            && self
                .accepted_extensions
                .iter()
                .any(|accepted| normalize_extension(accepted) == extension)
    }

    fn accepts_mime_type(&self, content_type: &str) -> bool {
        let normalized = normalize_mime_type(content_type);
        normalized.is_empty()
            || self.accepted_mime_types.is_empty()
            || self
                .accepted_mime_types
                .iter()
                .any(|accepted| normalize_mime_type(accepted) == normalized)
    }
}

impl Default for FileConstraints {
    fn default() -> Self {
        FileConstraints::new(DEFAULT_MAX_FILE_SIZE, DEFAULT_ACCEPTED_EXTENSIONS.iter())
            .with_mime_types(DEFAULT_ACCEPTED_MIME_TYPES.iter())
    }
}

impl From<&UploaderConfig> for FileConstraints {
    fn from(config: &UploaderConfig) -> Self {
        FileConstraints::new(config.max_file_size, config.accepted_extensions.iter())
            .with_mime_types(config.accepted_mime_types.iter())
    }
}

/// Result of validating one file against one constraint set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationVerdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Extension of `filename` including the leading dot, lowercased.
/// Empty when the name has no dot or nothing after its last dot.
pub fn file_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() => filename[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// Lowercase and ensure a single leading dot: "3DM" and ".3dm" both become ".3dm".
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// Normalize MIME type by stripping parameters (e.g. "application/x-rhino; v=7" -> "application/x-rhino").
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|s| s.trim())
        .unwrap_or(content_type)
        .to_lowercase()
}

/// Size in MB for messages: whole numbers print without decimals.
pub fn format_size_mb(bytes: u64) -> String {
    if bytes % BYTES_PER_MB == 0 {
        (bytes / BYTES_PER_MB).to_string()
    } else {
        format!("{:.2}", bytes as f64 / BYTES_PER_MB as f64)
    }
}

fn invalid_type_message(constraints: &FileConstraints) -> String {
    format!(
        "Invalid file type. Only {} files are accepted.",
        constraints.accepted_extensions.join(", ")
    )
}

fn file_too_large_message(max_size_bytes: u64) -> String {
    format!(
        "File size exceeds maximum allowed size of {}MB.",
        format_size_mb(max_size_bytes)
    )
}

/// Check a candidate file's type and size.
pub fn validate(file: &UploadFile, constraints: &FileConstraints) -> ValidationVerdict {
    let extension = file_extension(&file.name);
    if !constraints.accepts_extension(&extension) {
        tracing::debug!(
            filename = %file.name,
            extension = %extension,
            "Rejected file with unaccepted extension"
        );
        return ValidationVerdict::invalid(invalid_type_message(constraints));
    }

    if let Some(content_type) = file.content_type.as_deref() {
        if !constraints.accepts_mime_type(content_type) {
            tracing::debug!(
                filename = %file.name,
                content_type = %content_type,
                "Rejected file with unaccepted content type"
            );
            return ValidationVerdict::invalid(invalid_type_message(constraints));
        }
    }

    let name_length = file.name.chars().count();
    if name_length > MAX_FILENAME_LENGTH {
        tracing::debug!(
            filename = %file.name,
            name_length,
            "Rejected file with overlong name"
        );
        return ValidationVerdict::invalid(format!(
            "Filename must be at most {} characters.",
            MAX_FILENAME_LENGTH
        ));
    }

    if file.size_bytes > constraints.max_size_bytes {
        tracing::debug!(
            filename = %file.name,
            size_bytes = file.size_bytes,
            max_size_bytes = constraints.max_size_bytes,
            "Rejected oversized file"
        );
        return ValidationVerdict::invalid(file_too_large_message(constraints.max_size_bytes));
    }

    ValidationVerdict::valid()
}

/// Check how many files were selected at once.
pub fn validate_selection(count: usize, multiple: bool) -> ValidationVerdict {
    if count > 1 && !multiple {
        return ValidationVerdict::invalid(TOO_MANY_FILES_MESSAGE);
    }
    ValidationVerdict::valid()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn file(name: &str, size_bytes: u64) -> UploadFile {
        let mut file = UploadFile::from_bytes(name, Vec::new());
        file.size_bytes = size_bytes;
        file
    }

    fn rhino_constraints() -> FileConstraints {
        FileConstraints::new(500 * MIB, [".3dm"])
    }

    #[test]
    fn accepts_model_within_limit() {
        let verdict = validate(&file("model.3dm", 10 * MIB), &rhino_constraints());
        assert_eq!(verdict, ValidationVerdict::valid());
    }

    #[test]
    fn rejects_unaccepted_extension_regardless_of_size() {
        let constraints = rhino_constraints();
        for name in ["document.pdf", "model.3dmx", "model.3dm.zip", "archive.tar.gz"] {
            for size in [0, 1, 500 * MIB, 600 * MIB] {
                let verdict = validate(&file(name, size), &constraints);
                assert!(!verdict.valid, "{name} should be rejected");
                assert!(verdict
                    .error
                    .as_deref()
                    .unwrap()
                    .contains("Invalid file type"));
            }
        }
    }

    #[test]
    fn rejects_oversized_model() {
        let verdict = validate(&file("huge.3dm", 600 * MIB), &rhino_constraints());
        assert!(!verdict.valid);
        assert_eq!(
            verdict.error.as_deref(),
            Some("File size exceeds maximum allowed size of 500MB.")
        );
    }

    #[test]
    fn size_boundary_is_inclusive() {
        let constraints = rhino_constraints();
        assert!(validate(&file("edge.3dm", 500 * MIB), &constraints).valid);
        assert!(!validate(&file("edge.3dm", 500 * MIB + 1), &constraints).valid);
    }

    #[test]
    fn type_error_takes_precedence_over_size() {
        let verdict = validate(&file("huge.pdf", 600 * MIB), &rhino_constraints());
        assert!(verdict.error.unwrap().contains("Invalid file type"));
    }

    #[test]
    fn extension_comparison_ignores_case() {
        let constraints = FileConstraints::new(500 * MIB, ["3DM"]);
        assert_eq!(constraints.accepted_extensions, vec![".3dm".to_string()]);
        assert!(validate(&file("FACADE.3DM", MIB), &constraints).valid);
        assert!(validate(&file("Facade.3Dm", MIB), &rhino_constraints()).valid);
    }

    #[test]
    fn names_without_extension_never_match() {
        let constraints = rhino_constraints();
        for name in ["README", "", "model.", "3dm"] {
            assert_eq!(file_extension(name), "");
            assert!(!validate(&file(name, 1), &constraints).valid);
        }
        let permissive = FileConstraints {
            max_size_bytes: MIB,
            accepted_extensions: vec![String::new(), ".".to_string()],
            accepted_mime_types: Vec::new(),
        };
        assert!(!validate(&file("README", 1), &permissive).valid);
    }

    #[test]
    fn overlong_name_is_rejected_locally() {
        let constraints = rhino_constraints();
        let at_limit = format!("{}.3dm", "a".repeat(MAX_FILENAME_LENGTH - 4));
        assert!(validate(&file(&at_limit, MIB), &constraints).valid);

        let too_long = format!("{}.3dm", "a".repeat(MAX_FILENAME_LENGTH));
        let verdict = validate(&file(&too_long, MIB), &constraints);
        assert_eq!(
            verdict.error.as_deref(),
            Some("Filename must be at most 255 characters.")
        );

        let verdict = validate(&file(&format!("{}.pdf", "a".repeat(300)), MIB), &constraints);
        assert!(verdict.error.unwrap().contains("Invalid file type"));
    }

    #[test]
    fn hidden_file_uses_text_after_last_dot() {
        assert_eq!(file_extension(".3dm"), ".3dm");
        assert_eq!(file_extension("a.b.C"), ".c");
    }

    #[test]
    fn validate_is_idempotent() {
        let constraints = rhino_constraints();
        for candidate in [file("model.3dm", MIB), file("huge.3dm", 600 * MIB), file("x.pdf", 1)] {
            assert_eq!(
                validate(&candidate, &constraints),
                validate(&candidate, &constraints)
            );
        }
    }

    #[test]
    fn declared_mime_type_is_checked_when_present() {
        let constraints = FileConstraints::default();
        let rhino = file("model.3dm", MIB).with_content_type("application/x-rhino");
        let octet = file("model.3dm", MIB).with_content_type("application/octet-stream; q=1");
        let unknown = file("model.3dm", MIB).with_content_type("");
        let pdf = file("model.3dm", MIB).with_content_type("application/pdf");

        assert!(validate(&rhino, &constraints).valid);
        assert!(validate(&octet, &constraints).valid);
        assert!(validate(&unknown, &constraints).valid);
        let verdict = validate(&pdf, &constraints);
        assert!(verdict.error.unwrap().contains("Invalid file type"));
    }

    #[test]
    fn mime_error_precedes_size_error() {
        let pdf = file("model.3dm", 600 * MIB).with_content_type("application/pdf");
        let verdict = validate(&pdf, &FileConstraints::default());
        assert!(verdict.error.unwrap().contains("Invalid file type"));
    }

    #[test]
    fn message_lists_accepted_extensions() {
        let constraints = FileConstraints::new(MIB, [".3dm", ".3DMBAK"]);
        let verdict = validate(&file("x.obj", 1), &constraints);
        assert_eq!(
            verdict.error.as_deref(),
            Some("Invalid file type. Only .3dm, .3dmbak files are accepted.")
        );
    }

    #[test]
    fn selection_count() {
        assert!(validate_selection(1, false).valid);
        assert!(validate_selection(3, true).valid);
        let verdict = validate_selection(2, false);
        assert_eq!(verdict.error.as_deref(), Some(TOO_MANY_FILES_MESSAGE));
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size_mb(500 * MIB), "500");
        assert_eq!(format_size_mb(MIB + MIB / 2), "1.50");
    }
}
