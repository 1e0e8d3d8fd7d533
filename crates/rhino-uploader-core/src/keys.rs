//! Storage key derivation.
//!
//! Key format: `{prefix}/{file_id}/{filename}`, the layout the backend writes
//! presigned uploads under. The key is sent back on confirmation.

/// Generate the storage key for an uploaded file.
pub fn generate_storage_key(prefix: &str, file_id: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", file_id, filename)
    } else {
        format!("{}/{}/{}", prefix, file_id, filename)
    }
}
