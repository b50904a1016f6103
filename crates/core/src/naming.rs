//! Collision-free storage names for uploads and job outputs.
//!
//! Every generated name combines a millisecond timestamp with a random UUID
//! fragment, so concurrent uploads and job outputs never share a path even
//! when they land in the same millisecond.

use chrono::Utc;
use uuid::Uuid;

/// Extension given to merge outputs.
pub const MERGED_EXTENSION: &str = "mp4";

/// Suffix of files still being streamed to disk.
pub const STAGING_SUFFIX: &str = ".part";

/// Longest storage name we are willing to produce or serve.
pub const MAX_FILENAME_LEN: usize = 255;

/// Lowercased extension of `name`, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn unique_token() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp_millis(), &id[..12])
}

/// Storage name for an uploaded file with the given (already validated) extension.
pub fn upload_filename(ext: &str) -> String {
    format!("{}.{ext}", unique_token())
}

/// Storage name for the output of trimming `source_filename`.
///
/// The source's extension is kept so the container format is preserved.
pub fn trimmed_filename(source_filename: &str) -> String {
    let name = format!("trimmed_{}_{source_filename}", unique_token());
    if name.len() <= MAX_FILENAME_LEN {
        return name;
    }
    let ext = extension_of(source_filename).unwrap_or_else(|| MERGED_EXTENSION.to_string());
    format!("trimmed_{}.{ext}", unique_token())
}

/// Storage name for a merge output.
pub fn merged_filename() -> String {
    format!("merged_{}.{MERGED_EXTENSION}", unique_token())
}

/// Name for a file that is still being written.
pub fn staging_filename() -> String {
    format!("{}{STAGING_SUFFIX}", Uuid::new_v4().simple())
}

/// Whether `name` is a plain file name that cannot escape the storage root.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_FILENAME_LEN
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && !name.ends_with(STAGING_SUFFIX)
}
