//! Shared helpers

use std::path::Path;

/// Normalize a path for display (strip Windows long-path prefixes).
///
/// Event reasons and CLI lines go through this so users never see the
/// `\\?\` form.
pub fn display_path(path: &Path) -> String {
    let path_str = path.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
            return format!(r"\\{}", stripped);
        }
        if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }
    path_str
}
