//! Per-machine defaults: where shared data is cached and the coverage
//! threshold used when nothing else is configured.

use std::path::PathBuf;

/// Application folder name under the platform data directory.
pub const APP_DIR_NAME: &str = "vscov";

/// Covered ratio at or above which a node counts as covered.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

fn platform_data_root() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("PROGRAMDATA").map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(xdg));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
    }
}

/// The shared application data directory. It is not created here.
pub fn data_directory() -> PathBuf {
    platform_data_root()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Map a persisted threshold to a usable one; anything that is not a finite
/// value in `0.0..=1.0` becomes [`DEFAULT_THRESHOLD`].
pub fn sanitize_threshold(value: f64) -> f64 {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        DEFAULT_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_threshold() {
        assert_eq!(sanitize_threshold(0.5), 0.5);
        assert_eq!(sanitize_threshold(0.0), 0.0);
        assert_eq!(sanitize_threshold(1.0), 1.0);
        assert_eq!(sanitize_threshold(f64::NAN), DEFAULT_THRESHOLD);
        assert_eq!(sanitize_threshold(f64::INFINITY), DEFAULT_THRESHOLD);
        assert_eq!(sanitize_threshold(-0.1), DEFAULT_THRESHOLD);
        assert_eq!(sanitize_threshold(1.5), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_data_directory_ends_with_app_name() {
        assert!(data_directory().ends_with(APP_DIR_NAME));
    }
}
