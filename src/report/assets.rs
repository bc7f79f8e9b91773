//! The script dependency used by HTML reports and its per-machine cache.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{CoverageError, Result};

pub const JQUERY_FILE_NAME: &str = "jquery-3.1.1.slim.min.js";
pub const JQUERY_CDN_LOCATION: &str = "https://code.jquery.com/jquery-3.1.1.slim.min.js";

/// Where the cached copy lives inside `data_dir`.
pub fn cached_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JQUERY_FILE_NAME)
}

/// Return the cached copy, downloading it first if it is not there yet.
///
/// Two processes racing on an empty cache both download; whichever rename
/// lands last wins and the bytes are the same.
pub fn ensure_cached(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;

    let path = cached_path(data_dir);
    if path.is_file() {
        debug!("Using cached {}", path.display());
        return Ok(path);
    }

    info!("Downloading {} to {}", JQUERY_CDN_LOCATION, path.display());
    download(JQUERY_CDN_LOCATION, &path)?;
    Ok(path)
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let failed = |reason: String| CoverageError::Download {
        url: url.to_string(),
        reason,
    };

    let resp = ureq::get(url)
        .set("User-Agent", "vscov")
        .call()
        .map_err(|e| failed(e.to_string()))?;

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    io::copy(&mut resp.into_reader(), &mut tmp).map_err(|e| failed(e.to_string()))?;
    tmp.persist(dest).map_err(|e| CoverageError::Io(e.error))?;
    Ok(())
}
