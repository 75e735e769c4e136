//! Zipping a compiled bundle for `UpdateFunctionCode`.

use std::io::{Cursor, Write};
use std::path::Path;
use tracing::debug;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::bundle::BUNDLE_FILE_NAME;
use crate::{Result, UpdateError};

/// Source map emitted next to the bundle when sourcemaps are on.
pub const SOURCE_MAP_FILE_NAME: &str = "main.js.map";

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6))
        .unix_permissions(0o644)
}

/// Build an in-memory zip of `main.js` (and its source map, if any) in `dir`.
///
/// Both files sit at the archive root, where the `main.<handler>` handler
/// expects them.
pub fn zip_bundle(dir: &Path) -> Result<Vec<u8>> {
    let main = dir.join(BUNDLE_FILE_NAME);
    if !main.is_file() {
        return Err(UpdateError::Archive(format!(
            "{} not found in {}",
            BUNDLE_FILE_NAME,
            dir.display()
        )));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for name in [BUNDLE_FILE_NAME, SOURCE_MAP_FILE_NAME] {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        let data = std::fs::read(&path)?;
        writer.start_file(name, options())?;
        writer.write_all(&data)?;
    }

    let bytes = writer.finish()?.into_inner();
    debug!(dir = %dir.display(), bytes = bytes.len(), "zipped bundle");
    Ok(bytes)
}
