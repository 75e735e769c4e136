//! `fastpush inspect`.

use colored::Colorize;
use fastpush_update::Template;
use std::path::Path;

use crate::error::CliResult;
use crate::{info, warn};

/// List the upload infos a synthesized template carries.
pub fn run(path: &Path) -> CliResult<()> {
    let template = Template::from_file(path)?;
    let infos = template.upload_infos();

    if infos.is_empty() {
        warn("No upload infos found. Was the stack synthesized with NODE_ENV=test?");
        return Ok(());
    }

    info(&format!("{} function(s) with upload info", infos.len()));
    println!();
    for (key, upload) in &infos {
        println!(
            "  {:<32} {}  {}",
            upload.function_name.bold(),
            upload.entry_full_path.display(),
            key.dimmed()
        );
    }
    Ok(())
}
