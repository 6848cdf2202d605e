use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::debug;

/// Size the global rayon pool from a `--threads` value (`auto` = all cores).
pub fn configure_threads(spec: &str) -> Result<usize> {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse::<usize>()
            .with_context(|| format!("invalid --threads value '{}'", spec))?
    };
    if count == 0 {
        bail!("--threads must be at least 1");
    }
    // the global pool can only be built once per process
    if let Err(err) = ThreadPoolBuilder::new().num_threads(count).build_global() {
        debug!("keeping existing thread pool: {}", err);
    }
    Ok(count)
}

/// Pretty-print `value` as JSON into `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("creating output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("writing {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
