pub mod completions;

pub mod man;

use std::fs;
use std::path::{Path, PathBuf};

/// Name of the installed binary.
pub const BIN_NAME: &str = "vbump";

/// Resolve `out_dir` against the workspace root and create it.
pub fn prepare_out_dir(out_dir: &Path) -> Result<PathBuf, String> {
    let out_dir = crate::workspace_root().join(out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;
    Ok(out_dir)
}
