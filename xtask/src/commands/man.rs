use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use super::{BIN_NAME, prepare_out_dir};

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = prepare_out_dir(&args.out_dir)?;
    let cmd = vbump::command();

    render(&cmd, &out_dir.join(format!("{BIN_NAME}.1")))?;
    for subcommand in cmd.get_subcommands() {
        let page = format!("{BIN_NAME}-{}.1", subcommand.get_name());
        render(subcommand, &out_dir.join(page))?;
    }
    Ok(())
}

fn render(cmd: &clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", path.display()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
