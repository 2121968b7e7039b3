use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigSchemaArgs {
    /// Write the schema to this file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: ConfigSchemaArgs) -> Result<()> {
    match args.out {
        Some(path) => {
            cx_core::write_schema_file(&path)
                .with_context(|| format!("write config schema to {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => super::print_json(&cx_core::config_schema_json(), true),
    }
    Ok(())
}
