//! Dump the converted IR.

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use typeweave::convert_unit;

#[derive(Args)]
pub struct IrArgs {
    /// Unit JSON file
    pub input: PathBuf,

    /// Field tag consulted before `json`
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: IrArgs) -> anyhow::Result<()> {
    let unit = super::load_unit(&args.input)?;
    let config = super::load_config(args.config.as_deref())?;
    let options = config.convert.with_tag(args.tag.as_deref());
    let conversion = convert_unit(&unit, &options)
        .with_context(|| format!("converting {}", args.input.display()))?;
    println!("{}", serde_json::to_string_pretty(&conversion)?);
    Ok(())
}
