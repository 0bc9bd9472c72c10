//! Generate code from a unit.

use anyhow::{Context, anyhow, bail};
use clap::Args;
use std::path::{Path, PathBuf};
use typeweave::{Backend, Config, Unit, backend_names, get_backend};

#[derive(Args)]
pub struct GenerateArgs {
    /// Unit JSON file
    pub input: PathBuf,

    /// Backend to use (see `typeweave backends`); runs the configured targets when omitted
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (defaults to ./typeweave.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let unit = super::load_unit(&args.input)?;
    let config = super::load_config(args.config.as_deref())?;

    let Some(name) = &args.backend else {
        if args.output.is_some() {
            bail!("--output requires --backend");
        }
        if config.targets.is_empty() {
            bail!("no --backend given and no [[targets]] configured");
        }
        for target in &config.targets {
            let backend = lookup(&target.backend)?;
            let code = render(&unit, backend, &config)?;
            write_output(Some(&target.output), &code)?;
        }
        return Ok(());
    };

    let backend = lookup(name)?;
    let code = render(&unit, backend, &config)?;
    write_output(args.output.as_deref(), &code)
}

fn lookup(name: &str) -> anyhow::Result<&'static dyn Backend> {
    get_backend(name).ok_or_else(|| {
        anyhow!(
            "unknown backend `{}` (available: {})",
            name,
            backend_names().join(", ")
        )
    })
}

fn render(unit: &Unit, backend: &dyn Backend, config: &Config) -> anyhow::Result<String> {
    tracing::debug!(backend = backend.name(), "generating");
    typeweave::generate(unit, backend, config)
        .with_context(|| format!("generating {}", backend.name()))
}

fn write_output(path: Option<&Path>, code: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(path, code).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Generated {}", path.display());
        }
        None => print!("{}", code),
    }
    Ok(())
}
