mod saver;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use classfile_model::{DecompilerOptions, StructClass, StructContext};
use log::{info, warn};

use crate::saver::{DirectorySaver, Listing};

/// Reads class files, jars and zips, prints one line per class and
/// optionally writes a structural listing of every class next to copies of
/// the other entries.
#[derive(Debug, Parser)]
#[command(name = "classfile-dump", version)]
struct Cli {
    /// Option as `key=value`, e.g. `dgs=1` or `log=debug`.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// Library consulted for lookups but not written out.
    #[arg(short = 'e', long = "library", value_name = "LIB")]
    libraries: Vec<PathBuf>,

    /// Decode method bodies and count their instructions.
    #[arg(long)]
    expand: bool,

    /// Output directory.
    #[arg(long = "out", value_name = "DIR")]
    out: Option<PathBuf>,

    #[arg(required = true, value_name = "PATH")]
    sources: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut pairs = Vec::with_capacity(cli.options.len());
    for option in &cli.options {
        match DecompilerOptions::parse_pair(option) {
            Some(pair) => pairs.push(pair),
            None => bail!("malformed option '{option}', expected key=value"),
        }
    }
    let options = DecompilerOptions::from_pairs(pairs);
    env_logger::Builder::from_default_env()
        .filter_level(options.log_level)
        .init();

    let mut context = StructContext::new(options);
    for library in &cli.libraries {
        context
            .add_space(library, false)
            .with_context(|| format!("failed to read library {}", library.display()))?;
    }
    for source in &cli.sources {
        context
            .add_space(source, true)
            .with_context(|| format!("failed to read {}", source.display()))?;
    }
    info!(
        "loaded {} classes in {} units",
        context.classes().count(),
        context.units().len()
    );

    let mut own: Vec<_> = context.own_classes().collect();
    own.sort_by(|a, b| a.qualified_name().cmp(b.qualified_name()));
    for class in own {
        println!("{}", summary(class, cli.expand));
    }

    if let Some(out) = &cli.out {
        let mut saver = DirectorySaver::new(out);
        let listing = Listing::new(&context, cli.expand);
        context
            .save(&mut saver, &listing)
            .with_context(|| format!("failed to write {}", out.display()))?;
    }
    Ok(())
}

fn summary(class: &StructClass, expand: bool) -> String {
    let mut line = format!(
        "{} ({}.{}): {} fields, {} methods",
        class.qualified_name(),
        class.major_version(),
        class.minor_version(),
        class.fields().len(),
        class.methods().len()
    );
    if expand {
        let mut instructions = 0;
        for method in class.methods() {
            match method.expand_data(class) {
                Ok(()) => {
                    instructions += method.instruction_sequence().map_or(0, |seq| seq.len());
                    method.release_resources();
                }
                Err(err) => {
                    warn!("cannot decode {}.{}: {err}", class.qualified_name(), method.name)
                }
            }
        }
        class.release_resources();
        line.push_str(&format!(", {instructions} instructions"));
    }
    line
}
