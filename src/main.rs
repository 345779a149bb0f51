use std::{fs, path::PathBuf};

use clap::Parser;
use miette::{GraphicalReportHandler, IntoDiagnostic, Result};
use pbng::Compiler;
use prost::Message;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// The source file(s) to compile.
    #[clap(value_name = "FILES", required = true, value_parser)]
    files: Vec<PathBuf>,
    /// The directory in which to search for imports. May be repeated; earlier directories take precedence.
    #[clap(
        short = 'I',
        long = "include",
        visible_alias = "proto_path",
        value_name = "PATH",
        default_value = ".",
        value_parser
    )]
    includes: Vec<PathBuf>,
    /// The output path to write an encoded file descriptor set to.
    #[clap(
        short = 'o',
        long = "output",
        visible_alias = "descriptor_set_out",
        value_name = "PATH",
        value_parser
    )]
    output: Option<PathBuf>,
    /// If set, all dependencies of the input files are output, so that the output is self-contained.
    #[clap(long, visible_alias = "include_imports")]
    include_imports: bool,
    /// Print each resolved file as source text, with fully-qualified type names.
    #[clap(long)]
    dump: bool,
    /// Increase logging verbosity. May be repeated.
    #[clap(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();

    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut compiler = Compiler::new(args.includes)?;
    compiler.include_imports(args.include_imports);
    let result = compiler.open_files(args.files).map(|_| ());

    let handler = GraphicalReportHandler::new();
    for warning in compiler.warnings() {
        let mut report = String::new();
        if handler.render_report(&mut report, warning).is_ok() {
            eprintln!("{}", report);
        }
    }
    result?;

    if args.dump {
        for file in compiler.files() {
            println!("// {}", file.name());
            print!("{}", pbng::to_source(file));
        }
    }

    if let Some(output) = args.output {
        fs::write(output, compiler.file_descriptor_set().encode_to_vec()).into_diagnostic()?;
    }

    Ok(())
}
