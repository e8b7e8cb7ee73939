//! Kernel Specification Compiler CLI
//!
//! The `kspec` command turns kernel specification documents into C glue.

use clap::{Parser, Subcommand};
use kernelspec::driver::{self, OutputPaths};
use kernelspec::{lexer, parser, Config};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kspec")]
#[command(version = kernelspec::VERSION)]
#[command(about = "Kernel specification compiler", long_about = None)]
struct Cli {
    /// Generator configuration (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log every pipeline stage
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the header/source pair for one kernel
    Compile {
        /// Input specification
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output C source file [default: <stem>-gen.c next to the input]
        #[arg(long, value_name = "FILE")]
        code: Option<PathBuf>,

        /// Output C header file [default: <stem>-gen.h next to the input]
        #[arg(long, value_name = "FILE")]
        header: Option<PathBuf>,
    },

    /// Generate the kernel registry from every specification
    Collect {
        /// Input specifications
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// Output C source file
        #[arg(long, value_name = "FILE")]
        code: PathBuf,

        /// Output C header file
        #[arg(long, value_name = "FILE")]
        header: PathBuf,
    },

    /// Validate specifications without generating anything
    Check {
        /// Input specifications
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Tokenize a file and print tokens
    Tokenize {
        /// Input file to tokenize
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse a file and print the markup tree
    Parse {
        /// Input file to parse
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())
        .map_err(|e| miette::miette!("{}", e))?;

    match cli.command {
        Commands::Compile { input, code, header } => {
            let outputs = OutputPaths::resolve(&input, code, header)
                .map_err(|e| miette::miette!("{}", e))?;
            let kernel = driver::compile_file(&input, &outputs, &config)
                .map_err(|e| miette::miette!("{}", e))?;
            println!(
                "Compiled {} -> {}, {}",
                kernel.full_name(),
                outputs.header.display(),
                outputs.code.display()
            );
            Ok(())
        }

        Commands::Collect { inputs, code, header } => {
            let outputs = OutputPaths::new(code, header);
            let kernels = driver::collect_files(&inputs, &outputs, &config)
                .map_err(|e| miette::miette!("{}", e))?;
            println!(
                "Collected {} kernel(s) -> {}, {}",
                kernels.len(),
                outputs.header.display(),
                outputs.code.display()
            );
            Ok(())
        }

        Commands::Check { inputs } => {
            let kernels = driver::check_files(&inputs).map_err(|e| miette::miette!("{}", e))?;
            for kernel in &kernels {
                println!(
                    "{}: {} parameter(s), {} argument(s)",
                    kernel,
                    kernel.parameters.len(),
                    kernel.arguments.len()
                );
            }
            println!("No errors found.");
            Ok(())
        }

        Commands::Tokenize { input } => {
            let source = read_source(&input)?;
            let (tokens, errors) = lexer::lex(&source);
            for token in &tokens {
                println!(
                    "{:>7}  {:<10} {:?}",
                    token.span.position(&source).to_string(),
                    token.kind.to_string(),
                    token.text(&source)
                );
            }
            if !errors.is_empty() {
                for err in &errors {
                    eprintln!("Lexer error at {}: {}", err.span().position(&source), err);
                }
                return Err(miette::miette!("Found {} lexer error(s)", errors.len()));
            }
            Ok(())
        }

        Commands::Parse { input } => {
            let source = read_source(&input)?;
            match parser::parse(&source) {
                Ok(document) => {
                    println!("{:#?}", document);
                    Ok(())
                }
                Err(err) => Err(miette::miette!(
                    "{}:{}: {}",
                    input.display(),
                    err.span().position(&source),
                    err
                )),
            }
        }
    }
}
