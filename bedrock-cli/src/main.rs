//! Command-line driver: assemble Bedrock sources, optionally keep the
//! object file, and run the machine to halt.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bedrock_asm::{assemble_file, Instruction};
use bedrock_exe::LoadableFile;
use bedrock_vm::Machine;

#[derive(Parser)]
#[command(name = "bedrock", version, about = "Assemble and run Bedrock programs")]
struct Cli {
    /// Lower the default log filter from warn to debug.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a source file and run it to halt.
    Run {
        /// The root source file.
        source: PathBuf,

        /// Extra include directories, searched after the source's own
        /// directory, in order.
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,

        /// Also write the assembled object file here.
        #[arg(long, value_name = "FILE")]
        emit: Option<PathBuf>,
    },

    /// Assemble a source file into an object file without running it.
    Build {
        /// The root source file.
        source: PathBuf,

        /// Extra include directories, searched after the source's own
        /// directory, in order.
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,

        /// Where to write the object file.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Disassemble an object file.
    Dis {
        /// The object file to read.
        object: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            source,
            include,
            emit,
        } => run(&source, &include, emit.as_deref()),
        Command::Build {
            source,
            include,
            output,
        } => build(&source, &include, &output),
        Command::Dis { object } => dis(&object),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(source: &Path, include: &[PathBuf], emit: Option<&Path>) -> anyhow::Result<()> {
    let file = assemble(source, include)?;
    if let Some(path) = emit {
        write_object(&file, path)?;
    }

    let mut machine = Machine::boot(&file).context("loading program into memory")?;

    println!("bedrock: running {}", source.display());
    machine.run().context("machine fault")?;
    println!();
    println!("----------------------------------------");
    println!("machine has halted");
    Ok(())
}

fn build(source: &Path, include: &[PathBuf], output: &Path) -> anyhow::Result<()> {
    let file = assemble(source, include)?;
    write_object(&file, output)?;
    tracing::info!(output = %output.display(), "object file written");
    Ok(())
}

fn dis(object: &Path) -> anyhow::Result<()> {
    let mut input = BufReader::new(
        File::open(object).with_context(|| format!("opening {}", object.display()))?,
    );
    let file = LoadableFile::load(&mut input)
        .with_context(|| format!("loading {}", object.display()))?;

    for block in &file.blocks {
        for (offset, &word) in block.words.iter().enumerate() {
            let address = block.address + offset as u32;
            println!("{address:#06x}  {word:08x}  {}", Instruction::from_word(word));
        }
    }
    Ok(())
}

fn assemble(source: &Path, include: &[PathBuf]) -> anyhow::Result<LoadableFile> {
    assemble_file(source, include).with_context(|| format!("assembling {}", source.display()))
}

fn write_object(file: &LoadableFile, path: &Path) -> anyhow::Result<()> {
    let mut out = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    file.save(&mut out)
        .with_context(|| format!("writing {}", path.display()))?;
    out.flush()
        .with_context(|| format!("flushing {}", path.display()))
}
