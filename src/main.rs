use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use bfjit_core::{
    assemble, compile_file, ir, CompiledProgram, Diagnostics, GeneratorOptions, Reason,
};

#[derive(Debug, StructOpt)]
#[structopt(name = "bfjit", about = "optimizing Brainfuck JIT compiler for x86-64")]
struct Opt {
    /// Brainfuck source file
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// Print the tape once the program finishes
    #[structopt(long)]
    dump: bool,

    /// Write the machine code to FILE.bin
    #[structopt(long)]
    dump_code: bool,

    /// Print the optimized opcodes instead of running the program
    #[structopt(long)]
    disassemble: bool,

    /// Give up compiling after this many errors
    #[structopt(long, default_value = "20")]
    max_errors: usize,
}

fn main() -> ExitCode {
    init_logging();
    let opt = Opt::from_args();

    let options = GeneratorOptions {
        diagnostic_limit: opt.max_errors,
    };
    let code = match compile_file(&opt.file, options) {
        Ok(code) => code,
        Err(diagnostics) => {
            report(&opt.file, &diagnostics);
            // Bracket errors mean there is nothing to run, which is not a failure.
            return if diagnostics.count_of(Reason::NoSource) > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if opt.disassemble {
        print!("{}", ir::disassemble(&code));
        return ExitCode::SUCCESS;
    }

    let binary = match assemble(&code) {
        Ok(binary) => binary,
        Err(e) => {
            eprintln!("Failed to generate machine code: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if opt.dump_code {
        dump_machine_code(&binary, &opt.file);
    }

    let program = match CompiledProgram::from_binary(&binary) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Failed to prepare machine code: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let tape = match program.run() {
        Ok(tape) => tape,
        Err(e) => {
            eprintln!("Failed to run: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if opt.dump {
        println!();
        print!("{}", tape.hex_dump());
    }

    ExitCode::SUCCESS
}

/// Logs go to stderr, so they never mix with the program's output. Set `RUST_LOG` for more.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(file: &Path, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        if diagnostic.is_fatal() {
            eprintln!("FATAL ERROR");
        }
        eprintln!("{}: {}", file.display(), diagnostic);
    }

    if diagnostics.limit_reached() {
        eprintln!("{} errors, considered fatal...", diagnostics.len());
    }
}

fn dump_machine_code(binary: &[u8], source: &Path) {
    let path = machine_code_path(source);
    match fs::write(&path, binary) {
        Ok(()) => {
            tracing::info!(path = %path.display(), bytes = binary.len(), "wrote machine code")
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not write machine code")
        }
    }
}

/// `hello.bf` becomes `hello.bf.bin`.
fn machine_code_path(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(".bin");
    PathBuf::from(name)
}
