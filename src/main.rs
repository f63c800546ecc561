use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ipl_lang::interpreter::{DEFAULT_MAX_CALL_DEPTH, SOURCE_EXTENSION};
use ipl_lang::{Interpreter, InterpreterOptions};

#[derive(Parser, Debug)]
#[command(name = "ipl", version, about = "Run an IPL script")]
struct Args {
    /// Path to the .ipl script to execute.
    script: PathBuf,
    /// Extra directories searched by `import`.
    #[arg(long = "lib-path", env = "IPL_PATH", value_delimiter = ':')]
    lib_path: Vec<PathBuf>,
    /// Fixed seed for `random`.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

fn main() {
    install_tracing();
    let args = Args::parse();

    if let Err(message) = run(&args) {
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), String> {
    check_script(&args.script)?;

    let interpreter = Interpreter::with_options(InterpreterOptions {
        search_paths: args.lib_path.clone(),
        max_call_depth: args.max_call_depth,
        seed: args.seed,
    });
    interpreter
        .run_file(&args.script)
        .map(|_| ())
        .map_err(|err| err.to_string())
}

fn check_script(path: &Path) -> Result<(), String> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION) {
        return Err(format!(
            "'{}' is not a .{} file",
            path.display(),
            SOURCE_EXTENSION
        ));
    }
    if !path.is_file() {
        return Err(format!("Source file '{}' not found", path.display()));
    }
    Ok(())
}

fn install_tracing() {
    let filter = EnvFilter::try_from_env("IPL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
