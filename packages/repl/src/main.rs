use std::path::PathBuf;
use std::process;

use clap::Parser;
use tether::{Init, Interpreter, InterpreterConfig};
use tether_repl::{config, ReplError};
use tracing_subscriber::EnvFilter;

/// tether - interactive shell for an embedded command interpreter
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script evaluated before the shell starts
    #[arg(long, value_name = "FILE")]
    init: Option<PathBuf>,

    /// Evaluate SCRIPT, print its result and exit
    #[arg(short, long, value_name = "SCRIPT")]
    eval: Option<String>,

    /// Interpreter configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Capacity of the cross-thread call queue
    #[arg(long, value_name = "N")]
    queue_capacity: Option<usize>,

    /// Force vi editing mode
    #[arg(long)]
    vi: bool,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
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

fn run(args: Args) -> Result<(), ReplError> {
    let mut interp_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => InterpreterConfig::default(),
    };
    if let Some(capacity) = args.queue_capacity {
        interp_config = interp_config.with_queue_capacity(capacity);
    }

    let init = match &args.init {
        Some(path) => {
            let script = config::read_file(path)?;
            Init::Script(String::from_utf8_lossy(&script).into_owned())
        }
        None => Init::None,
    };
    let (interp, done) = Interpreter::spawn(interp_config, init)?;

    if let Some(script) = &args.eval {
        let result = interp.evaluate_as::<String>(script);
        tether_repl::shutdown(&interp, done);
        let result = result?;
        if !result.is_empty() {
            println!("{}", result);
        }
        return Ok(());
    }

    tether_repl::run(interp, done, args.vi)?;
    Ok(())
}
