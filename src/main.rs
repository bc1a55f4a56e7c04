use clap::{Parser, ValueEnum};
use log::{LevelFilter, info};

use intcode::logging;
use intcode::topology::{Machine, pipeline, ring};
use intcode::vm::parser::Program;

// --- Command Line Arguments ---
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Program file: a comma-separated integer listing.
    program: String,

    /// Topology to run the program in.
    #[arg(long, value_enum, default_value = "run")]
    topology: Topology,

    /// Values pre-seeded into the input port (run topology).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    inputs: Vec<i64>,

    /// Per-instance configuration values (pipeline/ring topologies).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    settings: Vec<i64>,

    /// Seed value written into the first port (pipeline/ring topologies).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    seed: i64,

    /// Debug filter to specify log topics (e.g., "vm,port,pipeline,instructions")
    #[arg(long)]
    debug_filter: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Topology {
    /// One instance; seed the input port, drain the output stream.
    Run,
    /// Linear chain of instances, one per settings value.
    Pipeline,
    /// Cyclic chain of instances, one per settings value.
    Ring,
}

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    if let Err(e) = logging::init_logger(log_level, args.debug_filter) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }

    let text = std::fs::read_to_string(&args.program).unwrap_or_else(|e| {
        eprintln!("error: cannot read {}: {}", args.program, e);
        std::process::exit(2);
    });
    let program = Program::parse(&text).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(2);
    });
    info!("loaded {} ({} words)", args.program, program.len());

    match args.topology {
        Topology::Run => {
            let mut machine = Machine::start_seeded(&program, &args.inputs);
            let outputs = machine.drain();
            if let Err(e) = machine.join() {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
            info!("instance halted with {} output value(s)", outputs.len());
            println!(
                "{}",
                outputs
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            );
        }
        Topology::Pipeline => match pipeline(&program, &args.settings, args.seed) {
            Ok(result) => println!("{}", result),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
        Topology::Ring => match ring(&program, &args.settings, args.seed) {
            Ok(result) => println!("{}", result),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
    }
}
