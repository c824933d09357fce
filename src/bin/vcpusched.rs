//! vcpusched - vCPU Load-Leveling Scheduler Daemon
//!
//! Rebalances running domains across the host's physical CPUs at a fixed
//! interval. Usage: vcpusched [OPTIONS] <INTERVAL_SECONDS>

use std::process::ExitCode;
use std::time::Duration;

use vcpusched::{load_config, SchedulerLoop, ShutdownToken, SimulatedHost};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // File values first, CLI flags override
    let mut config = load_config();
    let mut interval_arg: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "-V" | "--version" => {
                println!("vcpusched {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "-d" | "--debug" => {
                config.debug = true;
            }
            "-t" | "--tolerance" => {
                i += 1;
                match args.get(i).and_then(|v| v.parse::<u32>().ok()) {
                    Some(points) => config.tolerance = points,
                    None => {
                        eprintln!("--tolerance requires a whole number of percentage points");
                        return ExitCode::from(1);
                    }
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                return ExitCode::from(1);
            }
            arg => {
                if interval_arg.is_some() {
                    eprintln!("Unexpected argument: {}", arg);
                    print_usage();
                    return ExitCode::from(1);
                }
                interval_arg = Some(arg.to_string());
            }
        }
        i += 1;
    }

    let interval = match interval_arg {
        None => {
            eprintln!("Scheduling interval must be provided");
            print_usage();
            return ExitCode::from(1);
        }
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                eprintln!("Invalid interval provided");
                print_usage();
                return ExitCode::from(1);
            }
        },
    };

    init_logging(config.debug);

    log::info!("Starting vcpusched v{}", vcpusched::VERSION);

    let shutdown = ShutdownToken::new();
    let handler_token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log::error!("Failed to install SIGINT handler: {}", e);
        return ExitCode::from(1);
    }

    let host = SimulatedHost::default_fleet();
    let mut scheduler = match SchedulerLoop::new(host, interval, &config, shutdown) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            return ExitCode::from(1);
        }
    };

    scheduler.run();
    log::info!("vcpusched stopped");
    ExitCode::SUCCESS
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(default_level));
}

fn print_usage() {
    println!("vcpusched - vCPU Load-Leveling Scheduler Daemon");
    println!();
    println!("USAGE:");
    println!("    vcpusched [OPTIONS] <INTERVAL_SECONDS>");
    println!();
    println!("ARGS:");
    println!("    <INTERVAL_SECONDS>       Scheduling interval, a positive whole number of seconds");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help               Show this help message");
    println!("    -V, --version            Show version information");
    println!("    -d, --debug              Log per-domain stats and the pinning table");
    println!("    -t, --tolerance <PTS>    Stability tolerance in percentage points (default 15)");
    println!();
    println!("EXAMPLES:");
    println!("    vcpusched 5");
    println!("    vcpusched --debug --tolerance 10 2");
}
