//! MAGPIE process entry point: one binary, two roles.
//!
//! ```text
//! magpie master <FILE> <PORT>
//! magpie worker <HOST> <PORT> <IMPL>
//! ```
//!
//! Exit codes: 0 success, 1 argument error, 3 unknown role, 4 uncaught
//! error. SIGINT requests a graceful shutdown of either role.

use tracing::{error, info, Level};

use magpie_node::{master, worker};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        syntax(&args);
        return 1;
    }

    match args[1].as_str() {
        "master" => {
            if args.len() != 4 {
                syntax(&args);
                return 1;
            }
            let file = args[2].clone();
            let port = match args[3].parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    eprintln!("Invalid port '{}'", args[3]);
                    return 1;
                }
            };

            info!(port, "starting master");
            match master::run(file, port).await {
                Ok(()) => {
                    info!(port, "stopping master");
                    0
                }
                Err(e) => {
                    error!("{e}");
                    4
                }
            }
        }
        "worker" => {
            if args.len() != 5 {
                syntax(&args);
                return 1;
            }
            let host = args[2].clone();
            let port = match args[3].parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    eprintln!("Invalid port '{}'", args[3]);
                    return 1;
                }
            };
            let implementation = args[4].clone();

            info!(host = %host, port, "starting worker");
            match worker::run(host, port, implementation).await {
                Ok(()) => {
                    info!("stopping worker");
                    0
                }
                Err(e) => {
                    error!("{e}");
                    4
                }
            }
        }
        role => {
            error!("Unknown role '{role}'");
            3
        }
    }
}

fn syntax(args: &[String]) {
    let prog = args.first().map(String::as_str).unwrap_or("magpie");
    eprintln!("Usage: {prog} master <FILE> <PORT> | worker <HOST> <PORT> <IMPL>");
}
