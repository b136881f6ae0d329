//! nestedtx - nested transactions over the in-memory driver
//!
//! Command-line entry point. Runs a REPL, or a script given with `-e`.

use std::process::ExitCode;

use nestedtx::repl::{print_output, Repl, Session};
use nestedtx::transaction::NodeConfig;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut savepoints = true;
    let mut execute: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-e" | "--execute" => {
                i += 1;
                if i < args.len() {
                    execute = Some(args[i].clone());
                }
            }
            "--no-savepoints" => {
                savepoints = false;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("nestedtx v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    let session = match Session::new(NodeConfig::new().savepoints(savepoints)) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match execute {
        Some(script) => execute_script(session, &script),
        None => Repl::new(session).run().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("nestedtx - nested transactions over an in-memory database");
    println!();
    println!("Usage: nestedtx [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -e, --execute SCRIPT   Execute ';'-separated statements and exit");
    println!("  --no-savepoints        Track nesting without issuing savepoints");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Set RUST_LOG=debug to trace every begin/commit/rollback decision.");
    println!();
    println!("Examples:");
    println!("  nestedtx");
    println!("  nestedtx -e 'CREATE TABLE t (id INT); BEGIN; INSERT INTO t VALUES (1); COMMIT'");
}

fn execute_script(mut session: Session, script: &str) -> Result<(), Box<dyn std::error::Error>> {
    for output in session.execute_script(script)? {
        print_output(&output, usize::MAX);
    }
    Ok(())
}
