//! Validation suite runner for the Gemini connector.

use clap::Parser;

use gemini_connector::{init_tracing, Validator};

#[derive(Parser)]
#[command(name = "gemini-validate", version, about = "Gemini connector validation suite")]
struct Args {
    /// Skip API tests (offline mode)
    #[arg(long)]
    offline: bool,

    /// Perform rollback only
    #[arg(long)]
    rollback: bool,

    /// Generate a report without running validation
    #[arg(long)]
    report_only: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _log_guard = init_tracing(
        &std::env::var("GEMINI_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        None,
    );

    let mut validator = Validator::new();

    if args.rollback {
        println!("Performing rollback...");
        if let Err(err) = validator.rollback() {
            eprintln!("Rollback failed: {err}");
            std::process::exit(1);
        }
        return;
    }

    if args.report_only {
        println!("Generating validation report...");
        if let Err(err) = validator.save_report() {
            eprintln!("Failed to save report: {err}");
            std::process::exit(1);
        }
        return;
    }

    let success = validator.run_full(args.offline).await;
    if !success {
        println!("\nRun again with --rollback to undo validation side effects.");
    }
    std::process::exit(if success { 0 } else { 1 });
}
