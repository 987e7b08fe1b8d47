//! Kodegen Bundler Package - application packaging pipeline.
//!
//! This binary packages an application directory for one or more platforms
//! and architectures with proper error handling and artifact reporting.

use kodegen_bundler_package::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            for suggestion in e.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            1
        }
    };

    process::exit(exit_code);
}
