//! CLI entry point: aggregate coursework from Canvas and Gradescope.
//!
//! Thin wrapper over the `course_sync` library facade. Results print to
//! stdout as JSON; logs go to stderr via `tracing` and are controlled with
//! `RUST_LOG`.

use clap::Parser;
use std::error::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};
use course_sync::{fetch_all_assignments, fetch_assignments, fetch_courses, test_connection};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();

    match args.command {
        Command::Courses { auth, term_filter } => {
            let credentials = auth.credentials()?;
            let courses = fetch_courses(auth.platform.into(), &credentials, &term_filter).await?;
            info!(count = courses.len(), "courses fetched");
            println!("{}", serde_json::to_string_pretty(&courses)?);
        }
        Command::Assignments { auth, course_id } => {
            let credentials = auth.credentials()?;
            let platform = auth.platform.into();
            let assignments = match course_id {
                Some(course_id) => fetch_assignments(platform, &credentials, &course_id).await?,
                None => fetch_all_assignments(platform, &credentials).await?,
            };
            info!(count = assignments.len(), "assignments fetched");
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
        Command::TestConnection { auth } => {
            let credentials = auth.credentials()?;
            let ok = test_connection(auth.platform.into(), &credentials).await?;
            info!(ok, "connection tested");
            println!("{}", serde_json::json!({ "connected": ok }));
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
