//! Command-line front end: index a Rust project, resolve the types named by an operation
//! manifest and write the resulting OpenAPI document.
//!
//! ```bash
//! openapi-from-decls ./my-api-project -m operations.yaml -o openapi.yaml
//! openapi-from-decls ./my-api-project -m operations.json -f json --naming camel
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;

use openapi_from_decls::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-decls starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
