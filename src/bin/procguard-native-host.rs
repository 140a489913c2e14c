//! Native messaging host executable referenced by the browser manifests.
//!
//! Browsers start the host without a subcommand, passing the extension origin
//! (and on some platforms a window handle) as arguments.

use anyhow::Result;
use clap::Parser;
use procguard::cli::native_host::NativeHostOpts;

#[tokio::main]
async fn main() -> Result<()> {
    let opts = NativeHostOpts::parse();

    procguard::init_logger(None);

    match procguard::native_host::native_host_run(&opts).await {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            procguard::utils::report_error(&e);
            std::process::exit(1);
        }
    }
}
