use anyhow::Result;
use procguard::cli::{self, Mode};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse cli and handle clap errors
    let options = cli::parse_from_args();

    // Override the default log_level if there is a greater verbosity flag
    procguard::init_logger(options.override_log_level());

    let result = match &options.mode {
        Mode::Daemon(daemon_opts) => {
            procguard::agentd::agent_daemon_run(daemon_opts, procguard::add_modules).await
        }
        Mode::NativeHost(host_opts) => procguard::native_host::native_host_run(host_opts).await,
        Mode::Block(block_opts) => procguard::block::block_run(block_opts, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(_) => std::process::exit(0),
        Err(e) => {
            procguard::utils::report_error(&e);
            std::process::exit(1);
        }
    }
}
