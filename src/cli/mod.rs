use std::ffi::OsString;

use clap::{ArgAction, Parser, Subcommand};

pub mod block;
pub mod daemon;
pub mod native_host;

#[derive(Parser, Debug, Clone)]
#[clap(name = "procguard")]
#[clap(about = "Application usage tracking and blocking agent")]
#[clap(version = crate::metadata::VERSION)]
#[clap(disable_help_subcommand = true)]
pub struct ProcguardOpts {
    /// Pass many times for a more verbose output. Passing `-v` adds debug logs, `-vv` enables trace logging
    #[clap(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Mode {
    #[clap(name = daemon::NAME)]
    Daemon(daemon::DaemonOpts),
    #[clap(name = native_host::NAME)]
    NativeHost(native_host::NativeHostOpts),
    /// Manage the application and web blocklists
    #[clap(name = block::NAME)]
    Block(block::BlockOpts),
}

impl ProcguardOpts {
    /// Log level requested with the verbosity flag, `None` without it.
    pub fn override_log_level(&self) -> Option<log::LevelFilter> {
        log_level_from_verbosity_flag_count(self.verbose)
    }
}

pub fn parse_from_args() -> ProcguardOpts {
    parse_from(std::env::args_os())
}

pub fn parse_from<I, T>(args: I) -> ProcguardOpts
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    ProcguardOpts::try_parse_from(args).unwrap_or_else(|e| e.exit())
}

fn log_level_from_verbosity_flag_count(num: u8) -> Option<log::LevelFilter> {
    match num {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        2..=u8::MAX => Some(log::LevelFilter::Trace),
    }
}
