use std::path::PathBuf;

use clap::{Args, Subcommand};

pub const NAME: &str = "block";

#[derive(Args, Debug, Clone)]
pub struct BlockOpts {
    #[clap(long, global = true)]
    pub config_file: Option<String>,

    /// Operate on the web domain blocklist instead of the application one
    #[clap(long, global = true)]
    pub web: bool,

    #[clap(subcommand)]
    pub command: BlockCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum BlockCommand {
    /// Add names to the blocklist
    Add {
        #[clap(required = true)]
        names: Vec<String>,

        /// Also prevent this executable from being started
        #[clap(long, value_name = "PATH")]
        lock_exe: Option<PathBuf>,
    },

    /// Remove names from the blocklist
    Rm {
        #[clap(required = true)]
        names: Vec<String>,

        /// Also restore this previously locked executable
        #[clap(long, value_name = "PATH")]
        unlock_exe: Option<PathBuf>,
    },

    /// Print the blocklist
    List,

    /// Remove every entry
    Clear,

    /// Merge entries from a JSON list or an exported blocklist
    Import { file: PathBuf },

    /// Write the blocklist as JSON, to stdout by default
    Export {
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
}
