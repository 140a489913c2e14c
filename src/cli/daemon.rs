use clap::Parser;

pub const NAME: &str = "daemon";

#[derive(Parser, Debug, Clone)]
#[clap(name = NAME)]
#[clap(about = "Run the procguard agent")]
pub struct DaemonOpts {
    #[clap(long)]
    pub config_file: Option<String>,
}
