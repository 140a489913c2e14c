use clap::Parser;

pub const NAME: &str = "native-host";

#[derive(Parser, Debug, Clone)]
#[clap(name = NAME)]
#[clap(about = "Native messaging host for the browser extension, speaking on stdio")]
pub struct NativeHostOpts {
    #[clap(long)]
    pub config_file: Option<String>,

    /// Arguments added by the browser, such as the extension origin. Ignored.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub browser_args: Vec<String>,
}
