use clap::Parser;

/// OAuth token server backed by a browser-driven portal login
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Registered clients file path (overrides clientsPath)
    #[arg(long)]
    pub clients: Option<String>,

    /// Configuration store file path (overrides storePath)
    #[arg(long)]
    pub store: Option<String>,
}
