use tracing_subscriber::EnvFilter;
use wizard_cli::{build_cli, execute};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = execute(&matches).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
