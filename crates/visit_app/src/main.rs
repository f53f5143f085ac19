use tracing_subscriber::EnvFilter;
use visit_app::app::{run, AppConfig};

fn main() {
    // stdout belongs to the dashboard screen
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config) {
        eprintln!("Visit dashboard stopped: {err:#}");
    }
}
