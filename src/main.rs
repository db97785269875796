use clap::Parser;
use goamet_keychain::StoreError;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("goamet_keychain=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = goamet_keychain::cli::Cli::parse();
    if let Err(e) = cli.run() {
        eprintln!("error: {:#}", e);
        let code = e
            .downcast_ref::<StoreError>()
            .map_or(1, StoreError::exit_code);
        std::process::exit(code);
    }
}
