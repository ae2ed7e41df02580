use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Quiet by default; RUST_LOG=ask=debug turns on diagnostics. Logs go to
    // stderr so they never mix with streamed response text on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = ask::cli::Args::parse();
    if let Err(err) = ask::cli::run(args).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
