use clap::Parser;
use tracing_subscriber::EnvFilter;

use diffdrive_runtime::runtime::Mode;

#[derive(Parser)]
#[command(about = "Differential-drive robot control runtime")]
struct Args {
    /// Control loop variant(s) to run
    #[arg(long, value_enum, default_value = "vision")]
    mode: Mode,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    if let Err(e) = diffdrive_runtime::runtime::run(args.mode).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
