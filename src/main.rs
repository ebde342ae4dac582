use captcha_solver::fetch::{read_captcha, solve_bytes};
use captcha_solver::{server, Args, Command, Config, Recognizer};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = args.command.clone().unwrap_or(Command::Serve);
    let config = Config::from(args);

    match command {
        Command::Serve => {
            tracing::info!("Starting captcha-solver v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Binding to {}:{}", config.host, config.port);
            server::run(config).await
        }
        Command::Solve { input } => tokio::task::spawn_blocking(move || solve(&config, &input)).await?,
    }
}

/// Recognize a single captcha and print the result as JSON
fn solve(config: &Config, input: &str) -> anyhow::Result<()> {
    let mut recognizer = Recognizer::new(&config.digits_model, &config.operators_model)
        .with_pipeline(config.pipeline());
    recognizer.try_load_models()?;

    let bytes = read_captcha(input, config.download_timeout)?;
    let recognition = solve_bytes(&recognizer, &bytes, config.background_threshold)?;

    println!("{}", serde_json::to_string_pretty(&recognition)?);
    Ok(())
}
