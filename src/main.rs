/// Точка входа: обучение модели и API сервер

use clap::Parser;
use properchy_ml::cli::{cmd_serve, cmd_train, Cli, Commands};
use properchy_ml::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "properchy_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Train { model_type, archive } => {
            // Обучение синхронное и долгое, вне рантайма
            tokio::task::spawn_blocking(move || cmd_train(&settings, model_type.as_deref(), archive)).await??;
        }
        Commands::Serve { host, port } => {
            cmd_serve(&settings, host, port).await?;
        }
    }

    Ok(())
}
