//! Командная строка: обучение и запуск API

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::ModelKind;
use crate::pipeline::{RunReport, TrainingPipeline};

#[derive(Parser, Debug)]
#[command(name = "properchy-ml", version, about = "House price model training and prediction API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Обучить модель на архиве и опубликовать артефакт
    Train {
        /// gradient_boosted_tree | linear_regression
        #[arg(long)]
        model_type: Option<String>,

        /// Путь к zip-архиву (по умолчанию ZIP_FILE_PATH)
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Запустить API с последним опубликованным артефактом
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

pub fn cmd_train(settings: &Settings, model_type: Option<&str>, archive: Option<PathBuf>) -> anyhow::Result<RunReport> {
    let mut settings = settings.clone();
    if let Some(tag) = model_type {
        settings = settings.with_model_kind(tag.parse::<ModelKind>()?);
    }
    if let Some(archive) = archive {
        settings = settings.with_archive_path(archive);
    }

    let report = TrainingPipeline::new(settings).run()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report)
}

pub async fn cmd_serve(settings: &Settings, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let settings = settings.with_address(host, port)?;
    crate::server::run_server(settings).await
}
