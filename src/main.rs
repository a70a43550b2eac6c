use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use telecloner::config::Config;
use telecloner::core::engine::Engine;
use telecloner::core::runner::GcloneTool;
use telecloner::telegram::api::{ChatStatusSink, TelegramApi};
use telecloner::telegram::bot::Bot;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    Command::new("telecloner")
        .about("Telegram bot that clones Google Drive folders through gclone")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run").about("Start the bot").arg(
                Arg::new("config")
                    .long("config")
                    .help("Path to the TOML configuration file")
                    .default_value("telecloner.toml")
                    .num_args(1),
            ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = build_cli().get_matches();
    match matches.subcommand() {
        Some(("run", m)) => {
            let config_path: PathBuf = m.get_one::<String>("config").unwrap().into();
            let config = Config::load(&config_path)?;
            config.validate()?;

            let gclone = config.resolve_gclone()?;
            info!(gclone = %gclone.display(), "startup checks passed");

            let api = Arc::new(TelegramApi::new(&config.token));
            let status_chat = config.allowed_chats.first().copied().unwrap_or_default();
            let sink = Arc::new(ChatStatusSink::new(api.clone(), status_chat));
            let tool = Arc::new(GcloneTool::new(
                gclone,
                config.gclone_config.clone(),
                config.remote.clone(),
                config.destination_folder.clone(),
            ));

            let engine = Engine::new(
                tool,
                sink,
                config.destination_folder_name.clone(),
                Duration::from_secs(config.edit_interval_secs),
                config.max_concurrent_batches,
            );

            let bot = Bot::new(api, engine, config.allowed_chats.clone());
            bot.run().await
        }
        _ => Ok(()),
    }
}
