use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli_table::{print_stdout, WithTitle};

use crate::app::App;

mod api;
mod app;
mod auth;
mod favorites;
mod ndef;
mod utils;
mod web;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = app::Cli::parse();

    let mut logger = simple_logger::SimpleLogger::new().with_utc_timestamps();

    logger = match cli.verbose {
        1 => logger.with_level(log::LevelFilter::Info),
        2 => logger.with_level(log::LevelFilter::Debug),
        3 => logger.with_level(log::LevelFilter::Trace),
        _ => logger.with_level(log::LevelFilter::Error),
    };

    logger.init()?;

    match &cli.command {
        app::Commands::Serve { listen } => {
            let app_instance = App::new(&cli.settings)?;

            web::serve(Arc::new(app_instance.into_web_state()), *listen).await?;
        }
        app::Commands::Discover => {
            let app_instance = App::new(&cli.settings)?;
            let (households, groups) = app_instance.discover().await?;

            print_stdout(households.with_title())?;
            print_stdout(groups.with_title())?;
        }
        app::Commands::Token => {
            let app_instance = App::new(&cli.settings)?;
            let lifetime = app_instance.token_lifetime().await?;

            println!(
                "Access token is valid for {}s (until {}).",
                lifetime,
                App::expiry_time(lifetime)
            );
        }
        app::Commands::Tag { dump } => {
            let timeout = Duration::from_secs(cli.settings.http_timeout);
            let status = app::trigger_tag(dump, timeout).await?;

            println!("Tag URL answered with HTTP {}.", status);
        }
    }

    Ok(())
}
