use std::sync::Arc;

use salon_bot::config::Config;
use salon_bot::handlers::{handle_callback_query, handle_command, handle_message, Command, SharedRegistry};
use salon_bot::registry::Registry;
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::Mutex;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    let registry: SharedRegistry = Arc::new(Mutex::new(Registry::new()));

    let bot = Bot::from_env();
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", err);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    info!("Starting {} bot...", config.studio_name);
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![config, registry])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
