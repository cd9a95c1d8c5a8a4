use std::{error::Error, sync::Arc};

use log::{debug, error};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId, ReplyMarkup},
    utils::command::BotCommands,
};
use tokio::sync::Mutex;

use crate::actions::Button;
use crate::calendar::current_datetime;
use crate::config::Config;
use crate::dialogue::{Keyboard, Reply, Router, BOOK_BUTTON, CANCEL_BUTTON, VIEW_BUTTON};
use crate::registry::Registry;

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

// Один реестр на процесс, обработчики получают его через dptree
pub type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "главное меню")]
    Start,
    #[command(description = "как записаться")]
    Help,
}

pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, config: Arc<Config>, registry: SharedRegistry) -> HandlerResult {
    let chat_id = msg.chat.id;
    let replies = {
        let mut registry = registry.lock().await;
        let mut router = Router::new(&config, &mut *registry, chat_id.0, current_datetime());
        match cmd {
            Command::Start => router.start(),
            Command::Help => router.help(),
        }
    };
    send_replies(&bot, chat_id, None, replies).await
}

pub async fn handle_message(bot: Bot, msg: Message, config: Arc<Config>, registry: SharedRegistry) -> HandlerResult {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let replies = {
        let mut registry = registry.lock().await;
        Router::new(&config, &mut *registry, chat_id.0, current_datetime()).on_text(text)
    };
    send_replies(&bot, chat_id, None, replies).await
}

pub async fn handle_callback_query(bot: Bot, q: CallbackQuery, config: Arc<Config>, registry: SharedRegistry) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        debug!("Callback {} without accessible message", data);
        return Ok(());
    };

    let chat_id = message.chat.id;
    let replies = {
        let mut registry = registry.lock().await;
        Router::new(&config, &mut *registry, chat_id.0, current_datetime()).on_action(data)
    };
    send_replies(&bot, chat_id, Some(message.id), replies).await
}

async fn send_replies(bot: &Bot, chat_id: ChatId, source: Option<MessageId>, replies: Vec<Reply>) -> HandlerResult {
    for reply in replies {
        match (reply.replace, source, reply.keyboard) {
            (true, Some(message_id), Keyboard::Inline(rows)) => {
                bot.edit_message_text(chat_id, message_id, reply.text)
                    .reply_markup(inline_markup(rows))
                    .await?;
            }
            (_, _, keyboard) => {
                let request = bot.send_message(chat_id, reply.text);
                let result = match keyboard {
                    Keyboard::None => request.await,
                    Keyboard::MainMenu => request.reply_markup(ReplyMarkup::Keyboard(main_menu_markup())).await,
                    Keyboard::Inline(rows) => request
                        .reply_markup(ReplyMarkup::InlineKeyboard(inline_markup(rows)))
                        .await,
                };
                if let Err(err) = result {
                    error!("Failed to send message to {}: {}", chat_id, err);
                    return Err(err.into());
                }
            }
        }
    }
    Ok(())
}

fn inline_markup(rows: Vec<Vec<Button>>) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|b| InlineKeyboardButton::callback(b.label, b.action.token()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(keyboard)
}

fn main_menu_markup() -> KeyboardMarkup {
    let buttons: Vec<Vec<KeyboardButton>> = vec![
        vec![KeyboardButton::new(BOOK_BUTTON)],
        vec![KeyboardButton::new(VIEW_BUTTON)],
        vec![KeyboardButton::new(CANCEL_BUTTON)],
    ];
    KeyboardMarkup::new(buttons).resize_keyboard()
}
