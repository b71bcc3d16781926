use crate::api_client::DeskApi;
use crate::cards;
use std::sync::Arc;
use tracing::warn;
use vega_core::chat::entity::ChannelRef;
use vega_core::chat::error::ChatError;
use vega_core::chat::port::ChatPort;

/// # Summary
/// Text command surface (`!signals`, `!positions`, ...). Every command
/// is a direct read-through to the desk REST layer with no local state.
pub struct CommandHandler {
    chat: Arc<dyn ChatPort>,
    api: Arc<dyn DeskApi>,
    prefix: String,
}

impl CommandHandler {
    /// # Summary
    /// Creates the handler.
    pub fn new(chat: Arc<dyn ChatPort>, api: Arc<dyn DeskApi>, prefix: String) -> Self {
        Self { chat, api, prefix }
    }

    /// # Summary
    /// Executes one parsed command and replies in the same channel.
    ///
    /// # Logic
    /// 1. Map the Discord identity back to the desk user.
    /// 2. Dispatch on the command word; unknown words get a hint.
    /// 3. Any REST failure degrades to a single error reply.
    pub async fn handle(
        &self,
        discord_user_id: &str,
        channel: &ChannelRef,
        command: &str,
        _args: &[String],
    ) {
        let user_id = match self.api.user_by_discord(discord_user_id).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                self.reply(
                    channel,
                    "❌ Your Discord account is not linked to a trading account.",
                )
                .await;
                return;
            }
            Err(e) => {
                warn!("Identity lookup failed: {}", e);
                self.reply(channel, "An error occurred processing your command.").await;
                return;
            }
        };

        let result = self.dispatch(&user_id, command).await;
        match result {
            Ok(text) => self.reply(channel, &text).await,
            Err(e) => {
                warn!("Command {}{} failed: {}", self.prefix, command, e);
                self.reply(channel, "An error occurred processing your command.").await;
            }
        }
    }

    async fn dispatch(&self, user_id: &str, command: &str) -> Result<String, ChatError> {
        match command {
            "signals" => {
                let signals = self.api.pending_signals(user_id).await?;
                Ok(cards::render_pending(&signals))
            }
            "positions" => {
                let positions = self.api.open_positions(user_id).await?;
                Ok(cards::render_positions(&positions))
            }
            "pnl" => {
                let pnl = self.api.pnl_summary(user_id).await?;
                Ok(cards::render_pnl(&pnl))
            }
            "config" => {
                let config = self.api.trading_config(user_id).await?;
                Ok(cards::render_config(&config))
            }
            "pause" => {
                self.api.pause_trading(user_id).await?;
                Ok("⏸️ Signal generation paused.".to_string())
            }
            "resume" => {
                self.api.resume_trading(user_id).await?;
                Ok("▶️ Signal generation resumed.".to_string())
            }
            "help" => Ok(cards::render_help(&self.prefix)),
            _ => Ok(format!(
                "Unknown command. Use `{}help` for available commands.",
                self.prefix
            )),
        }
    }

    async fn reply(&self, channel: &ChannelRef, text: &str) {
        if let Err(e) = self.chat.send_text(channel, text).await {
            warn!("Failed to send command reply: {}", e);
        }
    }
}
