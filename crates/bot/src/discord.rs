use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use vega_core::chat::entity::{CardUpdate, ChannelRef, MessageRef, SignalCard};
use vega_core::chat::error::ChatError;
use vega_core::chat::port::ChatPort;

/// # Summary
/// A `ChatPort` implementation backed by the Discord REST API.
///
/// # Invariants
/// * `bot_token` must be a valid bot token with the DM scope.
/// * All calls are plain HTTPS requests; the gateway connection is a
///   separate concern (see [`crate::gateway`]).
pub struct DiscordRest {
    /// The bot token.
    bot_token: String,
    /// REST base URL, e.g. `https://discord.com/api/v10`.
    api_base: String,
    /// The HTTP client used for requests.
    client: reqwest::Client,
}

/// Embed field payload.
#[derive(Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: &'a str,
    inline: bool,
}

impl DiscordRest {
    /// # Summary
    /// Creates a new `DiscordRest`.
    ///
    /// # Arguments
    /// * `bot_token` - The Discord bot token.
    /// * `api_base` - REST base URL (configurable for tests).
    pub fn new(bot_token: String, api_base: String) -> Self {
        Self {
            bot_token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// Issues an authenticated POST and decodes the JSON response body.
    async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ChatError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(payload)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Platform(format!(
                "Discord API error: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChatError::Platform(e.to_string()))
    }

    /// Builds the embed JSON for a signal card.
    fn embed_json(card: &SignalCard) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = card
            .fields
            .iter()
            .map(|f| {
                json!(EmbedField {
                    name: &f.name,
                    value: &f.value,
                    inline: f.inline,
                })
            })
            .collect();

        let mut embed = json!({
            "title": card.title,
            "color": card.color,
            "fields": fields,
        });
        if let Some(description) = &card.description {
            embed["description"] = json!(description);
        }
        if let Some(footer) = &card.footer {
            embed["footer"] = json!({ "text": footer });
        }
        embed
    }

    /// Builds the action row with the three mutually exclusive buttons.
    fn action_row(signal_id: &str) -> serde_json::Value {
        json!([{
            "type": 1,
            "components": [
                {
                    "type": 2,
                    "style": 3,
                    "label": "✅ Confirm",
                    "custom_id": format!("confirm_{}", signal_id),
                },
                {
                    "type": 2,
                    "style": 4,
                    "label": "❌ Reject",
                    "custom_id": format!("reject_{}", signal_id),
                },
                {
                    "type": 2,
                    "style": 1,
                    "label": "📊 Details",
                    "custom_id": format!("details_{}", signal_id),
                },
            ],
        }])
    }
}

#[async_trait]
impl ChatPort for DiscordRest {
    /// # Summary
    /// Opens (or reuses) the DM channel with the given Discord user.
    ///
    /// # Logic
    /// `POST /users/@me/channels` is idempotent on the Discord side:
    /// it returns the existing DM channel when one already exists.
    async fn open_dm(&self, discord_user_id: &str) -> Result<ChannelRef, ChatError> {
        let url = format!("{}/users/@me/channels", self.api_base);
        let body = self
            .post_json(&url, &json!({ "recipient_id": discord_user_id }))
            .await?;

        let channel_id = body["id"]
            .as_str()
            .ok_or_else(|| ChatError::Platform("DM channel response missing id".into()))?;
        Ok(ChannelRef(channel_id.to_string()))
    }

    /// # Summary
    /// Sends a signal card, optionally with the action row attached.
    async fn send_card(
        &self,
        channel: &ChannelRef,
        card: &SignalCard,
    ) -> Result<MessageRef, ChatError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel.0);

        let mut payload = json!({ "embeds": [Self::embed_json(card)] });
        if card.with_actions
            && let Some(signal_id) = &card.signal_id
        {
            payload["components"] = Self::action_row(signal_id);
        }

        let body = self.post_json(&url, &payload).await?;
        let message_id = body["id"]
            .as_str()
            .ok_or_else(|| ChatError::Platform("Message response missing id".into()))?;
        Ok(MessageRef(message_id.to_string()))
    }

    /// # Summary
    /// Rewrites a rendered card into a terminal visual state and strips
    /// every action button.
    async fn update_card(
        &self,
        channel: &ChannelRef,
        message: &MessageRef,
        update: &CardUpdate,
    ) -> Result<(), ChatError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel.0, message.0
        );

        let payload = json!({
            "embeds": [{ "title": update.title, "color": update.color }],
            "components": [],
        });

        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Platform(format!(
                "Discord API error: {}",
                error_text
            )));
        }
        Ok(())
    }

    /// # Summary
    /// Sends a plain-text message (command replies).
    async fn send_text(&self, channel: &ChannelRef, text: &str) -> Result<(), ChatError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel.0);
        self.post_json(&url, &json!({ "content": text })).await?;
        Ok(())
    }

    /// # Summary
    /// Replies to a button interaction with an ephemeral message
    /// (type 4 callback, flags 64 = only visible to the actor).
    async fn ack_interaction(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        text: &str,
        card: Option<&SignalCard>,
    ) -> Result<(), ChatError> {
        let url = format!(
            "{}/interactions/{}/{}/callback",
            self.api_base, interaction_id, interaction_token
        );

        let mut data = json!({ "content": text, "flags": 64 });
        if let Some(card) = card {
            data["embeds"] = json!([Self::embed_json(card)]);
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&json!({ "type": 4, "data": data }))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Platform(format!(
                "Discord API error: {}",
                error_text
            )));
        }
        Ok(())
    }
}
