use crate::api_client::{ActionOutcome, DeskApi, SignalRecord};
use crate::cards;
use crate::commands::CommandHandler;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};
use vega_core::bus::entity::{BusMessage, CHANNEL_SIGNALS_ALL, CHANNEL_SIGNALS_UPDATED, PATTERN_POSITIONS, PositionUpdateEvent};
use vega_core::bus::port::{BusStream, EventBus};
use vega_core::cache::port::{Cache, CacheExt};
use vega_core::chat::entity::{CardAction, ChannelRef, ChatEvent, MessageRef};
use vega_core::chat::port::ChatPort;
use vega_core::signal::entity::TradeSignal;

impl From<&TradeSignal> for SignalRecord {
    fn from(s: &TradeSignal) -> Self {
        Self {
            id: s.id.0.clone(),
            user_id: s.user_id.clone(),
            symbol: s.symbol.clone(),
            strategy_type: s.strategy_type.clone(),
            action: s.action.to_string(),
            option_symbol: s.option_symbol.clone(),
            strike_price: s.strike_price.to_string(),
            expiration_date: s.expiration_date.to_string(),
            option_type: s.option_type.to_string(),
            quantity: s.quantity,
            limit_price: s.limit_price.map(|p| p.to_string()),
            confidence_score: s.confidence_score,
            reasoning: s.reasoning.clone(),
            market_conditions: s.market_conditions.clone(),
            status: s.status.to_string(),
            expires_at: s.expires_at,
            created_at: s.created_at,
        }
    }
}

/// Local bookkeeping for one rendered card.
struct PendingEntry {
    channel: ChannelRef,
    message: MessageRef,
    symbol: String,
    watchdog: AbortHandle,
}

/// # Summary
/// The Discord bridge proper: renders `signals:all` events as
/// interactive DM cards and translates button clicks back into desk
/// REST calls with `source = "chat"`.
///
/// # Invariants
/// * `pending` is liveness state only: the stored record is always the
///   source of truth, and the watchdog re-fetches before editing.
/// * Delivery failures (unresolved identity, DM refused, REST down)
///   degrade to log-and-drop; there is no retry queue. The web surface
///   still sees the signal through its own pull path.
pub struct SignalBridge {
    chat: Arc<dyn ChatPort>,
    api: Arc<dyn DeskApi>,
    cache: Arc<dyn Cache>,
    commands: CommandHandler,
    pending: DashMap<String, PendingEntry>,
}

impl SignalBridge {
    /// # Summary
    /// Creates the bridge.
    ///
    /// # Arguments
    /// * `chat` - Outbound chat transport (Discord REST in production).
    /// * `api` - Typed desk REST client.
    /// * `cache` - Liveness cache for chat-identity lookups.
    /// * `command_prefix` - Text command prefix, usually `!`.
    pub fn new(
        chat: Arc<dyn ChatPort>,
        api: Arc<dyn DeskApi>,
        cache: Arc<dyn Cache>,
        command_prefix: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            chat: chat.clone(),
            api: api.clone(),
            cache,
            commands: CommandHandler::new(chat, api, command_prefix),
            pending: DashMap::new(),
        })
    }

    /// # Summary
    /// Spawns the consumer loops: three bus subscriptions plus the
    /// inbound chat-event queue fed by the gateway connection.
    pub fn spawn(
        self: &Arc<Self>,
        bus: &Arc<dyn EventBus>,
        mut events: mpsc::Receiver<ChatEvent>,
    ) -> Vec<JoinHandle<()>> {
        info!("Signal bridge subscribing to bus channels");
        let mut handles = vec![
            self.clone().consume_bus(bus.subscribe(CHANNEL_SIGNALS_ALL)),
            self.clone().consume_bus(bus.subscribe(CHANNEL_SIGNALS_UPDATED)),
            self.clone().consume_bus(bus.subscribe_pattern(PATTERN_POSITIONS)),
        ];

        let bridge = self.clone();
        handles.push(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                bridge.handle_chat_event(event).await;
            }
        }));
        handles
    }

    /// One bus subscription loop. A malformed payload is logged and
    /// skipped; the loop itself never dies.
    fn consume_bus(self: Arc<Self>, mut stream: BusStream) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match BusMessage::decode(&frame.channel, &frame.payload) {
                    Ok(BusMessage::Signal(signal)) => self.handle_new_signal(&signal).await,
                    Ok(BusMessage::SignalUpdate(signal)) => {
                        self.handle_signal_update(&signal).await;
                    }
                    Ok(BusMessage::Position(update)) => {
                        self.handle_position_update(&update).await;
                    }
                    Ok(BusMessage::Notification(_)) => {}
                    Err(e) => warn!("Dropping undecodable bus frame: {}", e),
                }
            }
        })
    }

    /// # Summary
    /// Renders a freshly generated signal into the owner's DM.
    ///
    /// # Logic
    /// 1. Resolve the owner's Discord identity (cache, then desk REST);
    ///    unresolved or unreachable → log and drop, no retry.
    /// 2. Open the DM channel and send the interactive card.
    /// 3. Remember the message and arm the local expiry watchdog.
    async fn handle_new_signal(self: &Arc<Self>, signal: &TradeSignal) {
        info!("New signal received: {} for {}", signal.id, signal.symbol);

        let Some(discord_user_id) = self.resolve_discord_id(&signal.user_id).await else {
            warn!("No Discord ID found for user {}", signal.user_id);
            return;
        };

        let channel = match self.chat.open_dm(&discord_user_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to open DM for {}: {}", discord_user_id, e);
                return;
            }
        };

        let record = SignalRecord::from(signal);
        let message = match self.chat.send_card(&channel, &cards::signal_card(&record)).await {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to deliver signal {} to chat: {}", signal.id, e);
                return;
            }
        };

        let watchdog = self.arm_watchdog(signal);
        self.pending.insert(
            signal.id.0.clone(),
            PendingEntry {
                channel,
                message,
                symbol: signal.symbol.clone(),
                watchdog,
            },
        );
        info!("Signal {} sent to user {}", signal.id, discord_user_id);
    }

    /// Arms the per-card expiry timer. The timer is optimistic UI: on
    /// fire it re-fetches the record and renders the *actual* state, so
    /// a confirm that won moments earlier is never painted over.
    fn arm_watchdog(self: &Arc<Self>, signal: &TradeSignal) -> AbortHandle {
        let bridge = self.clone();
        let signal_id = signal.id.0.clone();
        let delay = (signal.expires_at - chrono::Utc::now())
            .to_std()
            .unwrap_or_default();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bridge.watchdog_fire(&signal_id).await;
        });
        task.abort_handle()
    }

    /// Watchdog body, split out for clarity.
    async fn watchdog_fire(self: &Arc<Self>, signal_id: &str) {
        // 已经被交互或回声收尾的卡片什么都不用做
        let Some((_, entry)) = self.pending.remove(signal_id) else {
            return;
        };

        let update = match self.api.get_signal(signal_id).await {
            // 以服务端状态为准：可能已被抢先确认/拒绝
            Ok(Some(record)) => cards::terminal_update(&record.status, &record.symbol)
                .unwrap_or_else(|| cards::expired_update(&record.symbol)),
            Ok(None) | Err(_) => cards::expired_update(&entry.symbol),
        };

        if let Err(e) = self.chat.update_card(&entry.channel, &entry.message, &update).await {
            warn!("Failed to edit expired card for {}: {}", signal_id, e);
        } else {
            info!("Signal {} card marked expired locally", signal_id);
        }
    }

    /// # Summary
    /// Consumes the cross-surface echo: a transition that happened on
    /// any surface (web confirm, expiry sweep) reconciles the rendered
    /// card and cancels the local watchdog.
    async fn handle_signal_update(&self, signal: &TradeSignal) {
        let Some((_, entry)) = self.pending.remove(&signal.id.0) else {
            return;
        };
        entry.watchdog.abort();

        let Some(update) = cards::terminal_update(&signal.status.to_string(), &signal.symbol)
        else {
            return;
        };
        if let Err(e) = self.chat.update_card(&entry.channel, &entry.message, &update).await {
            warn!("Failed to reconcile card for {}: {}", signal.id, e);
        } else {
            info!("Signal {} card reconciled to {}", signal.id, signal.status);
        }
    }

    /// # Summary
    /// DMs a P&L card when a position is closed.
    async fn handle_position_update(&self, update: &PositionUpdateEvent) {
        if update.kind != "position_closed" {
            return;
        }

        let Some(discord_user_id) = self.resolve_discord_id(&update.user_id).await else {
            return;
        };
        let channel = match self.chat.open_dm(&discord_user_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to open DM for {}: {}", discord_user_id, e);
                return;
            }
        };
        if let Err(e) = self
            .chat
            .send_card(&channel, &cards::position_closed_card(update))
            .await
        {
            warn!("Failed to deliver position-closed notice: {}", e);
        }
    }

    /// Dispatches one inbound chat event.
    async fn handle_chat_event(self: &Arc<Self>, event: ChatEvent) {
        match event {
            ChatEvent::Command {
                discord_user_id,
                channel_id,
                command,
                args,
            } => {
                self.commands
                    .handle(&discord_user_id, &channel_id, &command, &args)
                    .await;
            }
            ChatEvent::Action {
                discord_user_id,
                interaction_id,
                interaction_token,
                channel_id,
                message_id,
                action,
                signal_id,
            } => {
                self.handle_action(
                    &discord_user_id,
                    &interaction_id,
                    &interaction_token,
                    &channel_id,
                    &message_id,
                    action,
                    &signal_id,
                )
                .await;
            }
        }
    }

    /// # Summary
    /// Handles a card button click.
    ///
    /// # Logic
    /// - Details: ephemeral reply with market snapshot + reasoning.
    /// - Confirm/Reject: map the Discord identity back to the desk
    ///   user, call the REST transition with `source = "chat"`, then
    ///   edit the original card on success. A race loser renders
    ///   "no longer available": idempotent UI, never an error page.
    #[allow(clippy::too_many_arguments)]
    async fn handle_action(
        &self,
        discord_user_id: &str,
        interaction_id: &str,
        interaction_token: &str,
        channel_id: &ChannelRef,
        message_id: &MessageRef,
        action: CardAction,
        signal_id: &str,
    ) {
        let ack = |text: String| async move {
            if let Err(e) = self
                .chat
                .ack_interaction(interaction_id, interaction_token, &text, None)
                .await
            {
                warn!("Failed to ack interaction: {}", e);
            }
        };

        if action == CardAction::Details {
            match self.api.get_signal(signal_id).await {
                Ok(Some(record)) => {
                    if let Err(e) = self
                        .chat
                        .ack_interaction(
                            interaction_id,
                            interaction_token,
                            "",
                            Some(&cards::details_card(&record)),
                        )
                        .await
                    {
                        warn!("Failed to send details reply: {}", e);
                    }
                }
                Ok(None) => ack("❌ Signal not found.".to_string()).await,
                Err(e) => {
                    warn!("Failed to fetch signal details: {}", e);
                    ack("❌ Failed to fetch signal details.".to_string()).await;
                }
            }
            return;
        }

        let user_id = match self.api.user_by_discord(discord_user_id).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                ack("❌ Your Discord account is not linked to a trading account.".to_string())
                    .await;
                return;
            }
            Err(e) => {
                warn!("Identity lookup failed: {}", e);
                ack("❌ An error occurred processing your request.".to_string()).await;
                return;
            }
        };

        let outcome = match action {
            CardAction::Confirm => self.api.confirm(signal_id, &user_id).await,
            CardAction::Reject => self.api.reject(signal_id, &user_id).await,
            CardAction::Details => unreachable!("handled above"),
        };

        match outcome {
            Ok(ActionOutcome::Applied(record)) => {
                // 收尾本地簿记并改写原始卡片
                if let Some((_, entry)) = self.pending.remove(signal_id) {
                    entry.watchdog.abort();
                }
                let update = match action {
                    CardAction::Confirm => cards::confirmed_update(&record.symbol),
                    _ => cards::rejected_update(&record.symbol),
                };
                if let Err(e) = self.chat.update_card(channel_id, message_id, &update).await {
                    warn!("Failed to edit card after action: {}", e);
                }
                let reply = match action {
                    CardAction::Confirm => "✅ Trade signal confirmed! Executing order...",
                    _ => "❌ Trade signal rejected.",
                };
                ack(reply.to_string()).await;
                info!("Signal {} {} by discord user {}", signal_id, record.status, discord_user_id);
            }
            Ok(ActionOutcome::NoLongerAvailable) => {
                // 竞争失败或已过期：卡片交给回声/看门狗收尾
                ack("⏰ This signal is no longer available.".to_string()).await;
            }
            Err(e) => {
                warn!("Transition call failed for {}: {}", signal_id, e);
                ack("❌ An error occurred processing your request.".to_string()).await;
            }
        }
    }

    /// Resolves a desk user's Discord identity through the liveness
    /// cache, falling back to the desk REST lookup.
    async fn resolve_discord_id(&self, user_id: &str) -> Option<String> {
        let key = format!("discord_id:{}", user_id);
        if let Ok(Some(cached)) = self.cache.get::<String>(&key).await {
            return Some(cached);
        }

        match self.api.discord_id_for(user_id).await {
            Ok(Some(discord_id)) => {
                if let Err(e) = self.cache.set(&key, &discord_id).await {
                    warn!("Failed to cache identity for {}: {}", user_id, e);
                }
                Some(discord_id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Identity lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }

    /// Number of cards still awaiting an outcome (test observability).
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
