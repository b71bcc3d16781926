use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use vega_core::chat::error::ChatError;

/// # Summary
/// Signal record as served by the desk gateway (wire contract shapes:
/// decimals as strings, timestamps as ISO 8601).
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRecord {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub strategy_type: String,
    pub action: String,
    pub option_symbol: String,
    pub strike_price: String,
    pub expiration_date: String,
    pub option_type: String,
    pub quantity: i64,
    pub limit_price: Option<String>,
    pub confidence_score: Option<f64>,
    pub reasoning: Option<String>,
    pub market_conditions: Option<serde_json::Value>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Open position row from `GET /positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionRecord {
    pub symbol: String,
    pub option_symbol: String,
    pub quantity: i64,
    pub entry_price: String,
    pub current_price: Option<String>,
    pub unrealized_pnl: Option<String>,
    pub status: String,
}

/// PnL summary from `GET /analytics/pnl`.
#[derive(Debug, Clone, Deserialize)]
pub struct PnlRecord {
    pub realized_pnl: String,
    pub unrealized_pnl: String,
    pub open_positions: i64,
    pub closed_positions: i64,
    pub win_rate: Option<f64>,
}

/// Trading config from `GET /users/{id}/config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigRecord {
    pub max_position_size: String,
    pub max_daily_trades: i64,
    pub min_confidence: f64,
    pub trading_enabled: bool,
}

/// # Summary
/// Outcome of a confirm/reject round trip. A race loser is an expected,
/// non-error outcome the UI renders as "no longer available".
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// This caller won the transition.
    Applied(SignalRecord),
    /// Someone (or the expiry sweep) got there first.
    NoLongerAvailable,
}

/// # Summary
/// Typed client for every desk REST call the bridge makes.
/// Abstracted as a trait so bridge tests can substitute a scripted fake.
#[async_trait]
pub trait DeskApi: Send + Sync {
    /// `GET /users/{id}/discord`: chat identity for a desk user.
    async fn discord_id_for(&self, user_id: &str) -> Result<Option<String>, ChatError>;

    /// `GET /users/by-discord/{id}`: desk user owning a chat identity.
    async fn user_by_discord(&self, discord_user_id: &str) -> Result<Option<String>, ChatError>;

    /// `GET /signals/{id}`: full record, None when unknown.
    async fn get_signal(&self, signal_id: &str) -> Result<Option<SignalRecord>, ChatError>;

    /// `GET /signals/pending?user_id=`: pending list.
    async fn pending_signals(&self, user_id: &str) -> Result<Vec<SignalRecord>, ChatError>;

    /// `POST /signals/{id}/confirm {source:"chat", user_id}`.
    async fn confirm(&self, signal_id: &str, user_id: &str) -> Result<ActionOutcome, ChatError>;

    /// `POST /signals/{id}/reject {source:"chat", user_id}`.
    async fn reject(&self, signal_id: &str, user_id: &str) -> Result<ActionOutcome, ChatError>;

    /// `GET /positions?user_id=`.
    async fn open_positions(&self, user_id: &str) -> Result<Vec<PositionRecord>, ChatError>;

    /// `GET /analytics/pnl?user_id=`.
    async fn pnl_summary(&self, user_id: &str) -> Result<PnlRecord, ChatError>;

    /// `GET /users/{id}/config`.
    async fn trading_config(&self, user_id: &str) -> Result<ConfigRecord, ChatError>;

    /// `POST /trading/pause {user_id}`.
    async fn pause_trading(&self, user_id: &str) -> Result<(), ChatError>;

    /// `POST /trading/resume {user_id}`.
    async fn resume_trading(&self, user_id: &str) -> Result<(), ChatError>;
}

/// # Summary
/// Production `DeskApi` over HTTP, authenticated with the service token
/// issued at startup.
pub struct HttpDeskApi {
    base_url: String,
    service_token: String,
    client: reqwest::Client,
}

impl HttpDeskApi {
    /// # Summary
    /// Creates a new client.
    ///
    /// # Arguments
    /// * `base_url` - Desk gateway base, e.g. `http://127.0.0.1:8080`.
    /// * `service_token` - Bearer token with the service role.
    pub fn new(base_url: String, service_token: String) -> Self {
        Self {
            base_url,
            service_token,
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ChatError> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.service_token)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))
    }

    /// Decodes a 2xx body, maps 404 to None and anything else to an error.
    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ChatError> {
        let response = self.get(path).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ChatError::Platform(format!(
                "Desk API error {} on {}",
                response.status(),
                path
            )));
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ChatError::Platform(e.to_string()))
    }

    async fn get_required<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ChatError> {
        self.get_optional(path)
            .await?
            .ok_or_else(|| ChatError::Platform(format!("Desk API returned 404 on {}", path)))
    }

    /// Confirm/reject share the response handling: 200 wins, 404/409 lose.
    async fn transition(
        &self,
        signal_id: &str,
        user_id: &str,
        verb: &str,
    ) -> Result<ActionOutcome, ChatError> {
        #[derive(Deserialize)]
        struct ActionBody {
            success: bool,
            signal: Option<SignalRecord>,
        }

        let response = self
            .client
            .post(format!(
                "{}/api/v1/signals/{}/{}",
                self.base_url, signal_id, verb
            ))
            .bearer_auth(&self.service_token)
            .json(&json!({ "source": "chat", "user_id": user_id }))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(ActionOutcome::NoLongerAvailable);
        }
        if !status.is_success() {
            return Err(ChatError::Platform(format!(
                "Desk API error {} on {} {}",
                status, verb, signal_id
            )));
        }

        let body: ActionBody = response
            .json()
            .await
            .map_err(|e| ChatError::Platform(e.to_string()))?;
        match (body.success, body.signal) {
            (true, Some(signal)) => Ok(ActionOutcome::Applied(signal)),
            _ => Ok(ActionOutcome::NoLongerAvailable),
        }
    }

    async fn post_toggle(&self, path: &str, user_id: &str) -> Result<(), ChatError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.service_token)
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Platform(format!(
                "Desk API error {} on {}",
                response.status(),
                path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeskApi for HttpDeskApi {
    async fn discord_id_for(&self, user_id: &str) -> Result<Option<String>, ChatError> {
        #[derive(Deserialize)]
        struct Body {
            discord_user_id: Option<String>,
        }
        let body: Option<Body> = self
            .get_optional(&format!("/api/v1/users/{}/discord", user_id))
            .await?;
        Ok(body.and_then(|b| b.discord_user_id))
    }

    async fn user_by_discord(&self, discord_user_id: &str) -> Result<Option<String>, ChatError> {
        #[derive(Deserialize)]
        struct Body {
            user_id: String,
        }
        let body: Option<Body> = self
            .get_optional(&format!("/api/v1/users/by-discord/{}", discord_user_id))
            .await?;
        Ok(body.map(|b| b.user_id))
    }

    async fn get_signal(&self, signal_id: &str) -> Result<Option<SignalRecord>, ChatError> {
        self.get_optional(&format!("/api/v1/signals/{}", signal_id))
            .await
    }

    async fn pending_signals(&self, user_id: &str) -> Result<Vec<SignalRecord>, ChatError> {
        self.get_required(&format!("/api/v1/signals/pending?user_id={}", user_id))
            .await
    }

    async fn confirm(&self, signal_id: &str, user_id: &str) -> Result<ActionOutcome, ChatError> {
        self.transition(signal_id, user_id, "confirm").await
    }

    async fn reject(&self, signal_id: &str, user_id: &str) -> Result<ActionOutcome, ChatError> {
        self.transition(signal_id, user_id, "reject").await
    }

    async fn open_positions(&self, user_id: &str) -> Result<Vec<PositionRecord>, ChatError> {
        self.get_required(&format!("/api/v1/positions?user_id={}", user_id))
            .await
    }

    async fn pnl_summary(&self, user_id: &str) -> Result<PnlRecord, ChatError> {
        self.get_required(&format!("/api/v1/analytics/pnl?user_id={}", user_id))
            .await
    }

    async fn trading_config(&self, user_id: &str) -> Result<ConfigRecord, ChatError> {
        self.get_required(&format!("/api/v1/users/{}/config", user_id))
            .await
    }

    async fn pause_trading(&self, user_id: &str) -> Result<(), ChatError> {
        self.post_toggle("/api/v1/trading/pause", user_id).await
    }

    async fn resume_trading(&self, user_id: &str) -> Result<(), ChatError> {
        self.post_toggle("/api/v1/trading/resume", user_id).await
    }
}
