//! Telegram digest of the next-day forecast.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::TelegramConfig;
use crate::error::NotifyError;
use crate::model::{DailyRow, NotificationDigest};

/// Chat delivery capability.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API `sendMessage`.
#[derive(Debug)]
pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for TelegramClient {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_url, self.token))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        let status = response.status();
        let body: BotResponse = response.json().await?;
        if !status.is_success() || !body.ok {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message: body
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}

/// Conditional warning shown under a city's section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningTag {
    HeavyPrecipitation,
    Precipitation,
    HotWeather,
    SevereCold,
    Frost,
}

impl WarningTag {
    pub fn label(self) -> &'static str {
        match self {
            WarningTag::HeavyPrecipitation => "🌧 heavy precipitation",
            WarningTag::Precipitation => "🌦 precipitation",
            WarningTag::HotWeather => "🔥 hot weather",
            WarningTag::SevereCold => "❄️ severe cold",
            WarningTag::Frost => "🥶 frost",
        }
    }
}

/// Tags for one city in display order: precipitation, heat, cold.
pub fn warning_tags(row: &DailyRow) -> Vec<WarningTag> {
    let mut tags = Vec::new();
    if row.precipitation_total > 10.0 {
        tags.push(WarningTag::HeavyPrecipitation);
    } else if row.precipitation_total > 5.0 {
        tags.push(WarningTag::Precipitation);
    }
    if row.temp_max > 30.0 {
        tags.push(WarningTag::HotWeather);
    }
    if row.temp_min < -10.0 {
        tags.push(WarningTag::SevereCold);
    } else if row.temp_min < 0.0 {
        tags.push(WarningTag::Frost);
    }
    tags
}

/// Render the digest message.
pub fn format_digest(digest: &NotificationDigest) -> String {
    let mut message = format!("🌤 Weather forecast for {}\n\n", digest.date.format("%Y-%m-%d"));
    for row in &digest.entries {
        // Writing into a String cannot fail.
        let _ = writeln!(message, "📍 {}:", row.city);
        let _ = writeln!(message, "   • Max: {}°C", row.temp_max);
        let _ = writeln!(message, "   • Min: {}°C", row.temp_min);
        let _ = writeln!(message, "   • Precipitation: {} mm", row.precipitation_total);

        let tags = warning_tags(row);
        if !tags.is_empty() {
            let labels: Vec<&str> = tags.into_iter().map(WarningTag::label).collect();
            let _ = writeln!(message, "   ⚠️ {}", labels.join(" | "));
        }
        message.push('\n');
    }
    message
}

/// What the notifier did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    SkippedEmpty,
    SkippedNoCredentials,
}

/// Sends the digest once per run if credentials are configured.
pub struct Notifier {
    channel: Option<Arc<dyn NotificationChannel>>,
    chat_id: String,
}

impl Notifier {
    pub fn new(channel: Arc<dyn NotificationChannel>, chat_id: &str) -> Self {
        Self {
            channel: Some(channel),
            chat_id: chat_id.to_string(),
        }
    }

    /// A notifier that never sends.
    pub fn disabled() -> Self {
        Self {
            channel: None,
            chat_id: String::new(),
        }
    }

    /// Telegram notifier, or a disabled one when credentials are missing.
    pub fn from_config(config: &TelegramConfig) -> Self {
        match config.credentials() {
            Some((token, chat_id)) => {
                Self::new(Arc::new(TelegramClient::new(&config.api_url, &token)), &chat_id)
            }
            None => Self::disabled(),
        }
    }

    /// Returns once the send attempt has completed.
    pub async fn notify(&self, digest: &NotificationDigest) -> Result<NotifyOutcome, NotifyError> {
        if digest.is_empty() {
            log::warn!("[Notify] no daily records, nothing to send");
            return Ok(NotifyOutcome::SkippedEmpty);
        }
        let Some(channel) = &self.channel else {
            log::warn!("[Notify] Telegram credentials not set, skipping notification");
            return Ok(NotifyOutcome::SkippedNoCredentials);
        };

        let text = format_digest(digest);
        channel.send(&self.chat_id, &text).await?;
        log::info!(
            "[Notify] digest for {} sent ({} cities)",
            digest.date,
            digest.entries.len()
        );
        Ok(NotifyOutcome::Sent)
    }
}
