//! Chat platform client (Discord REST API v10).
//!
//! Channel groupings are category channels (type 4); notification channels
//! are text channels (type 0) parented under them. Direct messages go
//! through the open-DM-channel-then-post dance; error code 50007 ("cannot
//! send messages to this user") is surfaced as `PlatformError::Refused`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use herald_common::types::{ChatMessage, Priority};

use crate::{ChannelInfo, ChatClient, PlatformError, PlatformResult};

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

/// API error code for a recipient that blocks direct messages.
const CODE_CANNOT_MESSAGE_USER: u64 = 50007;

/// REST client for the chat platform.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    guild_id: String,
}

impl DiscordClient {
    pub fn new(
        bot_token: &str,
        guild_id: impl Into<String>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bot {}", bot_token))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: DISCORD_API_BASE.to_string(),
            guild_id: guild_id.into(),
        })
    }

    /// Point the client at a different API host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Render a structured message as an embed object.
    fn embed(message: &ChatMessage) -> serde_json::Value {
        let color = match message.priority {
            Priority::Normal => 0x3498db,
            Priority::High => 0xf1c40f,
            Priority::Urgent => 0xe74c3c,
        };
        let fields: Vec<serde_json::Value> = message
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": true }))
            .collect();

        json!({
            "title": message.title,
            "description": message.body,
            "color": color,
            "fields": fields,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChannelData {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: Option<String>,
}

/// DM channels carry no name; only the id matters.
#[derive(Debug, Deserialize)]
struct DmChannelData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
}

/// Map a non-success response to a `PlatformError`.
async fn check(resp: reqwest::Response) -> PlatformResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        403 => Err(PlatformError::Forbidden(message)),
        404 => Err(PlatformError::NotFound(message)),
        code => Err(PlatformError::Api {
            status: code,
            message,
        }),
    }
}

#[async_trait]
impl ChatClient for DiscordClient {
    async fn send_to_channel(
        &self,
        destination_id: &str,
        message: &ChatMessage,
    ) -> PlatformResult<()> {
        let url = format!("{}/channels/{}/messages", self.base_url, destination_id);
        let body = json!({ "embeds": [Self::embed(message)] });
        check(self.http.post(&url).json(&body).send().await?).await?;
        Ok(())
    }

    async fn send_direct(&self, identity: &str, message: &ChatMessage) -> PlatformResult<()> {
        // Open (or reuse) the DM channel for this user.
        let url = format!("{}/users/@me/channels", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "recipient_id": identity }))
            .send()
            .await?;
        let dm: DmChannelData = check(resp).await?.json().await?;

        let url = format!("{}/channels/{}/messages", self.base_url, dm.id);
        let body = json!({ "embeds": [Self::embed(message)] });
        let resp = self.http.post(&url).json(&body).send().await?;

        if resp.status().as_u16() == 403 {
            let text = resp.text().await.unwrap_or_default();
            let parsed: ApiErrorBody = serde_json::from_str(&text).unwrap_or(ApiErrorBody {
                code: 0,
                message: text.clone(),
            });
            if parsed.code == CODE_CANNOT_MESSAGE_USER {
                return Err(PlatformError::Refused(parsed.message));
            }
            return Err(PlatformError::Forbidden(text));
        }

        check(resp).await?;
        Ok(())
    }

    async fn create_channel(
        &self,
        group_id: &str,
        name: &str,
        description: &str,
    ) -> PlatformResult<String> {
        let url = format!("{}/guilds/{}/channels", self.base_url, self.guild_id);
        let body = json!({
            "name": name,
            "type": CHANNEL_TYPE_TEXT,
            "parent_id": group_id,
            "topic": description,
        });
        let resp = check(self.http.post(&url).json(&body).send().await?).await?;
        let channel: ChannelData = resp.json().await?;

        tracing::info!(channel = %name, id = %channel.id, "Channel created");
        Ok(channel.id)
    }

    async fn list_channels(&self, group_id: &str) -> PlatformResult<Vec<ChannelInfo>> {
        let url = format!("{}/guilds/{}/channels", self.base_url, self.guild_id);
        let resp = check(self.http.get(&url).send().await?).await?;
        let channels: Vec<ChannelData> = resp.json().await?;

        Ok(channels
            .into_iter()
            .filter(|c| c.parent_id.as_deref() == Some(group_id))
            .map(|c| ChannelInfo {
                is_category: c.kind == CHANNEL_TYPE_CATEGORY,
                id: c.id,
                name: c.name,
                parent_id: c.parent_id,
            })
            .collect())
    }

    async fn find_group(&self, name: &str) -> PlatformResult<Option<String>> {
        let url = format!("{}/guilds/{}/channels", self.base_url, self.guild_id);
        let resp = check(self.http.get(&url).send().await?).await?;
        let channels: Vec<ChannelData> = resp.json().await?;

        Ok(channels
            .into_iter()
            .find(|c| c.kind == CHANNEL_TYPE_CATEGORY && c.name.eq_ignore_ascii_case(name))
            .map(|c| c.id))
    }

    async fn create_group(&self, name: &str) -> PlatformResult<String> {
        let url = format!("{}/guilds/{}/channels", self.base_url, self.guild_id);
        let body = json!({ "name": name, "type": CHANNEL_TYPE_CATEGORY });
        let resp = check(self.http.post(&url).json(&body).send().await?).await?;
        let channel: ChannelData = resp.json().await?;

        tracing::info!(group = %name, id = %channel.id, "Channel group created");
        Ok(channel.id)
    }
}
