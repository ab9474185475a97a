use std::{fmt, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use warden_moderation::{ActionExecutor, CaseRequest, ExecutorError};

const AUDIT_LOG_REASON_HEADER: &str = "X-Audit-Log-Reason";
const THREAD_ARCHIVE_MINUTES: u32 = 1440;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PlatformUser {
    username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GuildMember {
    user: PlatformUser,
    #[serde(default)]
    communication_disabled_until: Option<String>,
}

/// [`ActionExecutor`] over the Discord REST API.
pub struct RestExecutor {
    client: Client,
    token: String,
    base_url: String,
    members: DashMap<(String, String), GuildMember>,
    usernames: DashMap<String, String>,
}

impl RestExecutor {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExecutorError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            members: DashMap::new(),
            usernames: DashMap::new(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, reason: Option<&str>) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json");
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            builder = builder.header(AUDIT_LOG_REASON_HEADER, encode_reason(reason));
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, ExecutorError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ExecutorError::Unknown(format!("Request for {} failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        debug!(
            log_type = "executor",
            "Platform answered {} for {}: {}", status, what, body
        );
        Err(status_error(status, what, &body))
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ExecutorError> {
        self.send(builder, what)
            .await?
            .json()
            .await
            .map_err(|e| ExecutorError::Unknown(format!("Failed to parse {}: {}", what, e)))
    }

    async fn member(&self, community_id: &str, user_id: &str) -> Result<GuildMember, ExecutorError> {
        let key = (community_id.to_string(), user_id.to_string());
        if let Some(member) = self.members.get(&key) {
            return Ok(member.clone());
        }

        let member: GuildMember = self
            .send_json(
                self.request(
                    Method::GET,
                    &format!("/guilds/{}/members/{}", community_id, user_id),
                    None,
                ),
                &format!("Member {}", user_id),
            )
            .await?;
        self.usernames
            .insert(user_id.to_string(), member.user.username.clone());
        self.members.insert(key, member.clone());
        Ok(member)
    }

    async fn post_message(&self, channel_id: &str, body: Value) -> Result<String, ExecutorError> {
        let message: CreatedObject = self
            .send_json(
                self.request(
                    Method::POST,
                    &format!("/channels/{}/messages", channel_id),
                    None,
                )
                .json(&body),
                &format!("Channel {}", channel_id),
            )
            .await?;
        Ok(message.id)
    }

    async fn add_to_thread(&self, thread_id: &str, case: &CaseRequest) -> String {
        let added = self
            .send(
                self.request(
                    Method::PUT,
                    &format!("/channels/{}/thread-members/{}", thread_id, case.user_id),
                    None,
                ),
                &format!("User {}", case.user_id),
            )
            .await;

        let (notice, status) = match added {
            Ok(_) => return "Thread created and user added.".to_string(),
            Err(ExecutorError::PermissionDenied(_)) => (
                "Created thread, but could not add user (Permissions error or user banned)."
                    .to_string(),
                "Thread created (User add failed: Forbidden).".to_string(),
            ),
            Err(e) => (
                format!("Created thread, but error adding user: {}", e),
                format!("Thread created (User add failed: {}).", e),
            ),
        };

        warn!(
            log_type = "executor",
            "Could not add {} to case thread {}", case.user_id, thread_id
        );
        if let Err(e) = self
            .post_message(thread_id, json!({ "content": notice }))
            .await
        {
            debug!(
                log_type = "executor",
                "Failed to post notice in thread {}: {}", thread_id, e
            );
        }
        status
    }
}

#[async_trait]
impl ActionExecutor for RestExecutor {
    async fn ban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.send(
            self.request(
                Method::PUT,
                &format!("/guilds/{}/bans/{}", community_id, user_id),
                Some(reason),
            )
            .json(&json!({})),
            &format!("User {}", user_id),
        )
        .await?;
        self.members
            .remove(&(community_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn kick(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.send(
            self.request(
                Method::DELETE,
                &format!("/guilds/{}/members/{}", community_id, user_id),
                Some(reason),
            ),
            &format!("Member {}", user_id),
        )
        .await?;
        self.members
            .remove(&(community_id.to_string(), user_id.to_string()));
        Ok(())
    }

    async fn unban(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        self.send(
            self.request(
                Method::DELETE,
                &format!("/guilds/{}/bans/{}", community_id, user_id),
                Some(reason),
            ),
            &format!("Ban for {}", user_id),
        )
        .await?;
        Ok(())
    }

    async fn remove_timeout(
        &self,
        community_id: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<(), ExecutorError> {
        let mut member = self.member(community_id, user_id).await?;
        if member.communication_disabled_until.is_none() {
            debug!(
                log_type = "executor",
                "Member {} has no active timeout", user_id
            );
        }

        self.send(
            self.request(
                Method::PATCH,
                &format!("/guilds/{}/members/{}", community_id, user_id),
                Some(reason),
            )
            .json(&json!({ "communication_disabled_until": null })),
            &format!("Member {}", user_id),
        )
        .await?;

        member.communication_disabled_until = None;
        self.members
            .insert((community_id.to_string(), user_id.to_string()), member);
        Ok(())
    }

    async fn open_case(&self, case: &CaseRequest) -> Result<String, ExecutorError> {
        let message_id = self
            .post_message(&case.channel_id, json!({ "content": case.opening_message() }))
            .await
            .map_err(|e| match e {
                ExecutorError::NotFound(_) => {
                    ExecutorError::NotFound(format!("Appeal channel {}", case.channel_id))
                }
                other => other,
            })?;

        let thread: CreatedObject = self
            .send_json(
                self.request(
                    Method::POST,
                    &format!(
                        "/channels/{}/messages/{}/threads",
                        case.channel_id, message_id
                    ),
                    None,
                )
                .json(&json!({
                    "name": case.thread_name(),
                    "auto_archive_duration": THREAD_ARCHIVE_MINUTES,
                })),
                &format!("Message {}", message_id),
            )
            .await?;

        Ok(self.add_to_thread(&thread.id, case).await)
    }

    async fn notify_user(&self, user_id: &str, message: &str) -> Result<(), ExecutorError> {
        let channel: CreatedObject = self
            .send_json(
                self.request(Method::POST, "/users/@me/channels", None)
                    .json(&json!({ "recipient_id": user_id })),
                &format!("User {}", user_id),
            )
            .await?;

        self.post_message(
            &channel.id,
            json!({
                "embeds": [{
                    "title": "Appeal Case Opened",
                    "description": message,
                    "color": 0x3498db,
                }]
            }),
        )
        .await?;
        Ok(())
    }

    async fn resolve_username(&self, user_id: &str) -> Result<Option<String>, ExecutorError> {
        if let Some(name) = self.usernames.get(user_id) {
            return Ok(Some(name.clone()));
        }

        let result: Result<PlatformUser, _> = self
            .send_json(
                self.request(Method::GET, &format!("/users/{}", user_id), None),
                &format!("User {}", user_id),
            )
            .await;

        match result {
            Ok(user) => {
                self.usernames
                    .insert(user_id.to_string(), user.username.clone());
                Ok(Some(user.username))
            }
            Err(ExecutorError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for RestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestExecutor")
            .field("base_url", &self.base_url)
            .field("cached_members", &self.members.len())
            .field("cached_usernames", &self.usernames.len())
            .finish_non_exhaustive()
    }
}

fn status_error(status: StatusCode, what: &str, body: &str) -> ExecutorError {
    match status {
        StatusCode::NOT_FOUND => ExecutorError::NotFound(what.to_string()),
        StatusCode::FORBIDDEN => ExecutorError::PermissionDenied(format!("{}: {}", what, body)),
        _ => ExecutorError::Unknown(format!("API error ({}): {}", status, body)),
    }
}

/// Percent-encodes a reason for the audit log header, which only carries
/// visible ASCII.
fn encode_reason(reason: &str) -> String {
    let mut encoded = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
