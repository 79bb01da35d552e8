//! Typed client for the backend's `/api` endpoints used by messaging and
//! notifications. Every call carries the session's bearer token.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use penlink_shared::models::{
    Conversation, Message, MessageDraft, Notification, PresenceRecord, User,
};
use penlink_shared::types::{ConversationId, MessageId, NotificationId, UserId};

use crate::endpoints::Endpoints;
use crate::error::NetError;

#[derive(Serialize)]
struct StartConversationBody<'a> {
    recipient_id: &'a UserId,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    conversation_id: &'a ConversationId,
    #[serde(flatten)]
    draft: &'a MessageDraft,
}

#[derive(Deserialize)]
struct CountResponse {
    #[serde(alias = "unread_count")]
    count: u32,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // -- Session --

    pub async fn current_user(&self) -> Result<User, NetError> {
        self.get("/auth/me").await
    }

    // -- Conversations --

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, NetError> {
        self.get("/conversations").await
    }

    /// Existing conversation with `recipient`, or a new one. Eligibility
    /// (mutual follow) is checked by the backend.
    pub async fn start_conversation(&self, recipient: &UserId) -> Result<Conversation, NetError> {
        self.post(
            "/conversations",
            &StartConversationBody {
                recipient_id: recipient,
            },
        )
        .await
    }

    pub async fn conversation_messages(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, NetError> {
        self.get(&format!("/conversations/{conversation_id}/messages"))
            .await
    }

    pub async fn mark_conversation_read(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), NetError> {
        self.put(&format!("/conversations/{conversation_id}/read"))
            .await
    }

    // -- Messages --

    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        draft: &MessageDraft,
    ) -> Result<Message, NetError> {
        self.post(
            "/messages",
            &SendMessageBody {
                conversation_id,
                draft,
            },
        )
        .await
    }

    pub async fn mark_message_read(&self, message_id: &MessageId) -> Result<(), NetError> {
        self.put(&format!("/messages/{message_id}/read")).await
    }

    // -- Notifications --

    pub async fn notifications(&self) -> Result<Vec<Notification>, NetError> {
        self.get("/notifications").await
    }

    pub async fn unread_notification_count(&self) -> Result<u32, NetError> {
        let res: CountResponse = self.get("/notifications/unread-count").await?;
        Ok(res.count)
    }

    pub async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), NetError> {
        self.put(&format!("/notifications/{id}/read")).await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), NetError> {
        self.put("/notifications/read-all").await
    }

    // -- Presence --

    pub async fn user_status(&self, user_id: &UserId) -> Result<PresenceRecord, NetError> {
        self.get(&format!("/users/{user_id}/status")).await
    }

    // -----------------------------------------------------------------------

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, NetError> {
        let token = self.token.as_deref().ok_or(NetError::MissingToken)?;
        let url = self.endpoints.api(path);
        debug!(%method, %url, "API request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetError> {
        let res = self.request(reqwest::Method::GET, path)?.send().await?;
        Ok(check(res).await?.json().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, NetError> {
        let res = self
            .request(reqwest::Method::POST, path)?
            .json(body)
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    /// PUT with no body; the acknowledgement payload is ignored.
    async fn put(&self, path: &str) -> Result<(), NetError> {
        let res = self.request(reqwest::Method::PUT, path)?.send().await?;
        check(res).await?;
        Ok(())
    }
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, NetError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(NetError::Http {
        status: status.as_u16(),
        body,
    })
}
