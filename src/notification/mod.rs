use serde::{Deserialize, Serialize};

/// Push Payload
///
/// Message produced by the notification dispatcher and consumed by the
/// storefront's service worker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PushPayload {
    pub notification: NotificationContent,
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NotificationContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(rename = "type", default)]
    pub notification_type: NotificationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Message,
    Order,
    Payment,
    Review,
    StoreBoost,
    #[serde(other)]
    Other,
}

impl Default for NotificationType {
    fn default() -> Self {
        NotificationType::Other
    }
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Order => "order",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::StoreBoost => "store_boost",
            Self::Other => "other",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Open,
    Close,
}

/// Platform notification as shown to the user.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenderedNotification {
    pub title: String,
    pub body: String,
    /// Notifications with the same tag replace each other
    pub tag: String,
    pub url: String,
    pub actions: [NotificationAction; 2],
}

const ROOT: &str = "/";

impl PushPayload {
    /// Deep Link
    ///
    /// URL the notification opens. An explicit `data.url` wins; otherwise the
    /// type decides, falling back to the type's listing page when the
    /// identifier it needs is missing.
    pub fn deep_link(&self) -> String {
        let data = &self.data;
        if let Some(url) = data.url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        let id = |field: &Option<String>| {
            field
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match data.notification_type {
            NotificationType::Message => id(&data.conversation_id)
                .map(|c| format!("/messages/{}", c))
                .unwrap_or_else(|| "/messages".to_string()),
            NotificationType::Order => id(&data.order_id)
                .map(|o| format!("/orders/{}", o))
                .unwrap_or_else(|| "/orders".to_string()),
            NotificationType::Payment => id(&data.receipt_id)
                .map(|r| format!("/receipts/{}", r))
                .unwrap_or_else(|| "/receipts".to_string()),
            NotificationType::Review => match (id(&data.store_id), id(&data.review_id)) {
                (Some(s), Some(r)) => format!("/store/{}/reviews#{}", s, r),
                (Some(s), None) => format!("/store/{}/reviews", s),
                _ => ROOT.to_string(),
            },
            NotificationType::StoreBoost => id(&data.store_id)
                .map(|s| format!("/store/{}", s))
                .unwrap_or_else(|| ROOT.to_string()),
            NotificationType::Other => ROOT.to_string(),
        }
    }

    pub fn render(&self) -> RenderedNotification {
        let subject = [
            &self.data.conversation_id,
            &self.data.order_id,
            &self.data.receipt_id,
            &self.data.review_id,
            &self.data.store_id,
        ]
        .iter()
        .copied()
        .find_map(|field| field.as_deref());

        let tag = match subject {
            Some(subject) => format!("{}-{}", self.data.notification_type.as_str(), subject),
            None => self.data.notification_type.as_str().to_string(),
        };

        RenderedNotification {
            title: self.notification.title.clone(),
            body: self.notification.body.clone(),
            tag,
            url: self.deep_link(),
            actions: [NotificationAction::Open, NotificationAction::Close],
        }
    }
}

impl RenderedNotification {
    /// Where to navigate after a click. A click on the body (no action)
    /// counts as `open`.
    pub fn on_action(&self, action: Option<NotificationAction>) -> Option<&str> {
        match action {
            None | Some(NotificationAction::Open) => Some(&self.url),
            Some(NotificationAction::Close) => None,
        }
    }
}
