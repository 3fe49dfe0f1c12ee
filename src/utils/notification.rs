// src/utils/notification.rs
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::approval::ApprovalStatus;
use crate::db::models::food_order::OrderStatus;

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Notification has no recipient")]
    MissingRecipient,
}

/// Common notification types for system usage
pub mod notification_types {
    pub const BOOKING_SUBMITTED: &str = "booking_submitted";
    pub const BOOKING_DECIDED: &str = "booking_decided";
    pub const ROLE_CHANGE: &str = "role_change";
    pub const ACCOUNT_APPROVAL: &str = "account_approval";
    pub const ORDER_STATUS: &str = "order_status";
}

/// Notification builder for creating workflow notifications.
///
/// Workflow side effects must land in the same transaction as the state
/// change they describe, so the builder can write through an open
/// transaction via [`NotificationBuilder::send_tx`].
pub struct NotificationBuilder {
    title: String,
    message: String,
    notification_type: String,
    recipient: Option<Uuid>,
    action_url: Option<String>,
}

impl NotificationBuilder {
    /// Create a new notification builder with required fields
    pub fn new(title: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: String::new(),
            notification_type: notification_type.into(),
            recipient: None,
            action_url: None,
        }
    }

    /// Set notification message body
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the recipient user
    pub fn recipient(mut self, user_id: Uuid) -> Self {
        self.recipient = Some(user_id);
        self
    }

    /// Set the URL the client navigates to when the notification is clicked
    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    /// Insert the notification through an open transaction.
    pub async fn send_tx(self, tx: &mut Transaction<'_, Postgres>) -> NotificationResult<Uuid> {
        let recipient = self.recipient.ok_or(NotificationError::MissingRecipient)?;

        let notification_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (user_id, title, message, type, action_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(recipient)
        .bind(&self.title)
        .bind(&self.message)
        .bind(&self.notification_type)
        .bind(&self.action_url)
        .fetch_one(&mut **tx)
        .await?;

        Ok(notification_id)
    }

    /// Insert the notification in its own transaction.
    pub async fn send(self, pool: &PgPool) -> NotificationResult<Uuid> {
        let mut tx = pool.begin().await?;
        let id = self.send_tx(&mut tx).await?;
        tx.commit().await?;
        Ok(id)
    }
}

/// Submission confirmation for any booking type.
pub fn booking_submitted(requester: Uuid, what: &str, listing_url: &str) -> NotificationBuilder {
    NotificationBuilder::new("Request Submitted", notification_types::BOOKING_SUBMITTED)
        .message(format!(
            "Your {what} request has been submitted and is awaiting approval."
        ))
        .recipient(requester)
        .action_url(listing_url)
}

/// Outcome notification for the requester after an approver's decision.
pub fn booking_decided(
    requester: Uuid,
    what: &str,
    decision: ApprovalStatus,
    notes: Option<&str>,
    listing_url: &str,
) -> NotificationBuilder {
    let (title, verb) = match decision {
        ApprovalStatus::Approved => ("Request Approved", "approved"),
        ApprovalStatus::Declined => ("Request Declined", "declined"),
        // Callers validate the decision before reaching this point.
        ApprovalStatus::Pending => ("Request Updated", "updated"),
    };
    let message = match notes {
        Some(notes) if !notes.trim().is_empty() => {
            format!("Your {what} request has been {verb}. Note: {notes}")
        }
        _ => format!("Your {what} request has been {verb}."),
    };
    NotificationBuilder::new(title, notification_types::BOOKING_DECIDED)
        .message(message)
        .recipient(requester)
        .action_url(listing_url)
}

/// Fulfillment progress notice for the requester.
pub fn order_status_changed(requester: Uuid, status: OrderStatus) -> NotificationBuilder {
    let (title, message) = match status {
        OrderStatus::Received => (
            "Order Received",
            "Your food order has been received by the kitchen.",
        ),
        OrderStatus::Preparing => ("Order In Preparation", "Your food order is being prepared."),
        OrderStatus::Ready => ("Order Ready", "Your food order is ready for delivery."),
        OrderStatus::Delivered => ("Order Delivered", "Your food order has been delivered."),
        OrderStatus::Cancelled => ("Order Cancelled", "Your food order has been cancelled."),
    };
    NotificationBuilder::new(title, notification_types::ORDER_STATUS)
        .message(message)
        .recipient(requester)
        .action_url("/orders")
}

/// Role reassignment notice. The permission cache entry is invalidated by
/// the caller, so no re-login is needed for the change to take effect.
pub fn role_assigned(user_id: Uuid, role_label: &str) -> NotificationBuilder {
    NotificationBuilder::new("Role Updated", notification_types::ROLE_CHANGE)
        .message(format!("Your role has been changed to '{role_label}'."))
        .recipient(user_id)
        .action_url("/profile")
}

/// Account approval outcome for a new registration.
pub fn account_reviewed(user_id: Uuid, approved: bool) -> NotificationBuilder {
    let (title, message) = if approved {
        (
            "Account Approved",
            "Your account has been approved. You can now sign in and submit requests.".to_string(),
        )
    } else {
        (
            "Account Declined",
            "Your registration was declined. Contact your administrator for details.".to_string(),
        )
    };
    NotificationBuilder::new(title, notification_types::ACCOUNT_APPROVAL)
        .message(message)
        .recipient(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decline_notes_are_included_in_the_message_body() {
        let builder = booking_decided(
            Uuid::new_v4(),
            "accommodation",
            ApprovalStatus::Declined,
            Some("no rooms available that week"),
            "/bookings",
        );
        assert!(builder.message.contains("declined"));
        assert!(builder.message.contains("no rooms available that week"));
        assert_eq!(builder.title, "Request Declined");
    }

    #[test]
    fn approval_without_notes_omits_the_note_suffix() {
        let builder = booking_decided(
            Uuid::new_v4(),
            "facility",
            ApprovalStatus::Approved,
            None,
            "/bookings",
        );
        assert!(builder.message.contains("approved"));
        assert!(!builder.message.contains("Note:"));
    }

    #[test]
    fn blank_notes_are_treated_as_absent() {
        let builder = booking_decided(
            Uuid::new_v4(),
            "food order",
            ApprovalStatus::Approved,
            Some("   "),
            "/orders",
        );
        assert!(!builder.message.contains("Note:"));
    }
}
