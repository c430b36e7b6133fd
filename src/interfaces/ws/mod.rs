//! WebSocket interfaces

pub mod notifications;

pub use notifications::{
    create_notification_state, ws_notifications_handler, EventFilter, NotificationState,
};
