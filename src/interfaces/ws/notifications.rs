//! Live ledger notifications over WebSocket
//!
//! Clients connect to `/ws/notifications?venue_id=billiard&event_types=session_stopped`
//! and receive every matching [`EventMessage`] as a JSON text frame.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, info, warn};

use crate::application::events::{EventMessage, SharedEventBus};
use crate::interfaces::http::middleware::AuthenticatedUser;

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub venue_id: Option<String>,
    /// Comma-separated, e.g. `session_started,session_stopped`
    pub event_types: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, message: &EventMessage) -> bool {
        if let Some(venue) = &self.venue_id {
            if message.event.venue_id() != venue {
                return false;
            }
        }
        match &self.event_types {
            Some(types) => types
                .split(',')
                .map(str::trim)
                .any(|t| t == message.event.event_type()),
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct NotificationState {
    pub event_bus: SharedEventBus,
}

pub fn create_notification_state(event_bus: SharedEventBus) -> NotificationState {
    NotificationState { event_bus }
}

pub async fn ws_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<NotificationState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    info!(
        username = %user.username,
        venue = ?filter.venue_id,
        event_types = ?filter.event_types,
        "Notification stream requested"
    );
    ws.on_upgrade(move |socket| handle_notification_socket(socket, state, filter))
}

async fn handle_notification_socket(socket: WebSocket, state: NotificationState, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriber = state.event_bus.subscribe();

    let welcome = serde_json::json!({
        "type": "connected",
        "filter": {
            "venue_id": filter.venue_id,
            "event_types": filter.event_types,
        }
    });
    if let Err(e) = sender.send(Message::Text(welcome.to_string().into())).await {
        warn!(error = %e, "Failed to greet notification client");
        return;
    }

    loop {
        select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(error = %e, "Notification socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            event = subscriber.recv() => {
                let Some(message) = event else {
                    warn!("Event bus closed");
                    break;
                };
                if !filter.matches(&message) {
                    continue;
                }
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }

    info!("Notification client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::{Event, LedgerResetEvent};
    use rust_decimal::Decimal;

    fn reset(venue: &str) -> EventMessage {
        EventMessage::new(Event::LedgerReset(LedgerResetEvent {
            venue_id: venue.to_string(),
            date_key: "2024-03-10".into(),
            previous_revenue: Decimal::ZERO,
            discarded_sessions: 0,
        }))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(EventFilter::default().matches(&reset("billiard")));
    }

    #[test]
    fn filters_by_venue_and_type() {
        let filter = EventFilter {
            venue_id: Some("game-room".into()),
            event_types: Some("session_stopped, ledger_reset".into()),
        };
        assert!(filter.matches(&reset("game-room")));
        assert!(!filter.matches(&reset("billiard")));

        let only_stops = EventFilter {
            venue_id: None,
            event_types: Some("session_stopped".into()),
        };
        assert!(!only_stops.matches(&reset("game-room")));
    }
}
