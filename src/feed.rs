use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 64;
const PING_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// Notification that a table changed. Carries no payload: subscribers
/// refetch rather than apply deltas.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub action: ChangeAction,
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn publish(&self, table: &'static str, action: ChangeAction) {
        let _ = self.tx.send(ChangeEvent { table, action });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-sent events stream of change notifications.
pub async fn subscribe(feed: web::Data<ChangeFeed>) -> impl Responder {
    let rx = feed.subscribe();

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match tokio::time::timeout(PING_INTERVAL, rx.recv()).await {
                Ok(Ok(event)) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    let frame = web::Bytes::from(format!("data: {payload}\n\n"));
                    return Some((Ok::<_, std::convert::Infallible>(frame), rx));
                }
                // Lagged subscribers just missed some notifications; the next
                // one still triggers a full refetch.
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => {
                    return Some((Ok(web::Bytes::from_static(b": ping\n\n")), rx));
                }
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn subscribers_receive_published_events() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();

        feed.publish("employees", ChangeAction::Insert);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ChangeEvent {
                table: "employees",
                action: ChangeAction::Insert
            }
        );
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        feed.publish("attendance_logs", ChangeAction::Update);
    }

    #[test]
    fn events_serialize_for_the_wire() {
        let event = ChangeEvent {
            table: "attendance_logs",
            action: ChangeAction::Delete,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"table":"attendance_logs","action":"delete"}"#
        );
    }
}
