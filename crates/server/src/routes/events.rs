//! SSE change feed handler.
//!
//! Streams row-level mutation events to live viewers. A shopper's orders
//! view subscribes with `?table=orders&user_id=X`; the admin order list
//! subscribes with `?table=orders` alone.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Deserialize;
use tracing::instrument;

use gilded_core::UserId;

use crate::services::notify::{FeedFilter, FeedTable};
use crate::state::AppState;

/// Query selecting which events to stream.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Restrict to one table.
    pub table: Option<FeedTable>,
    /// Restrict to rows owned by this user (orders only).
    pub user_id: Option<i32>,
}

/// Stream change events as SSE.
///
/// GET /events?table=orders&user_id=X
#[instrument(skip(state))]
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = FeedFilter {
        table: query.table,
        owner: query.user_id.map(UserId::new),
    };
    let mut subscription = state.feed().subscribe(filter);

    let sse_stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            let json = serde_json::to_string(&event).unwrap_or_else(|_| {
                r#"{"error":"Failed to serialize event"}"#.to_string()
            });
            yield Ok::<_, Infallible>(Event::default().event("change").data(json));
        }
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
