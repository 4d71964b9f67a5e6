use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use toolroom_core::TenantId;
use toolroom_store::{InMemoryStore, LedgerStore, MovementOutcome, PgStore};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Shared per-process services: the persistence backend and the realtime
/// notification channel.
#[derive(Clone)]
pub struct AppServices {
    store: Arc<dyn LedgerStore>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
        let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
        Self { store, realtime_tx }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Broadcast a successful ledger movement to stream subscribers.
    ///
    /// Observe-only and lossy: a full or unobserved channel never fails the
    /// movement that triggered it.
    pub fn notify_movement(&self, tenant_id: TenantId, outcome: &MovementOutcome) {
        let _ = self.realtime_tx.send(RealtimeMessage {
            tenant_id,
            topic: format!("ledger.{}", outcome.entry.action.as_str()),
            payload: serde_json::json!({
                "kind": "ledger_movement",
                "transaction_id": outcome.entry.entry_id.to_string(),
                "item_id": outcome.entry.item_id.to_string(),
                "project_id": outcome.entry.project_id.to_string(),
                "action": outcome.entry.action.as_str(),
                "quantity": outcome.entry.quantity,
                "pool_quantity": outcome.item.quantity,
            }),
        });
    }
}

/// Select and wire the persistence backend.
///
/// `DATABASE_URL` set → Postgres (with embedded migrations); otherwise the
/// in-memory backend (dev/test).
pub async fn build_services() -> AppServices {
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let store = PgStore::connect(&url)
                .await
                .expect("failed to connect to Postgres");
            tracing::info!("using postgres store");
            AppServices::new(Arc::new(store))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            AppServices::new(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
