//! Infrastructure wiring: store, ledger and mailer selection.

use std::sync::Arc;

use medlem_audit::InMemoryLedger;
use medlem_infra::{InMemoryStore, MembershipEngine, PostgresLedger, PostgresStore};
use medlem_notify::TracingMailer;

/// Wired application services.
#[derive(Clone)]
pub struct AppServices {
    pub engine: MembershipEngine,
}

/// Build services from the environment.
///
/// `USE_PERSISTENT_STORES=true` selects Postgres (requires `DATABASE_URL`);
/// anything else runs fully in-memory, which is what dev and the black-box
/// tests use.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if use_persistent {
        build_persistent().await
    } else {
        tracing::info!("using in-memory stores (set USE_PERSISTENT_STORES=true for Postgres)");
        build_in_memory()
    }
}

pub fn build_in_memory() -> AppServices {
    let engine = MembershipEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryLedger::new()),
        Arc::new(TracingMailer),
    );
    AppServices { engine }
}

async fn build_persistent() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let engine = MembershipEngine::new(
        Arc::new(PostgresStore::new(pool.clone())),
        Arc::new(PostgresLedger::new(pool)),
        Arc::new(TracingMailer),
    );

    tracing::info!("using Postgres-backed stores");
    AppServices { engine }
}
