//! Demo: several instances contending for a small assignment pool.
//!
//! Runs entirely against the in-memory store with fast timings so the
//! whole lifecycle is visible in a couple of seconds: ordered acquisition,
//! a loser failing at the gate, graceful release, and a latecomer picking
//! up the freed slot.

use std::sync::Arc;
use std::time::Duration;

use tether_core::{
    AcquisitionGate, HolderId, InMemoryLeaseStore, KeepAlive, LeaseConfig, LeaseError,
    LeaseSession, LeaseStore, ReacquirePolicy,
};

struct Instance {
    session: Arc<LeaseSession>,
    keep_alive: Option<KeepAlive>,
}

async fn start_instance(
    store: &Arc<dyn LeaseStore>,
    name: &str,
) -> Result<Instance, LeaseError> {
    // Demo timings: 2s leases renewed every 500ms.
    let config = LeaseConfig::new(
        HolderId::new(name),
        Duration::from_secs(2),
        Duration::from_millis(500),
    )
    .expect("demo timings are valid");

    let session = Arc::new(LeaseSession::new(Arc::clone(store), config));

    // Gate first: nothing downstream exists until the claim succeeds.
    let assignment = AcquisitionGate::new(Arc::clone(&session)).claim().await?;
    println!("[{name}] serving as consumer group {assignment}");

    let keep_alive = KeepAlive::spawn(Arc::clone(&session), ReacquirePolicy::default());
    Ok(Instance {
        session,
        keep_alive: Some(keep_alive),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    // (A) A pool of three consumer-group identities, seeded up front.
    let store: Arc<dyn LeaseStore> =
        Arc::new(InMemoryLeaseStore::new(["ticks-g1", "ticks-g2", "ticks-g3"]));

    // (B) Four identical instances race for three slots.
    let mut running = Vec::new();
    for name in ["instance-a", "instance-b", "instance-c", "instance-d"] {
        match start_instance(&store, name).await {
            Ok(instance) => running.push(instance),
            Err(err) => println!("[{name}] startup refused: {err}"),
        }
    }

    // (C) Leases stay healthy while the keep-alive loops renew.
    tokio::time::sleep(Duration::from_secs(1)).await;
    for instance in &running {
        let status = instance.session.status();
        println!("status: {}", serde_json::to_string(&status).unwrap());
    }

    // (D) The first instance shuts down gracefully: its lease is released
    // immediately, not abandoned to expiry.
    let mut first = running.remove(0);
    let freed = first.session.acquired_assignment_name();
    if let Some(keep_alive) = first.keep_alive.take() {
        keep_alive.shutdown_and_join().await;
    }
    println!(
        "[{}] shut down, freed {}",
        first.session.instance_id(),
        freed.map(|n| n.to_string()).unwrap_or_default(),
    );

    // (E) A latecomer now gets the freed slot.
    match start_instance(&store, "instance-e").await {
        Ok(instance) => running.push(instance),
        Err(err) => println!("[instance-e] startup refused: {err}"),
    }

    for instance in running {
        if let Some(keep_alive) = instance.keep_alive {
            keep_alive.shutdown_and_join().await;
        }
    }
}
