//! Actions the host page exposes.

use framebridge_server::Actions;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Deserialize)]
pub struct AddNumbers {
    pub a: i64,
    pub b: i64,
}

/// The registry served by the host page.
pub fn actions() -> Actions {
    let count = Arc::new(AtomicU64::new(0));

    let mut actions = Actions::new();
    actions
        .register("get-server-time", |_: serde_json::Value| async {
            anyhow::Ok(chrono::Local::now().format("%H:%M:%S").to_string())
        })
        .register("add-numbers", |args: AddNumbers| async move {
            args.a
                .checked_add(args.b)
                .ok_or_else(|| anyhow::anyhow!("{} + {} overflows", args.a, args.b))
        })
        .register("count", move |_: serde_json::Value| {
            let count = count.clone();
            async move {
                let n = count.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!("server count: {}", n);
                anyhow::Ok(n)
            }
        });
    actions
}
