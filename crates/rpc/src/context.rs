//! Application context - wires the store, the services and the router together

use chrono::{DateTime, Utc};
use lendledger_core::{LedgerError, LedgerResult};
use lendledger_store::{Invocation, JsonlStore, KvStore, LedgerEvent, MemoryStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::router::{Router, Services};

/// Outcome of one committed invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    #[serde(rename = "txId")]
    pub tx_id: String,
    /// Commit sequence; unchanged by read-only invocations
    pub sequence: u64,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<LedgerEvent>,
}

/// Application context
pub struct AppContext {
    pub config: LedgerConfig,
    store: Box<dyn KvStore>,
    services: Services,
    router: Router,
}

impl AppContext {
    /// Open the file-backed ledger under `config.data_dir`, replaying its log
    pub fn open(config: LedgerConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let store = JsonlStore::in_dir(&config.data_dir)?;
        Ok(Self::with_store(config, Box::new(store)))
    }

    /// Context over a fresh in-memory store
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::with_store(config, Box::new(MemoryStore::new()))
    }

    pub fn with_store(config: LedgerConfig, store: Box<dyn KvStore>) -> Self {
        let services = Services::from_config(&config);
        Self {
            config,
            store,
            services,
            router: Router::new(),
        }
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.router.operations()
    }

    /// Run one operation as a single atomic invocation stamped with the current time
    pub fn invoke(&self, op: &str, args: Value) -> LedgerResult<InvocationResult> {
        self.invoke_at(op, args, Utc::now())
    }

    /// Run one operation with an explicit invocation timestamp
    pub fn invoke_at(&self, op: &str, args: Value, timestamp: DateTime<Utc>) -> LedgerResult<InvocationResult> {
        let handler = self
            .router
            .handler(op)
            .ok_or_else(|| LedgerError::Validation(format!("unknown operation {}", op)))?;

        let tx_id = Uuid::new_v4().to_string();
        let mut inv = Invocation::new(self.store.as_ref(), tx_id.as_str(), timestamp);

        let payload = match handler(&self.services, &mut inv, args) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(op, tx_id = %tx_id, error = %err, "Invocation aborted");
                return Err(err);
            }
        };

        let receipt = inv.commit().map_err(|err| {
            let err = LedgerError::from(err);
            warn!(op, tx_id = %tx_id, error = %err, retryable = err.is_retryable(), "Commit rejected");
            err
        })?;

        if receipt.keys_written > 0 {
            info!(op, tx_id = %receipt.tx_id, sequence = receipt.sequence, keys = receipt.keys_written, "Invocation committed");
        }

        Ok(InvocationResult {
            tx_id: receipt.tx_id,
            sequence: receipt.sequence,
            payload,
            event: receipt.event,
        })
    }

    /// Create the bootstrap administrator named in the configuration
    pub fn init(&self) -> LedgerResult<InvocationResult> {
        self.invoke(
            "InitLedger",
            serde_json::json!({ "adminID": self.config.bootstrap_admin_id }),
        )
    }
}
