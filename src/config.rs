use std::path::PathBuf;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Write-ahead log file backing all state.
    pub wal_path: PathBuf,
    /// Currency code stamped on every appointment.
    pub currency: String,
    /// WAL appends before the background compactor rewrites the log.
    pub compact_threshold: u64,
}

impl EngineConfig {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            currency: "USD".into(),
            compact_threshold: 1000,
        }
    }

    /// Read `BOOKD_DATA_DIR`, `BOOKD_CURRENCY` and `BOOKD_COMPACT_THRESHOLD`
    /// from the environment, with defaults matching `new`.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("BOOKD_DATA_DIR").unwrap_or_else(|_| "./data".into());
        let currency = std::env::var("BOOKD_CURRENCY").unwrap_or_else(|_| "USD".into());
        let compact_threshold = std::env::var("BOOKD_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        Self {
            wal_path: PathBuf::from(data_dir).join("bookd.wal"),
            currency,
            compact_threshold,
        }
    }
}
