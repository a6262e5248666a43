//! Application state management

use crate::sanitizer::InputSanitizer;
use folio_core::config::AppConfig;
use folio_core::{FolioError, Portfolio, Result};
use folio_rag::{ChatService, FolioRuntime};
use folio_vector::IndexManager;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Set once the indexes are built or loaded
    pub is_ready: AtomicBool,
    runtime: FolioRuntime,
    sanitizer: InputSanitizer,
}

impl AppState {
    /// Wrap an assembled runtime. The state starts not ready.
    pub fn new(runtime: FolioRuntime) -> Result<Self> {
        let sanitizer = InputSanitizer::new()
            .map_err(|e| FolioError::Config(format!("injection patterns: {e}")))?;
        Ok(Self {
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(false),
            runtime,
            sanitizer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        self.runtime.config()
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.runtime.portfolio()
    }

    pub fn indexes(&self) -> &Arc<IndexManager> {
        self.runtime.indexes()
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        self.runtime.chat()
    }

    pub fn sanitizer(&self) -> &InputSanitizer {
        &self.sanitizer
    }

    /// Build or load the indexes, then mark the service ready
    pub async fn initialize(&self) -> Result<()> {
        self.runtime.start().await?;
        self.set_ready(true);
        Ok(())
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
