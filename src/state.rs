use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::soundpad::Soundboard;
use crate::ytdlp::VideoProvider;

pub struct AppState {
    /// One permit: a request holds it from acknowledgement until its
    /// download and registration have finished.
    pub limiter: Arc<Semaphore>,
    pub provider: Arc<dyn VideoProvider>,
    pub soundboard: Arc<dyn Soundboard>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn VideoProvider>,
        soundboard: Arc<dyn Soundboard>,
    ) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(1)),
            provider,
            soundboard,
            config: Arc::new(config),
        }
    }
}
