use std::sync::Arc;

use bioscan_biometric::BiometricService;
use bioscan_bridge::AppInfo;
use bioscan_hardware::AnyShim;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::monitor::MonitorConfig;

/// The service as the host runs it: backend chosen at startup.
pub type HostService = BiometricService<AnyShim>;

/// Everything one host run owns. Built once in `main` and passed down.
#[derive(Debug)]
pub struct HostContext {
    pub session_id: Uuid,
    pub config: HostConfig,
    pub service: Arc<HostService>,
    /// Effective log filter, reported by `app.getEnv`.
    pub log_filter: String,
}

impl HostContext {
    pub fn new(config: HostConfig, shim: AnyShim, log_filter: impl Into<String>) -> Self {
        let service = BiometricService::new(shim, config.capture_config());
        Self {
            session_id: Uuid::new_v4(),
            config,
            service: Arc::new(service),
            log_filter: log_filter.into(),
        }
    }

    pub fn app_info(&self) -> AppInfo {
        AppInfo {
            app_name: self.config.app.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.config.app.environment.clone(),
            backend: self.service.backend().to_string(),
            log_filter: self.log_filter.clone(),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: self.config.poll_interval(),
            auto_reconnect: self.config.monitor.auto_reconnect,
        }
    }
}
