use std::{fmt, sync::Arc};

use autopatch_config::Config;
use autopatch_core::{CredentialStore, Pipeline};

use super::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<SessionRegistry>,
    pub pipeline: Arc<Pipeline>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        credentials: Arc<dyn CredentialStore>,
        pipeline: Pipeline,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.auth.session_ttl));
        Self {
            config,
            credentials,
            sessions,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth_required(&self) -> bool {
        self.config.auth.required
    }
}
