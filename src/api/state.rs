use std::sync::Arc;

use crate::{auth::IdentityProvider, config::Settings, service::ServiceContext};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    pub identity: Arc<dyn IdentityProvider>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        identity: Arc<dyn IdentityProvider>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            identity,
            settings,
        }
    }
}
