use std::sync::Arc;

use crate::client::SubmissionClient;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub client: Arc<SubmissionClient>,
}
