pub mod api;
pub mod error;
pub mod state;

use crate::cli::Args;
use self::state::AppState;
use std::error::Error;

pub use self::api::create_router;

pub struct Server {
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(
        state: AppState,
        args: Args,
    ) -> Self {
        Self {
            state,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(
            self.state.clone(),
            &self.args,
        ).await
    }
}
