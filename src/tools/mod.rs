pub mod today;

use std::sync::Arc;

use crate::{config::Config, todoist::TaskSource};

/// What a tool gets to work with. Cheap to clone, one per server.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub tasks: Arc<dyn TaskSource>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, tasks: Arc<dyn TaskSource>) -> Self {
        Self { config, tasks }
    }
}
