use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::{
    config::ListTodayConfig,
    error::ToolError,
    mcp::ToolProvider,
    todoist::{normalize_all, NormalizedTask, TaskSource},
    tool_params,
    tools::ToolContext,
};

pub struct ListToday {
    tasks: Arc<dyn TaskSource>,
    settings: ListTodayConfig,
}

tool_params! {
    ListTodayParams,
    optional(limit: i64, "Maximum number of tasks to return (default 25)")
}

impl ToolProvider for ListToday {
    const NAME: &'static str = "todoist_list_today";
    const DESCRIPTION: &'static str = "List today + overdue tasks in LLM-friendly format";
    type Params = ListTodayParams;

    fn from_context(context: &ToolContext) -> Self {
        Self {
            tasks: context.tasks.clone(),
            settings: context.config.get_list_today_config(),
        }
    }

    async fn execute_with_params(
        &self,
        params: Self::Params,
    ) -> Result<serde_json::Value, ToolError> {
        let limit = resolve_limit(params.limit, &self.settings)?;
        let today = Local::now().date_naive();
        let tasks = list_today(self.tasks.as_ref(), limit, today).await?;
        Ok(serde_json::to_value(tasks)?)
    }
}

/// Apply the default to a missing limit, reject non-positive ones and clamp
/// the rest to the configured maximum.
pub fn resolve_limit(requested: Option<i64>, settings: &ListTodayConfig) -> Result<u32, ToolError> {
    match requested {
        None => Ok(settings.default_limit.min(settings.max_limit)),
        Some(limit) if limit <= 0 => Err(ToolError::InvalidParams(format!(
            "limit must be a positive integer, got {limit}"
        ))),
        Some(limit) => Ok(u32::try_from(limit)
            .unwrap_or(u32::MAX)
            .min(settings.max_limit)),
    }
}

/// Fetch and normalize today's tasks. Either every task comes back or none.
pub async fn list_today(
    source: &dyn TaskSource,
    limit: u32,
    today: NaiveDate,
) -> Result<Vec<NormalizedTask>, ToolError> {
    let raw_tasks = source.today_and_overdue(limit).await?;
    Ok(normalize_all(&raw_tasks, today))
}
