macro_rules! register_tools {
    ( $($tool:path),* $(,)? ) => {
        pub fn list_tools(config: &crate::config::Config) -> Vec<crate::mcp::ToolDefinition> {
            let mut tools = Vec::new();
            $(
                if config.is_tool_enabled::<$tool>() {
                    tools.push(<$tool>::get_tool_definition());
                }
            )*
            tools
        }

        pub async fn execute_tool(
            name: &str,
            arguments: &serde_json::Value,
            context: &crate::tools::ToolContext,
        ) -> Result<serde_json::Value, crate::error::ToolError> {
            $(
                if <$tool>::NAME == name && context.config.is_tool_enabled::<$tool>() {
                    return <$tool>::from_context(context).execute(arguments).await;
                }
            )*
            Err(crate::error::ToolError::NotFound(name.to_owned()))
        }
    };
}

pub(crate) use register_tools;
