/// Generate a parameter struct along with its JSON schema and extraction.
///
/// Every parameter is optional: a missing or `null` argument becomes `None`,
/// an argument of the wrong JSON type is rejected.
#[macro_export]
macro_rules! tool_params {
    (
        $struct_name:ident,
        $(optional($name:ident: $type:ident, $desc:expr)),* $(,)?
    ) => {
        #[derive(Debug, Default)]
        pub struct $struct_name {
            $(pub $name: Option<$crate::tool_params!(@rust_type $type)>,)*
        }

        impl $crate::mcp::ToolParams for $struct_name {
            fn input_schema() -> serde_json::Value {
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        $(
                            stringify!($name): {
                                "type": $crate::tool_params!(@json_type $type),
                                "description": $desc
                            },
                        )*
                    },
                    "required": []
                })
            }

            fn extract_params(
                arguments: &serde_json::Value,
            ) -> Result<Self, $crate::error::ToolError> {
                Ok(Self {
                    $(
                        $name: $crate::tool_params!(@extract_optional $type, arguments, stringify!($name))?,
                    )*
                })
            }
        }
    };

    // Type mappings
    (@json_type i64) => { "integer" };
    (@json_type string) => { "string" };

    (@rust_type i64) => { i64 };
    (@rust_type string) => { String };

    // Extraction
    (@extract_optional i64, $args:expr, $name:expr) => {
        match $args.get($name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                $crate::error::ToolError::InvalidParams(format!(
                    "{} must be an integer, got {}",
                    $name, value
                ))
            }),
        }
    };
    (@extract_optional string, $args:expr, $name:expr) => {
        match $args.get($name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value.as_str().map(|s| Some(s.to_owned())).ok_or_else(|| {
                $crate::error::ToolError::InvalidParams(format!(
                    "{} must be a string, got {}",
                    $name, value
                ))
            }),
        }
    };
}
