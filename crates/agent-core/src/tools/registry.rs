use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::tools::{FunctionSchema, ToolError, ToolExecutor, ToolSchema, ToolSpec};

pub type SharedExecutor = Arc<dyn ToolExecutor>;

/// Routes tool names to the executor that hosts them.
///
/// Built once at startup, then shared read-only (`Arc<ToolRegistry>`) by every
/// conversation. When two executors advertise the same name the later
/// registration wins and its descriptor replaces the earlier one.
#[derive(Default)]
pub struct ToolRegistry {
    routes: HashMap<String, SharedExecutor>,
    schemas: Vec<ToolSchema>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover the executor's tools and route each name to it.
    ///
    /// Returns the normalized descriptors contributed by this executor.
    pub async fn register(
        &mut self,
        executor: SharedExecutor,
    ) -> Result<Vec<ToolSchema>, ToolError> {
        let specs = executor.list_tools().await?;
        let mut registered = Vec::with_capacity(specs.len());

        for spec in specs {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                log::warn!(
                    "Skipping tool with empty name from executor '{}'",
                    executor.label()
                );
                continue;
            }

            let schema = normalize_tool_spec(ToolSpec { name: name.clone(), ..spec });

            if let Some(previous) = self.routes.insert(name.clone(), Arc::clone(&executor)) {
                log::warn!(
                    "Tool '{}' from executor '{}' replaces the one from '{}'",
                    name,
                    executor.label(),
                    previous.label()
                );
            }

            match self
                .schemas
                .iter_mut()
                .find(|existing| existing.function.name == name)
            {
                Some(existing) => *existing = schema.clone(),
                None => self.schemas.push(schema.clone()),
            }

            registered.push(schema);
        }

        log::info!(
            "Registered {} tools from executor '{}'",
            registered.len(),
            executor.label()
        );

        Ok(registered)
    }

    pub fn resolve(&self, name: &str) -> Option<SharedExecutor> {
        self.routes.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Every known descriptor, in first-registration order.
    pub fn tools(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Descriptors to attach to a completion request; `None` when there are none,
    /// so the request carries no tools field at all.
    pub fn request_tools(&self) -> Option<&[ToolSchema]> {
        if self.schemas.is_empty() {
            None
        } else {
            Some(&self.schemas)
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Map an executor-native descriptor onto the completion-service shape:
/// `inputSchema` becomes `parameters`, a missing description becomes empty.
pub fn normalize_tool_spec(spec: ToolSpec) -> ToolSchema {
    let parameters = if spec.input_schema.is_null() {
        json!({ "type": "object", "properties": {} })
    } else {
        spec.input_schema
    };

    ToolSchema {
        schema_type: "function".to_string(),
        function: FunctionSchema {
            name: spec.name,
            description: spec.description.unwrap_or_default(),
            parameters,
        },
    }
}
