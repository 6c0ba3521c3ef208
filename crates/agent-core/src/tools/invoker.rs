use std::collections::HashSet;
use std::time::Duration;

use crate::agent::Message;
use crate::tools::{parse_tool_args, ToolCall, ToolError, ToolRegistry};

/// Run one requested call and answer it with exactly one tool-role message.
///
/// Nothing escapes: a missing id, unparsable arguments, an unknown tool, a
/// failing or slow executor all become an error message the model can read.
pub async fn invoke_tool_call(
    call: &ToolCall,
    registry: &ToolRegistry,
    timeout: Option<Duration>,
) -> Message {
    let name = call.function.name.as_str();

    let Some(call_id) = call.id.as_deref().filter(|id| !id.is_empty()) else {
        log::warn!("Tool call for '{}' arrived without an id", name);
        return unidentified_call_turn("", name);
    };

    let content = match execute(call, registry, timeout).await {
        Ok(output) => output,
        Err(InvocationFailure::BadArguments(error)) => {
            log::warn!("[{}] Invalid arguments for '{}': {}", call_id, name, error);
            format!("Error: invalid arguments for tool '{}': {}", name, error)
        }
        Err(InvocationFailure::UnknownTool) => {
            log::warn!("[{}] Tool '{}' is not registered", call_id, name);
            format!("Error: Tool '{}' not found", name)
        }
        Err(InvocationFailure::Failed(error)) => {
            log::error!("[{}] Tool '{}' failed: {}", call_id, name, error);
            format!("Error executing tool: {}", error)
        }
    };

    Message::tool_result(call_id, name, content)
}

/// Give every call that arrived without an id a generated `call_<uuid>` id,
/// so the assistant turn and its tool turns still pair up on the wire.
///
/// Returns the generated ids. Those calls are answered with
/// [`unidentified_call_turn`] and never executed.
pub fn assign_missing_ids(calls: &mut [ToolCall]) -> HashSet<String> {
    let mut generated = HashSet::new();

    for call in calls.iter_mut() {
        if call.id.as_deref().is_some_and(|id| !id.is_empty()) {
            continue;
        }
        let id = format!("call_{}", uuid::Uuid::new_v4().simple());
        log::warn!(
            "Tool call for '{}' arrived without an id, answering it as {}",
            call.function.name,
            id
        );
        call.id = Some(id.clone());
        generated.insert(id);
    }

    generated
}

/// Error turn for a call the model issued without an id.
pub fn unidentified_call_turn(call_id: &str, name: &str) -> Message {
    Message::tool_result(
        call_id,
        name,
        format!("Error: tool call for '{}' has no id and cannot be executed", name),
    )
}

enum InvocationFailure {
    BadArguments(ToolError),
    UnknownTool,
    Failed(ToolError),
}

async fn execute(
    call: &ToolCall,
    registry: &ToolRegistry,
    timeout: Option<Duration>,
) -> Result<String, InvocationFailure> {
    let name = call.function.name.as_str();
    let arguments =
        parse_tool_args(&call.function.arguments).map_err(InvocationFailure::BadArguments)?;
    let executor = registry
        .resolve(name)
        .ok_or(InvocationFailure::UnknownTool)?;

    log::debug!("Invoking '{}' on executor '{}'", name, executor.label());

    let invocation = executor.invoke(name, arguments);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(format!(
                "'{}' did not finish within {}ms",
                name,
                limit.as_millis()
            ))),
        },
        None => invocation.await,
    };

    result.map_err(InvocationFailure::Failed)
}
