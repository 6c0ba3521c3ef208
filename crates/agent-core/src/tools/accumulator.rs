use std::collections::BTreeMap;

use crate::tools::{FunctionCall, ToolCall, ToolCallFragment};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PartialToolCall {
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

/// Rebuilds complete tool calls from streamed fragments.
///
/// Each `index` owns its own accumulator; argument chunks are appended in
/// arrival order, and the first non-empty `id` and `name` seen for an index
/// stick. Fragments of different indices may interleave freely.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    parts: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: ToolCallFragment) {
        let part = self.parts.entry(fragment.index).or_default();

        set_once(&mut part.id, fragment.id, fragment.index, "id");
        set_once(&mut part.name, fragment.name, fragment.index, "name");

        if let Some(chunk) = fragment.arguments {
            part.arguments.push_str(&chunk);
        }
    }

    pub fn extend<I>(&mut self, fragments: I)
    where
        I: IntoIterator<Item = ToolCallFragment>,
    {
        for fragment in fragments {
            self.push(fragment);
        }
    }

    /// Seal the calls in ascending index order.
    ///
    /// Calls that never received an id or a name are still emitted so the
    /// invoker can answer them with an error instead of silently losing them.
    pub fn finish(self) -> Vec<ToolCall> {
        self.parts
            .into_values()
            .map(|part| ToolCall {
                id: part.id,
                tool_type: "function".to_string(),
                function: FunctionCall {
                    name: part.name.unwrap_or_default(),
                    arguments: part.arguments,
                },
            })
            .collect()
    }

    pub fn parts(&self) -> impl Iterator<Item = (&u32, &PartialToolCall)> {
        self.parts.iter()
    }

    pub fn has_fragments(&self) -> bool {
        !self.parts.is_empty()
    }
}

fn set_once(slot: &mut Option<String>, incoming: Option<String>, index: u32, field: &str) {
    let Some(value) = incoming.filter(|v| !v.is_empty()) else {
        return;
    };

    match slot.as_deref() {
        None => *slot = Some(value),
        Some(existing) if existing != value => {
            log::warn!(
                "Ignoring conflicting {} '{}' for tool call #{} (keeping '{}')",
                field,
                value,
                index,
                existing
            );
        }
        Some(_) => {}
    }
}
