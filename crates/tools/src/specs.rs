// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider-agnostic tool descriptors (spec.md §4.8's table). `drape-agent`
//! converts these into whatever shape a given [`drape_providers::ChatProvider`]
//! wants on the wire rather than this crate depending on `drape-providers`.

use serde_json::{json, Value};

/// One entry of the closed tool set: name, a model-facing description, and
/// a JSON Schema for its input object.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// The full closed set, in [`crate::dispatcher::TOOL_NAMES`] order.
pub fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "read_file",
            description: "Read the contents of a file in the project.",
            input_schema: json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}},
                "required": ["file_path"],
            }),
        },
        ToolDescriptor {
            name: "write_file",
            description: "Write (creating or overwriting) a file in the project. Triggers hot-reload.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "content": {"type": "string"},
                    "description": {"type": "string"},
                },
                "required": ["file_path", "content"],
            }),
        },
        ToolDescriptor {
            name: "edit_file",
            description: "Replace the first literal occurrence of old_string with new_string in a file.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                },
                "required": ["file_path", "old_string", "new_string"],
            }),
        },
        ToolDescriptor {
            name: "list_directory",
            description: "List a directory's entries, or the full recursive file tree.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean"},
                },
            }),
        },
        ToolDescriptor {
            name: "run_command",
            description: "Run a shell command inside the project's container.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout": {"type": "integer", "description": "Milliseconds"},
                },
                "required": ["command"],
            }),
        },
        ToolDescriptor {
            name: "glob_search",
            description: "Find files whose path matches a glob pattern.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                },
                "required": ["pattern"],
            }),
        },
        ToolDescriptor {
            name: "grep_search",
            description: "Search file contents for a regular expression.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"},
                    "include": {"type": "string", "description": "Glob restricting which files are searched"},
                },
                "required": ["pattern"],
            }),
        },
        ToolDescriptor {
            name: "web_search",
            description: "Search the web for information not available in the project.",
            input_schema: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"],
            }),
        },
        ToolDescriptor {
            name: "todo_write",
            description: "Replace the project's todo list.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "todos": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "content": {"type": "string"},
                                "active_form": {"type": "string"},
                                "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                            },
                            "required": ["content"],
                        },
                    },
                },
                "required": ["todos"],
            }),
        },
        ToolDescriptor {
            name: "ask_user_question",
            description: "Pause and ask the user one or more questions before continuing.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "question": {"type": "string"},
                                "options": {"type": "array", "items": {"type": "string"}},
                            },
                            "required": ["question"],
                        },
                    },
                },
                "required": ["questions"],
            }),
        },
        ToolDescriptor {
            name: "signal_completion",
            description: "Signal that the requested task is finished.",
            input_schema: json!({
                "type": "object",
                "properties": {"result": {"type": "string"}},
                "required": ["result"],
            }),
        },
    ]
}

#[cfg(test)]
#[path = "specs_tests.rs"]
mod tests;
