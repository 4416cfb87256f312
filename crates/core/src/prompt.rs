//! System prompts for every orchestration phase.

use std::fmt::Write;

use crate::schema::{FunctionSchema, RESERVED_TOOL_NAME};

const DEFAULT_STYLE_HINT: &str =
    "If the output style is not clearly specified, answer in markdown.";

/// Describes the direct-answer pseudo-tool to planners.
fn reserved_tool_line() -> String {
    format!(
        "{RESERVED_TOOL_NAME} - the default tool. It answers normal \
         conversation and questions about yourself with generated text. \
         It has no realtime information.\nTool Parameters: the question to \
         answer"
    )
}

/// Lists tools the way planners and summarizers see them.
pub(crate) fn tools_info<'a>(
    schemas: impl IntoIterator<Item = &'a FunctionSchema>,
) -> String {
    let mut info = reserved_tool_line();
    for schema in schemas {
        info.push('\n');
        info.push_str(&schema.describe());
    }
    info
}

/// The prompt for answering without any tool.
pub(crate) fn direct_answer(
    name: &str,
    description: &str,
    output_style: &str,
) -> String {
    let mut prompt = identity(name, description);
    let _ = write!(
        prompt,
        "\n\n### OUTPUT STYLE:\n{}\n\n{DEFAULT_STYLE_HINT}",
        or_unspecified(output_style)
    );
    prompt
}

/// The prompt asking for a `func_calling` plan.
pub(crate) fn planning(tools_info: &str) -> String {
    format!(
        r#"You are an assistant that turns tasks into tool calls, answering only with JSON.

### AVAILABLE TOOLS:
{tools_info}

### INSTRUCTIONS:
1. Read the task carefully and pick the tools that can solve it.
2. Fill in every parameter a tool needs from the task.
3. Answer with the JSON structure below and nothing else, no prose around it.
4. Use "{RESERVED_TOOL_NAME}" for conversation or anything no other tool covers.
5. For tools without parameters, use an empty string as the parameter.
6. Use an object for tools with several parameters, e.g. {{"a": 1, "b": 2}}.

### JSON STRUCTURE:
{{
    "func_calling": [
        {{
            "tool_name": "<tool name>",
            "parameter": "<argument text, or an object of named arguments>"
        }}
    ]
}}"#
    )
}

/// The prompt turning tool results into the final answer.
pub(crate) fn summarizing(
    name: &str,
    tools_info: &str,
    output_style: &str,
) -> String {
    format!(
        "You are {name}, an AI agent. You receive the [QUERY] and the \
         output of tools as JSON under [TOOLS]. Use that information to \
         answer the query as well as possible, in plain words and to the \
         point. Never answer in JSON.\n\n\
         ### TOOLS:\n{tools_info}\n\n\
         ### OUTPUT STYLE:\n{}\n\n\
         If the output style is not clearly specified, answer in the best \
         possible way. Your answer must be text only.",
        or_unspecified(output_style)
    )
}

/// The input of the summarizing call.
pub(crate) fn summary_input(task: &str, section: &str, context: &str) -> String {
    format!("[QUERY]\n{task}\n\n[{section}]\n{context}")
}

/// The prompt asking for an `agent_calling` plan.
pub(crate) fn coordination<'a>(
    name: &str,
    description: &str,
    agents: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut agents_info = String::new();
    for (agent_name, agent_description) in agents {
        let _ = writeln!(agents_info, "Agent Name: {agent_name} - {agent_description}");
    }
    format!(
        r#"{identity}

You coordinate a team of agents, answering only with JSON.

### AVAILABLE AGENTS:
{agents_info}
### INSTRUCTIONS:
1. Read the task carefully and pick the agents that can solve it.
2. Give each agent a self-contained task description.
3. Answer with the JSON structure below and nothing else.
4. Agent results come back as lines like `Agent(<agent name>): <output>`.
   Hand them on to further agents if needed, or answer with an empty
   "agent_calling" list once you have everything.

### JSON STRUCTURE:
{{
    "agent_calling": [
        {{
            "agent_name": "<exact agent name>",
            "task_description": "<what the agent should do, with all data it needs>"
        }}
    ]
}}"#,
        identity = identity(name, description),
    )
}

/// The prompt turning agent reports into the final answer.
pub(crate) fn network_summarizing(name: &str, description: &str) -> String {
    format!(
        "{}\n\nYou receive the [QUERY] and the reports of your agents \
         under [AGENTS]. Combine them into the best possible answer to \
         the query, in plain words. Never answer in JSON.",
        identity(name, description)
    )
}

fn identity(name: &str, description: &str) -> String {
    if description.is_empty() {
        format!("You are {name}.")
    } else {
        format!("You are {name}, {description}.")
    }
}

fn or_unspecified(output_style: &str) -> &str {
    if output_style.trim().is_empty() {
        "(not specified)"
    } else {
        output_style
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tools_info_lists_sentinel_first() {
        let schema = FunctionSchema::from_declaration(
            "weather_tool",
            "Weather forecast.",
            Some(&json!({ "location": "city name:str" })),
        )
        .unwrap();
        let info = tools_info([&schema]);
        let mut lines = info.lines();
        assert!(lines.next().unwrap().starts_with("llm_tool - "));
        assert!(info.contains("Tool Name: weather_tool - Weather forecast."));

        let prompt = planning(&info);
        assert!(prompt.contains(&info));
        assert!(prompt.contains("\"func_calling\""));
    }

    #[test]
    fn test_identity_and_style() {
        let prompt = direct_answer("Ada", "a math tutor", "");
        assert!(prompt.starts_with("You are Ada, a math tutor."));
        assert!(prompt.contains("(not specified)"));
        assert!(prompt.contains("markdown"));

        assert_eq!(
            summary_input("What time is it?", "TOOLS", r#"{"time_tool":"noon"}"#),
            "[QUERY]\nWhat time is it?\n\n[TOOLS]\n{\"time_tool\":\"noon\"}"
        );
    }

    #[test]
    fn test_coordination_lists_agents() {
        let prompt = coordination(
            "Team",
            "",
            [("Researcher", "finds facts"), ("Writer", "writes reports")],
        );
        assert!(prompt.starts_with("You are Team."));
        assert!(prompt.contains("Agent Name: Researcher - finds facts\n"));
        assert!(prompt.contains("\"agent_calling\""));
    }
}
