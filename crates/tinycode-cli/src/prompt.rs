//! System prompt construction

use std::path::Path;

/// Build the system prompt for the registered tools
pub fn build_system_prompt(tool_names: &[&str], workspace_root: &Path) -> String {
    let has_bash = tool_names.contains(&"bash");
    let has_editor = tool_names.contains(&"str_replace_editor");
    let has_todo = tool_names.contains(&"todo");

    let mut prompt = String::from(
        "You are TinyCode, an agentic coding assistant working with the user in their terminal.\n\
         You help create, change and debug code, and answer questions about the project.\n\n",
    );

    if !tool_names.is_empty() {
        prompt.push_str("Tools:\n");
        if has_bash {
            prompt.push_str("- bash: Run shell commands in the workspace\n");
        }
        if has_editor {
            prompt.push_str("- str_replace_editor: View, create and edit files\n");
        }
        if has_todo {
            prompt.push_str("- todo: Keep a task list for the current work\n");
        }
        prompt.push('\n');
    }

    prompt.push_str("Guidelines:\n");
    prompt.push_str("- Understand the task and the project before changing anything\n");
    prompt.push_str("- Follow tool schemas exactly and pass every required parameter\n");
    prompt.push_str("- Say briefly what you are about to do before each tool call\n");

    if has_editor {
        prompt.push_str("- Make changes with the editor instead of printing code to the user\n");
        prompt.push_str("- View a file before editing it and keep edits to one file together\n");
    }
    if has_bash {
        prompt.push_str("- Use bash to explore the project and to build, run and test your changes\n");
        prompt.push_str("- Fix errors you introduce, but stop after ten attempts at the same error\n");
    }
    if has_todo {
        prompt.push_str("- Track multi-step work with todos and check them off as you go\n");
    }
    prompt.push_str("- Keep explanations short\n");

    prompt.push_str(&format!("\nWorking directory: {}", workspace_root.display()));
    prompt
}
