//! Workspace TODO list tool backed by `.tinycode/todo.json`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tinycode_agent::Tool;
use tokio::fs;

const COMMANDS: [&str; 4] = ["create", "check", "remove", "list"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

fn todo_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".tinycode").join("todo.json")
}

/// A missing or unreadable file is an empty list
async fn read_todos(workspace_root: &Path) -> Vec<Todo> {
    let path = todo_path(workspace_root);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("failed to read {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("failed to parse {}: {}", path.display(), e);
        Vec::new()
    })
}

async fn write_todos(workspace_root: &Path, todos: &[Todo]) -> Result<(), String> {
    let path = todo_path(workspace_root);
    let write = async {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(todos)?;
        fs::write(&path, json).await
    };
    write
        .await
        .map_err(|e: std::io::Error| format!("Error: Failed to write todos: {}", e))
}

/// Tool for keeping a TODO list in the workspace
pub struct TodoTool;

impl TodoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TodoTool {
    fn default() -> Self {
        Self::new()
    }
}

async fn create(root: &Path, content: Option<&str>) -> Result<String, String> {
    let Some(content) = content.filter(|c| !c.trim().is_empty()) else {
        return Err("Error: Content is required for creating a todo.".to_string());
    };

    let mut todos = read_todos(root).await;
    let todo = Todo {
        id: uuid::Uuid::new_v4().to_string(),
        content: content.to_string(),
        completed: false,
        created_at: Utc::now(),
    };
    let id = todo.id.clone();
    todos.push(todo);
    write_todos(root, &todos).await?;
    Ok(format!("Todo created successfully with ID: {}", id))
}

async fn check(root: &Path, id: Option<&str>) -> Result<String, String> {
    let Some(id) = id else {
        return Err("Error: ID is required for checking a todo.".to_string());
    };

    let mut todos = read_todos(root).await;
    let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
        return Err(format!("Error: Todo with ID '{}' not found.", id));
    };
    todo.completed = !todo.completed;
    let message = format!(
        "Todo '{}' marked as {}.",
        todo.content,
        if todo.completed { "completed" } else { "uncompleted" }
    );
    write_todos(root, &todos).await?;
    Ok(message)
}

async fn remove(root: &Path, id: Option<&str>) -> Result<String, String> {
    let Some(id) = id else {
        return Err("Error: ID is required for removing a todo.".to_string());
    };

    let mut todos = read_todos(root).await;
    let Some(index) = todos.iter().position(|t| t.id == id) else {
        return Err(format!("Error: Todo with ID '{}' not found.", id));
    };
    let removed = todos.remove(index);
    write_todos(root, &todos).await?;
    Ok(format!("Todo '{}' removed successfully.", removed.content))
}

async fn list(root: &Path) -> String {
    let todos = read_todos(root).await;
    if todos.is_empty() {
        return "No todos found.".to_string();
    }

    let done = todos.iter().filter(|t| t.completed).count();
    let lines: Vec<String> = todos
        .iter()
        .map(|t| {
            format!(
                "{} [{}] {} (created: {})",
                if t.completed { '✓' } else { '○' },
                t.id,
                t.content,
                t.created_at.format("%Y-%m-%d")
            )
        })
        .collect();
    format!(
        "Todos ({}/{} completed):\n{}",
        done,
        todos.len(),
        lines.join("\n")
    )
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "A tool for managing TODO items. You can create, check, remove, and list todos."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The operation to perform",
                    "enum": COMMANDS
                },
                "id": {
                    "type": "string",
                    "description": "ID of the todo. Required for check and remove."
                },
                "content": {
                    "type": "string",
                    "description": "Text of the todo. Required for create."
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, input: Value, workspace_root: &Path) -> String {
        let arg = |key: &str| input.get(key).and_then(Value::as_str);
        let Some(command) = arg("command") else {
            return "Error: No command specified.".to_string();
        };

        let result = match command {
            "create" => create(workspace_root, arg("content")).await,
            "check" => check(workspace_root, arg("id")).await,
            "remove" => remove(workspace_root, arg("id")).await,
            "list" => Ok(list(workspace_root).await),
            other => Err(format!(
                "Error: Unknown command '{}'. Available commands are: {}",
                other,
                COMMANDS.join(", ")
            )),
        };
        result.unwrap_or_else(|e| e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(root: &Path, input: Value) -> String {
        TodoTool::new().execute(input, root).await
    }

    #[tokio::test]
    async fn test_create_check_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        assert_eq!(run(root, json!({"command": "list"})).await, "No todos found.");

        let out = run(root, json!({"command": "create", "content": "write tests"})).await;
        let id = out
            .strip_prefix("Todo created successfully with ID: ")
            .unwrap()
            .to_string();
        assert!(root.join(".tinycode/todo.json").exists());

        let out = run(root, json!({"command": "check", "id": id})).await;
        assert_eq!(out, "Todo 'write tests' marked as completed.");

        let listing = run(root, json!({"command": "list"})).await;
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(
            listing,
            format!("Todos (1/1 completed):\n✓ [{}] write tests (created: {})", id, today)
        );

        let out = run(root, json!({"command": "check", "id": id})).await;
        assert_eq!(out, "Todo 'write tests' marked as uncompleted.");

        let out = run(root, json!({"command": "remove", "id": id})).await;
        assert_eq!(out, "Todo 'write tests' removed successfully.");
        assert_eq!(run(root, json!({"command": "list"})).await, "No todos found.");
    }

    #[tokio::test]
    async fn test_stored_as_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), json!({"command": "create", "content": "a"})).await;

        let raw = std::fs::read_to_string(todo_path(dir.path())).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let entry = &value[0];
        assert_eq!(entry["content"], "a");
        assert_eq!(entry["completed"], false);
        assert!(entry["createdAt"].is_string());
        assert!(entry["id"].is_string());
    }

    #[tokio::test]
    async fn test_argument_errors() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        assert_eq!(run(root, json!({})).await, "Error: No command specified.");
        assert_eq!(
            run(root, json!({"command": "purge"})).await,
            "Error: Unknown command 'purge'. Available commands are: create, check, remove, list"
        );
        assert_eq!(
            run(root, json!({"command": "create"})).await,
            "Error: Content is required for creating a todo."
        );
        assert_eq!(
            run(root, json!({"command": "check"})).await,
            "Error: ID is required for checking a todo."
        );
        assert_eq!(
            run(root, json!({"command": "remove"})).await,
            "Error: ID is required for removing a todo."
        );
        assert_eq!(
            run(root, json!({"command": "check", "id": "missing"})).await,
            "Error: Todo with ID 'missing' not found."
        );
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".tinycode")).unwrap();
        std::fs::write(todo_path(dir.path()), "not json").unwrap();
        assert_eq!(run(dir.path(), json!({"command": "list"})).await, "No todos found.");
    }
}
