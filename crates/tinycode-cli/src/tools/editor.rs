//! Text editor tool: view, str_replace, create and insert

use async_trait::async_trait;
use serde_json::{Value, json};
use similar::{ChangeTag, TextDiff};
use std::path::Path;
use tinycode_agent::Tool;
use tokio::fs;

use super::{resolve_path, within_root};

const COMMANDS: [&str; 4] = ["view", "str_replace", "create", "insert"];

/// Maximum number of diff lines echoed back after an edit
const MAX_DIFF_LINES: usize = 50;

/// Tool for viewing and editing files inside the workspace root
pub struct EditorTool;

impl EditorTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditorTool {
    fn default() -> Self {
        Self::new()
    }
}

type CommandResult = std::result::Result<String, String>;

fn str_arg<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}

fn io_error(e: std::io::Error) -> String {
    format!("Error: {}", e)
}

async fn view(path: &Path, input: &Value) -> CommandResult {
    let metadata = fs::metadata(path).await.map_err(io_error)?;
    if metadata.is_dir() {
        if input.get("view_range").is_some() {
            return Err("Error: view_range is not allowed when viewing a directory.".to_string());
        }
        return list_directory(path).await;
    }

    let content = fs::read_to_string(path).await.map_err(io_error)?;
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    let (start, end) = match input.get("view_range") {
        None | Some(Value::Null) => (1, total),
        Some(range) => parse_view_range(range, total)?,
    };

    let mut output = String::new();
    for (number, line) in lines.iter().enumerate().take(end).skip(start.saturating_sub(1)) {
        output.push_str(&format!("{:>6}\t{}\n", number + 1, line));
    }
    if output.is_empty() {
        output = format!("The file {} is empty.", path.display());
    }
    Ok(output)
}

/// `[start, end]`, 1-indexed and inclusive; an end of -1 reads to the last line
fn parse_view_range(range: &Value, total: usize) -> std::result::Result<(usize, usize), String> {
    let bounds: Vec<i64> = range
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let &[start, end] = bounds.as_slice() else {
        return Err("Error: view_range must be an array of two integers.".to_string());
    };

    if start < 1 || start as usize > total.max(1) {
        return Err(format!(
            "Error: Invalid view_range start {}. It should be between 1 and {}.",
            start, total
        ));
    }
    let end = if end == -1 { total as i64 } else { end };
    if end < start || end as usize > total {
        return Err(format!(
            "Error: Invalid view_range end {}. It should be -1 or between {} and {}.",
            end, start, total
        ));
    }
    Ok((start as usize, end as usize))
}

async fn list_directory(path: &Path) -> CommandResult {
    let mut entries = fs::read_dir(path).await.map_err(io_error)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        names.push(if is_dir { format!("{}/", name) } else { name });
    }
    names.sort();

    let mut output = format!("Files and directories in {}:\n", path.display());
    for name in names {
        output.push_str(&name);
        output.push('\n');
    }
    Ok(output)
}

async fn str_replace(path: &Path, input: &Value) -> CommandResult {
    let Some(old_str) = str_arg(input, "old_str") else {
        return Err("Error: old_str is required for the str_replace command.".to_string());
    };
    let new_str = str_arg(input, "new_str").unwrap_or_default();
    if old_str.is_empty() {
        return Err("Error: old_str must not be empty.".to_string());
    }

    let content = fs::read_to_string(path).await.map_err(io_error)?;
    match content.matches(old_str).count() {
        0 => {
            return Err(format!(
                "Error: No match found for old_str in {}. It must match exactly, including whitespace.",
                path.display()
            ));
        }
        1 => {}
        n => {
            return Err(format!(
                "Error: Found {} occurrences of old_str in {}. Include more context so it is unique.",
                n,
                path.display()
            ));
        }
    }

    let updated = content.replacen(old_str, new_str, 1);
    fs::write(path, &updated).await.map_err(io_error)?;
    Ok(edited(path, &content, &updated))
}

async fn create(path: &Path, input: &Value) -> CommandResult {
    let Some(file_text) = str_arg(input, "file_text") else {
        return Err("Error: file_text is required for the create command.".to_string());
    };
    if fs::try_exists(path).await.unwrap_or(false) {
        return Err(format!(
            "Error: File already exists at: {}. Use str_replace or insert to modify it.",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    fs::write(path, file_text).await.map_err(io_error)?;
    Ok(format!("File created successfully at: {}", path.display()))
}

async fn insert(path: &Path, input: &Value) -> CommandResult {
    let Some(insert_line) = input.get("insert_line").and_then(Value::as_i64) else {
        return Err("Error: insert_line is required for the insert command.".to_string());
    };
    let Some(new_str) = str_arg(input, "new_str") else {
        return Err("Error: new_str is required for the insert command.".to_string());
    };

    let content = fs::read_to_string(path).await.map_err(io_error)?;
    let mut lines: Vec<&str> = content.lines().collect();
    if insert_line < 0 || insert_line as usize > lines.len() {
        return Err(format!(
            "Error: Invalid insert_line {}. It should be between 0 and {}.",
            insert_line,
            lines.len()
        ));
    }

    let at = insert_line as usize;
    lines.splice(at..at, new_str.lines());
    let mut updated = lines.join("\n");
    if content.is_empty() || content.ends_with('\n') {
        updated.push('\n');
    }

    fs::write(path, &updated).await.map_err(io_error)?;
    Ok(edited(path, &content, &updated))
}

fn edited(path: &Path, before: &str, after: &str) -> String {
    format!(
        "The file {} has been edited.\n\nDiff:\n{}",
        path.display(),
        generate_diff(before, after)
    )
}

/// Line diff, truncated to keep results small
fn generate_diff(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = Vec::new();

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push(format!("{}{}", sign, change));
    }

    if output.len() > MAX_DIFF_LINES {
        output.truncate(MAX_DIFF_LINES);
        output.push("... (diff truncated)\n".to_string());
    }

    output.join("")
}

#[async_trait]
impl Tool for EditorTool {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn description(&self) -> &str {
        "View, create and modify text files in the workspace. `view` prints a file with \
         line numbers or lists a directory, `str_replace` swaps one exact, unique occurrence \
         of text, `create` writes a new file and `insert` adds text after a given line. \
         Suited to reading code, targeted fixes, refactors and writing new files or tests."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The editing command to run",
                    "enum": COMMANDS
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to operate on. Directories are only valid for view."
                },
                "view_range": {
                    "type": "array",
                    "description": "Optional [start_line, end_line] for view, 1-indexed and inclusive. Use -1 as end_line to read to the end of the file.",
                    "items": { "type": "integer" }
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact text to replace, including whitespace and indentation. Required for str_replace."
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text for str_replace, or the text to add for insert."
                },
                "file_text": {
                    "type": "string",
                    "description": "Full content of the file to create. Required for create."
                },
                "insert_line": {
                    "type": "integer",
                    "description": "Line after which new_str is inserted; 0 inserts at the top. Required for insert."
                }
            },
            "required": ["command", "path"],
            "additionalProperties": false
        })
    }

    fn native_type(&self) -> Option<&str> {
        Some("text_editor_20250124")
    }

    async fn execute(&self, input: Value, workspace_root: &Path) -> String {
        let path = resolve_path(workspace_root, str_arg(&input, "path").unwrap_or_default());
        if !within_root(workspace_root, &path) {
            return format!("Error: The path {} is outside the root directory.", path.display());
        }

        let command = str_arg(&input, "command").unwrap_or_default();
        tracing::debug!(command, path = %path.display(), "editor command");
        let result = match command {
            "view" => view(&path, &input).await,
            "str_replace" => str_replace(&path, &input).await,
            "create" => create(&path, &input).await,
            "insert" => insert(&path, &input).await,
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
        EditorTool::new().execute(input, root).await
    }

    #[tokio::test]
    async fn test_view_numbers_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();

        let out = run(dir.path(), json!({"command": "view", "path": "a.txt"})).await;
        assert_eq!(out, "     1\tone\n     2\ttwo\n     3\tthree\n");

        let out = run(
            dir.path(),
            json!({"command": "view", "path": "a.txt", "view_range": [2, -1]}),
        )
        .await;
        assert_eq!(out, "     2\ttwo\n     3\tthree\n");

        let out = run(
            dir.path(),
            json!({"command": "view", "path": "a.txt", "view_range": [3, 1]}),
        )
        .await;
        assert!(out.starts_with("Error: Invalid view_range end"));
    }

    #[tokio::test]
    async fn test_view_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();

        let out = run(dir.path(), json!({"command": "view", "path": "."})).await;
        assert!(out.ends_with(":\nb.txt\nsrc/\n"));
    }

    #[tokio::test]
    async fn test_str_replace_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.rs");
        std::fs::write(&file, "let a = 1;\nlet b = 1;\n").unwrap();

        let out = run(
            dir.path(),
            json!({"command": "str_replace", "path": "main.rs", "old_str": "= 1", "new_str": "= 2"}),
        )
        .await;
        assert!(out.starts_with("Error: Found 2 occurrences"));

        let out = run(
            dir.path(),
            json!({"command": "str_replace", "path": "main.rs", "old_str": "nope", "new_str": ""}),
        )
        .await;
        assert!(out.starts_with("Error: No match found"));

        let out = run(
            dir.path(),
            json!({"command": "str_replace", "path": "main.rs", "old_str": "let b = 1", "new_str": "let b = 2"}),
        )
        .await;
        assert!(out.contains("has been edited"));
        assert!(out.contains("-let b = 1;\n+let b = 2;\n"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "let a = 1;\nlet b = 2;\n");
    }

    #[tokio::test]
    async fn test_create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(
            dir.path(),
            json!({"command": "create", "path": "nested/new.txt", "file_text": "hello\n"}),
        )
        .await;
        let file = dir.path().join("nested/new.txt");
        assert_eq!(out, format!("File created successfully at: {}", file.display()));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello\n");

        let out = run(
            dir.path(),
            json!({"command": "create", "path": "nested/new.txt", "file_text": "again"}),
        )
        .await;
        assert!(out.starts_with("Error: File already exists"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_insert_after_line() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("list.txt");
        std::fs::write(&file, "a\nc\n").unwrap();

        let out = run(
            dir.path(),
            json!({"command": "insert", "path": "list.txt", "insert_line": 1, "new_str": "b"}),
        )
        .await;
        assert!(out.contains("+b\n"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "a\nb\nc\n");

        let out = run(
            dir.path(),
            json!({"command": "insert", "path": "list.txt", "insert_line": 0, "new_str": "top"}),
        )
        .await;
        assert!(out.contains("has been edited"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "top\na\nb\nc\n");

        let out = run(
            dir.path(),
            json!({"command": "insert", "path": "list.txt", "insert_line": 9, "new_str": "x"}),
        )
        .await;
        assert_eq!(out, "Error: Invalid insert_line 9. It should be between 0 and 4.");
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root_and_unknown_commands() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(dir.path(), json!({"command": "view", "path": "../escape.txt"})).await;
        assert!(out.starts_with("Error: The path "));
        assert!(out.ends_with(" is outside the root directory."));

        let out = run(dir.path(), json!({"command": "undo_edit", "path": "a.txt"})).await;
        assert_eq!(
            out,
            "Error: Unknown command 'undo_edit'. Available commands are: view, str_replace, create, insert"
        );
    }

    #[test]
    fn test_generate_diff_truncates() {
        let old: String = (0..100).map(|i| format!("{}\n", i)).collect();
        let diff = generate_diff(&old, "");
        assert_eq!(diff.lines().count(), MAX_DIFF_LINES + 1);
        assert!(diff.ends_with("... (diff truncated)\n"));
    }
}
