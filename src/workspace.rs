//! Credentials stored by the Windmill CLI (`wmill workspace add`).
//!
//! The store lives under `<preference dir>/windmill/`:
//! - `remotes.ndjson`: one JSON workspace per line
//! - `activeWorkspace`: the name of the selected workspace
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

const REMOTES_FILE: &str = "remotes.ndjson";
const ACTIVE_FILE: &str = "activeWorkspace";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub remote: String,
    pub workspace_id: String,
    pub name: String,
    pub token: String,
}

/// `<preference dir>/windmill`, or a temp-dir location when the platform has none.
pub fn store_root() -> PathBuf {
    dirs::preference_dir().unwrap_or_else(std::env::temp_dir).join("windmill")
}

/// Every workspace in the store keyed by name; later lines win.
pub fn all_workspaces(root: &Path) -> Result<IndexMap<String, Workspace>> {
    let path = root.join(REMOTES_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut workspaces = IndexMap::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().len() <= 2 {
            continue;
        }
        let workspace: Workspace = crate::path_de::from_str_with_path(line).map_err(|message| Error::WorkspaceStore {
            path: path.clone(),
            message: format!("line {}: {message}", lineno + 1),
        })?;
        workspaces.insert(workspace.name.clone(), workspace);
    }
    Ok(workspaces)
}

pub fn active_workspace_name(root: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(root.join(ACTIVE_FILE)) {
        Ok(name) if name.trim().is_empty() => Ok(None),
        Ok(name) => Ok(Some(name.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Look up `name`, or the active workspace when no name is given.
pub fn find_workspace(root: &Path, name: Option<&str>) -> Result<Workspace> {
    let name = match name {
        Some(name) => name.to_string(),
        None => active_workspace_name(root)?.ok_or_else(|| Error::WorkspaceNotFound("<active>".to_string()))?,
    };
    all_workspaces(root)?.shift_remove(&name).ok_or(Error::WorkspaceNotFound(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(remotes: &str, active: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REMOTES_FILE), remotes).unwrap();
        if let Some(active) = active {
            std::fs::write(dir.path().join(ACTIVE_FILE), active).unwrap();
        }
        dir
    }

    const REMOTES: &str = concat!(
        r#"{"remote":"https://app.windmill.dev/","workspaceId":"acme","name":"prod","token":"t1"}"#,
        "\n\n",
        r#"{"remote":"http://localhost:8000/","workspaceId":"dev","name":"local","token":"t2"}"#,
        "\n",
    );

    #[test]
    fn finds_the_active_workspace() {
        let dir = store(REMOTES, Some("local\n"));
        let workspace = find_workspace(dir.path(), None).unwrap();
        assert_eq!(workspace.workspace_id, "dev");
        assert_eq!(workspace.token, "t2");
    }

    #[test]
    fn explicit_name_wins() {
        let dir = store(REMOTES, Some("local"));
        let workspace = find_workspace(dir.path(), Some("prod")).unwrap();
        assert_eq!(workspace.remote, "https://app.windmill.dev/");
    }

    #[test]
    fn unknown_or_missing_workspace_is_an_error() {
        let dir = store(REMOTES, None);
        assert!(matches!(find_workspace(dir.path(), Some("staging")), Err(Error::WorkspaceNotFound(n)) if n == "staging"));
        assert!(matches!(find_workspace(dir.path(), None), Err(Error::WorkspaceNotFound(_))));
    }

    #[test]
    fn malformed_lines_name_the_line() {
        let dir = store("{}\n{\"remote\": 1}\n", None);
        let err = all_workspaces(dir.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn empty_store_has_no_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        assert!(all_workspaces(dir.path()).unwrap().is_empty());
    }
}
