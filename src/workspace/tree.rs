//! Recursive file tree listing for clients
//!
//! Directories sort before files, each group by name. Dot-entries and
//! internal service directories are skipped at every level. Symlinks are
//! never followed; they are listed as files.

use std::io;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use super::is_hidden;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// One entry in the tree sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileNode {
    pub name: String,
    /// Path relative to the workspace root, forward slashes
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// List `root` recursively
pub fn file_tree(root: &Path) -> io::Result<Vec<FileNode>> {
    // Directories still being filled, outermost first
    let mut open: Vec<(FileNode, Vec<FileNode>)> = Vec::new();
    let mut top = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(&e.file_name().to_string_lossy()));

    for entry in walker {
        let entry = entry?;
        while open.len() >= entry.depth() {
            close_dir(&mut open, &mut top);
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let name = entry.file_name().to_string_lossy().into_owned();

        if entry.file_type().is_dir() {
            let node = FileNode {
                name,
                path,
                kind: NodeKind::Directory,
                children: None,
            };
            open.push((node, Vec::new()));
        } else {
            let node = FileNode {
                name,
                path,
                kind: NodeKind::File,
                children: None,
            };
            match open.last_mut() {
                Some((_, children)) => children.push(node),
                None => top.push(node),
            }
        }
    }
    while !open.is_empty() {
        close_dir(&mut open, &mut top);
    }

    sort_nodes(&mut top);
    Ok(top)
}

fn close_dir(open: &mut Vec<(FileNode, Vec<FileNode>)>, top: &mut Vec<FileNode>) {
    let Some((mut dir, mut children)) = open.pop() else {
        return;
    };
    sort_nodes(&mut children);
    dir.children = Some(children);
    match open.last_mut() {
        Some((_, siblings)) => siblings.push(dir),
        None => top.push(dir),
    }
}

fn sort_nodes(nodes: &mut [FileNode]) {
    nodes.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_tree_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/util")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("venv/lib")).unwrap();
        fs::write(root.join("b.txt"), "").unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::write(root.join(".env"), "").unwrap();
        fs::write(root.join("src/util/mod.rs"), "").unwrap();

        let tree = file_tree(root).unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["src", "a.txt", "b.txt"]);

        let util = &tree[0].children.as_ref().unwrap()[0];
        assert_eq!(util.path, "src/util");
        assert_eq!(util.children.as_ref().unwrap()[0].path, "src/util/mod.rs");
    }

    #[test]
    fn test_symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "host data").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let tree = file_tree(&root).unwrap();
        assert_eq!(
            tree,
            vec![FileNode {
                name: "link".into(),
                path: "link".into(),
                kind: NodeKind::File,
                children: None,
            }]
        );
    }

    #[test]
    fn test_empty_directory_has_empty_children() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        let tree = file_tree(dir.path()).unwrap();
        assert_eq!(tree[0].children, Some(Vec::new()));
    }

    #[test]
    fn test_node_serialization_shape() {
        let node = FileNode {
            name: "a.txt".into(),
            path: "a.txt".into(),
            kind: NodeKind::File,
            children: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "file");
        assert!(json.get("children").is_none());
    }
}
