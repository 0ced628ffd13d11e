//! Snapshot tree model
//!
//! A `FileTree` owns every node in a `Vec` arena. Parents own children
//! through `NodeId` indices and children point back at their parent with a
//! plain index, so there are no reference cycles to manage.

use crate::error::TreeError;
use crate::fs::types::StatRecord;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

/// Index of a node inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One filesystem entry within a snapshot
#[derive(Debug, Clone)]
pub struct FileNode {
    name: OsString,
    parent: Option<NodeId>,
    children: HashMap<OsString, NodeId>,
    stat: Option<StatRecord>,
    capability: Option<Vec<u8>>,
}

impl FileNode {
    /// Base name (`/` for the root)
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Owning directory, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child with the given name
    pub fn child(&self, name: &OsStr) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Children in no particular order
    pub fn children(&self) -> impl Iterator<Item = (&OsStr, NodeId)> {
        self.children.iter().map(|(k, v)| (k.as_os_str(), *v))
    }

    /// Children sorted by name bytes
    pub fn sorted_children(&self) -> Vec<(&OsStr, NodeId)> {
        let mut children: Vec<_> = self.children().collect();
        children.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Captured metadata; the synthetic root has none
    pub fn stat(&self) -> Option<&StatRecord> {
        self.stat.as_ref()
    }

    /// Raw `security.capability` bytes, if the entry had any
    pub fn capability(&self) -> Option<&[u8]> {
        self.capability.as_deref()
    }

    /// Whether the node is a directory (the root always is)
    pub fn is_dir(&self) -> bool {
        match &self.stat {
            Some(stat) => stat.is_dir(),
            None => self.parent.is_none(),
        }
    }
}

/// Arena-backed snapshot tree
#[derive(Debug, Clone)]
pub struct FileTree {
    nodes: Vec<FileNode>,
}

impl FileTree {
    /// Create a tree holding only the root node
    pub fn new_root() -> Self {
        Self {
            nodes: vec![FileNode {
                name: OsString::from("/"),
                parent: None,
                children: HashMap::new(),
                stat: None,
                capability: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Node by id, `None` if the id is not from this tree
    pub fn get(&self, id: NodeId) -> Option<&FileNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Resolve a slash-separated path relative to the root
    ///
    /// `/` and the empty path resolve to the root. Returns `None` as soon
    /// as a component is missing.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.root();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir => continue,
                Component::Normal(name) => {
                    current = self.get(current)?.child(name)?;
                }
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        Some(current)
    }

    /// Add a node under `parent`
    ///
    /// If `parent` already has a child with this name the existing id is
    /// returned and the new data is dropped: each path is visited once per
    /// walk, so a repeat insert carries nothing new.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        name: OsString,
        stat: StatRecord,
        capability: Option<Vec<u8>>,
    ) -> Result<NodeId, TreeError> {
        validate_name(&name)?;

        let next = NodeId(self.nodes.len());
        let parent_node = self
            .nodes
            .get_mut(parent.0)
            .ok_or(TreeError::UnknownParent { id: parent.0 })?;

        if let Some(existing) = parent_node.children.get(&name) {
            return Ok(*existing);
        }
        parent_node.children.insert(name.clone(), next);

        self.nodes.push(FileNode {
            name,
            parent: Some(parent),
            children: HashMap::new(),
            stat: Some(stat),
            capability,
        });
        Ok(next)
    }

    /// Absolute-style path of a node (`/`, `/etc`, `/etc/passwd`)
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        let mut names = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            match node.parent {
                Some(parent) => {
                    names.push(node.name.as_os_str());
                    current = self.get(parent);
                }
                None => break,
            }
        }

        let mut path = PathBuf::from("/");
        for name in names.into_iter().rev() {
            path.push(name);
        }
        path
    }

    /// Every node as `(path, id)`, depth-first with siblings in name order
    ///
    /// Parents always precede their children.
    pub fn entries(&self) -> Vec<(PathBuf, NodeId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(PathBuf::from("/"), self.root())];

        while let Some((path, id)) = stack.pop() {
            if let Some(node) = self.get(id) {
                for (name, child) in node.sorted_children().into_iter().rev() {
                    stack.push((path.join(name), child));
                }
            }
            out.push((path, id));
        }
        out
    }
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new_root()
    }
}

fn validate_name(name: &OsStr) -> Result<(), TreeError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes == b"." || bytes == b".." || bytes.contains(&b'/') {
        return Err(TreeError::InvalidName {
            name: name.to_string_lossy().into_owned(),
        });
    }
    Ok(())
}
