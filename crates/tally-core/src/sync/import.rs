//! File import orchestration: parsed entries upserted into the remote
//! task tree by path.
//!
//! Entries are processed independently; one bad row is recorded and the
//! loop proceeds. Missing ancestors named by an entry's path are
//! synthesized as unbookable placeholders before the leaf itself is
//! created or (equality-gated) updated.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::TaskContent;
use crate::remote::{NewRemoteTask, TrackerRemote};
use crate::sync::equality::EqualityPolicy;
use crate::sync::path::{join_path, resolve_path, split_import_path};
use crate::sync::tree::{
    ensure_ancestors, Identity, IndexEntry, NodeContent, NodeIndex, RemoteNode, TreeOutcome,
    TreeSink,
};
use crate::sync::ItemFailure;

/// One decoded row of an import file.
///
/// The declared path carries the full ancestor chain; the leaf segment
/// becomes the task name. Cell-to-record decoding happens in the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub path: String,
    pub description: Option<String>,
    pub bookable: bool,
    pub billable: bool,
    pub custom_fields: BTreeMap<String, String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl ImportEntry {
    /// A bookable entry with only a path, defaults everywhere else.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: None,
            bookable: true,
            billable: false,
            custom_fields: BTreeMap::new(),
            valid_from: None,
            valid_to: None,
        }
    }

    fn to_content(&self, name: &str) -> TaskContent {
        TaskContent {
            name: name.to_string(),
            description: self.description.clone(),
            bookable: self.bookable,
            billable: self.billable,
            custom_fields: self.custom_fields.clone(),
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        }
    }
}

/// Sink that writes tree nodes to the remote task API.
struct RemoteTaskSink<'a> {
    remote: &'a dyn TrackerRemote,
}

impl TreeSink<TaskContent> for RemoteTaskSink<'_> {
    type Ref = String;

    fn create(
        &mut self,
        node: &RemoteNode<TaskContent>,
        parent: Option<&String>,
    ) -> Result<String> {
        self.remote.create_task(&NewRemoteTask {
            parent_external_id: parent.cloned(),
            content: node.content.clone(),
        })
    }

    fn update(
        &mut self,
        target: &String,
        node: &RemoteNode<TaskContent>,
        parent: Option<&String>,
    ) -> Result<()> {
        self.remote.update_task(
            target,
            &NewRemoteTask {
                parent_external_id: parent.cloned(),
                content: node.content.clone(),
            },
        )
    }
}

/// Index the fetched remote task forest by path.
///
/// The import direction joins on paths only; a fetched task without a
/// remote id cannot be addressed for update and is left out with a
/// warning.
fn remote_path_index(nodes: &[RemoteNode<TaskContent>]) -> NodeIndex<String, TaskContent> {
    let by_external_id: std::collections::HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, node)| node.external_id.as_deref().map(|id| (id, i)))
        .collect();

    let mut children: std::collections::HashMap<usize, Vec<usize>> =
        std::collections::HashMap::new();
    let mut roots = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let parent = node
            .parent_external_id
            .as_deref()
            .and_then(|id| by_external_id.get(id).copied())
            .filter(|&p| p != i);
        match parent {
            Some(p) => children.entry(p).or_default().push(i),
            None => roots.push(i),
        }
    }

    let mut index = NodeIndex::new();
    let mut stack: Vec<(usize, Vec<String>, Option<String>)> = Vec::new();
    for &root in roots.iter().rev() {
        stack.push((root, Vec::new(), None));
    }

    while let Some((i, ancestors, parent_ref)) = stack.pop() {
        let node = &nodes[i];
        let path = resolve_path(&ancestors, node.content.name());

        let mut child_ancestors = ancestors;
        child_ancestors.push(node.content.name().to_string());
        if let Some(child_indices) = children.get(&i) {
            for &child in child_indices.iter().rev() {
                stack.push((child, child_ancestors.clone(), node.external_id.clone()));
            }
        }

        let Some(external_id) = node.external_id.clone() else {
            tracing::warn!(path = %path, "remote task without id excluded from import index");
            continue;
        };

        let identity = Identity::Path(path);
        if index.contains_key(&identity) {
            tracing::warn!(identity = %identity, "duplicate remote path, first occurrence wins");
            continue;
        }
        index.insert(
            identity,
            IndexEntry {
                node_ref: external_id,
                parent_ref,
                content: node.content.clone(),
            },
        );
    }

    index
}

/// Upsert every entry against the remote task tree.
pub fn import_entries<P>(
    remote: &dyn TrackerRemote,
    entries: &[ImportEntry],
    policy: &P,
) -> Result<TreeOutcome>
where
    P: EqualityPolicy<TaskContent>,
{
    let remote_nodes = remote.fetch_task_tree()?;
    let mut index = remote_path_index(&remote_nodes);
    let mut sink = RemoteTaskSink { remote };
    let mut outcome = TreeOutcome::default();

    for entry in entries {
        let segments = split_import_path(&entry.path);
        let Some((leaf_name, ancestors)) = segments.split_last() else {
            outcome.failures.push(ItemFailure::new(
                entry.path.clone(),
                "empty task path".to_string(),
            ));
            continue;
        };

        let parent_ref = match ensure_ancestors(
            ancestors,
            &mut index,
            &mut sink,
            |name: &str| TaskContent::placeholder(name),
        ) {
            Ok((parent_ref, created)) => {
                outcome.added += created;
                parent_ref
            }
            Err(error) if error.is_entity_scoped() => {
                tracing::warn!(path = %entry.path, error = %error, "ancestor synthesis failed, entry skipped");
                outcome
                    .failures
                    .push(ItemFailure::new(entry.path.clone(), error.to_string()));
                continue;
            }
            Err(error) => return Err(error),
        };

        let identity = Identity::Path(join_path(&segments));
        let node = RemoteNode {
            external_id: None,
            parent_external_id: None,
            content: entry.to_content(leaf_name),
        };

        let result = match index.get(&identity) {
            None => match sink.create(&node, parent_ref.as_ref()) {
                Ok(node_ref) => {
                    index.insert(
                        identity,
                        IndexEntry {
                            node_ref,
                            parent_ref,
                            content: node.content,
                        },
                    );
                    outcome.added += 1;
                    Ok(())
                }
                Err(error) => Err(error),
            },
            Some(entry_in_index) => {
                if policy.equal(&node.content, &entry_in_index.content)
                    && entry_in_index.parent_ref == parent_ref
                {
                    outcome.untouched += 1;
                    Ok(())
                } else {
                    let target = entry_in_index.node_ref.clone();
                    match sink.update(&target, &node, parent_ref.as_ref()) {
                        Ok(()) => {
                            index.insert(
                                identity,
                                IndexEntry {
                                    node_ref: target,
                                    parent_ref,
                                    content: node.content,
                                },
                            );
                            outcome.updated += 1;
                            Ok(())
                        }
                        Err(error) => Err(error),
                    }
                }
            }
        };

        match result {
            Ok(()) => {}
            Err(error) if error.is_entity_scoped() => {
                tracing::warn!(path = %entry.path, error = %error, "entry skipped");
                outcome
                    .failures
                    .push(ItemFailure::new(entry.path.clone(), error.to_string()));
            }
            Err(error) => return Err(error),
        }
    }

    Ok(outcome)
}
