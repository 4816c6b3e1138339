//! Tree reconciliation between a remote forest and a local identity index.
//!
//! The remote side arrives as a flat node list linked by external parent
//! ids. Flattening orders it parent-before-child (explicit work stack,
//! equivalent to depth-first pre-order), so a freshly created parent's
//! identity is already in the index when its children resolve. Parent
//! linkage is always the local reference of the processed parent, never
//! the remote id, which keeps local referential integrity independent of
//! remote numbering.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::Result;
use crate::sync::equality::EqualityPolicy;
use crate::sync::path::resolve_path;
use crate::sync::ItemFailure;

/// The identity used to match a remote node to its local counterpart:
/// the explicit external id when present, the derived path otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    External(String),
    Path(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External(id) => write!(f, "id:{id}"),
            Self::Path(path) => write!(f, "path:{path}"),
        }
    }
}

/// Access to the name every tree content type carries.
pub trait NodeContent {
    fn name(&self) -> &str;
}

impl NodeContent for crate::models::TaskContent {
    fn name(&self) -> &str {
        &self.name
    }
}

impl NodeContent for crate::models::GroupContent {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One node of the remote forest, linked to its parent by external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode<C> {
    pub external_id: Option<String>,
    pub parent_external_id: Option<String>,
    pub content: C,
}

/// What the index knows about one already-materialized entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<R, C> {
    /// Handle to the stored node (mirror row id, or remote id when the
    /// sink writes to the remote service)
    pub node_ref: R,
    pub parent_ref: Option<R>,
    pub content: C,
}

/// Mutable identity index shared across one pass, read-after-write.
pub type NodeIndex<R, C> = HashMap<Identity, IndexEntry<R, C>>;

/// Write side of reconciliation; implemented by the mirror store and by
/// the remote task API (import direction).
pub trait TreeSink<C> {
    type Ref: Clone + PartialEq;

    /// Create the counterpart of `node` under the resolved parent.
    fn create(&mut self, node: &RemoteNode<C>, parent: Option<&Self::Ref>) -> Result<Self::Ref>;

    /// Overwrite the counterpart's content fields, keeping its identity.
    fn update(
        &mut self,
        target: &Self::Ref,
        node: &RemoteNode<C>,
        parent: Option<&Self::Ref>,
    ) -> Result<()>;
}

/// Per-pass counters for one tree reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeOutcome {
    pub added: usize,
    pub updated: usize,
    pub untouched: usize,
    pub failures: Vec<ItemFailure>,
}

/// A remote node paired with its resolved identities, in apply order.
struct FlatNode<'a, C> {
    node: &'a RemoteNode<C>,
    identity: Identity,
    parent_identity: Option<Identity>,
}

/// Order `nodes` parent-before-child and resolve identities.
///
/// Nodes whose identity duplicates an earlier node are rejected with a
/// diagnostic; nodes unreachable from any root (cyclic parent chains)
/// are rejected too. A parent link naming an unknown external id makes
/// the node a root.
fn flatten<'a, C: NodeContent>(
    nodes: &'a [RemoteNode<C>],
    failures: &mut Vec<ItemFailure>,
) -> Vec<FlatNode<'a, C>> {
    let by_external_id: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, node)| node.external_id.as_deref().map(|id| (id, i)))
        .collect();

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        let parent = node
            .parent_external_id
            .as_deref()
            .and_then(|id| by_external_id.get(id).copied())
            // a node linked to itself would otherwise vanish from the forest
            .filter(|&p| p != i);
        match parent {
            Some(p) => children.entry(p).or_default().push(i),
            None => roots.push(i),
        }
    }

    let mut flat = Vec::with_capacity(nodes.len());
    let mut seen: HashSet<Identity> = HashSet::with_capacity(nodes.len());
    let mut visited = vec![false; nodes.len()];

    // Work stack of (node index, ancestor names root..parent, parent identity);
    // pushed in reverse so pop order matches input order.
    let mut stack: Vec<(usize, Vec<String>, Option<Identity>)> = Vec::new();
    for &root in roots.iter().rev() {
        stack.push((root, Vec::new(), None));
    }

    while let Some((i, ancestors, parent_identity)) = stack.pop() {
        visited[i] = true;
        let node = &nodes[i];
        let identity = match &node.external_id {
            Some(id) => Identity::External(id.clone()),
            None => Identity::Path(resolve_path(&ancestors, node.content.name())),
        };

        if !seen.insert(identity.clone()) {
            tracing::warn!(identity = %identity, "duplicate identity in remote data, entity rejected");
            failures.push(ItemFailure::new(
                identity.to_string(),
                "duplicate identity in remote data".to_string(),
            ));
            continue;
        }

        let mut child_ancestors = ancestors.clone();
        child_ancestors.push(node.content.name().to_string());
        if let Some(child_indices) = children.get(&i) {
            for &child in child_indices.iter().rev() {
                stack.push((child, child_ancestors.clone(), Some(identity.clone())));
            }
        }

        flat.push(FlatNode {
            node,
            identity,
            parent_identity,
        });
    }

    for (i, node) in nodes.iter().enumerate() {
        if !visited[i] {
            let label = node
                .external_id
                .clone()
                .unwrap_or_else(|| node.content.name().to_string());
            tracing::warn!(node = %label, "node unreachable from any accepted root, entity rejected");
            failures.push(ItemFailure::new(
                label,
                "unreachable from any accepted root (cyclic chain or rejected ancestor)"
                    .to_string(),
            ));
        }
    }

    flat
}

/// The identities a remote forest occupies, duplicates collapsed.
///
/// Used to decide which local rows vanished remotely.
pub fn identity_set<C: NodeContent>(nodes: &[RemoteNode<C>]) -> HashSet<Identity> {
    let mut failures = Vec::new();
    flatten(nodes, &mut failures)
        .into_iter()
        .map(|flat| flat.identity)
        .collect()
}

/// Reconcile the remote forest into the index through `sink`.
///
/// Per node: unknown identity is created, known identity is updated only
/// when content or parent linkage differ, otherwise untouched (this is
/// what keeps repeated passes idempotent). A failure constructing one
/// node is recorded with full context and skipped; its descendants are
/// skipped too rather than grafted onto the wrong parent. Store and
/// transport errors abort the pass.
pub fn reconcile<C, S, P>(
    nodes: &[RemoteNode<C>],
    index: &mut NodeIndex<S::Ref, C>,
    sink: &mut S,
    policy: &P,
) -> Result<TreeOutcome>
where
    C: NodeContent + Clone,
    S: TreeSink<C>,
    P: EqualityPolicy<C>,
{
    let mut outcome = TreeOutcome::default();
    let flat = flatten(nodes, &mut outcome.failures);

    for FlatNode {
        node,
        identity,
        parent_identity,
    } in flat
    {
        let parent_ref = match &parent_identity {
            None => None,
            Some(pid) => match index.get(pid) {
                Some(entry) => Some(entry.node_ref.clone()),
                None => {
                    outcome.failures.push(ItemFailure::new(
                        identity.to_string(),
                        format!("parent {pid} unavailable"),
                    ));
                    continue;
                }
            },
        };

        match index.get(&identity) {
            None => match sink.create(node, parent_ref.as_ref()) {
                Ok(node_ref) => {
                    index.insert(
                        identity,
                        IndexEntry {
                            node_ref,
                            parent_ref,
                            content: node.content.clone(),
                        },
                    );
                    outcome.added += 1;
                }
                Err(error) if error.is_entity_scoped() => {
                    tracing::warn!(identity = %identity, error = %error, "create skipped");
                    outcome
                        .failures
                        .push(ItemFailure::new(identity.to_string(), error.to_string()));
                }
                Err(error) => return Err(error),
            },
            Some(entry) => {
                let same_content = policy.equal(&node.content, &entry.content);
                let same_parent = entry.parent_ref == parent_ref;
                if same_content && same_parent {
                    outcome.untouched += 1;
                    continue;
                }

                let target = entry.node_ref.clone();
                match sink.update(&target, node, parent_ref.as_ref()) {
                    Ok(()) => {
                        index.insert(
                            identity,
                            IndexEntry {
                                node_ref: target,
                                parent_ref,
                                content: node.content.clone(),
                            },
                        );
                        outcome.updated += 1;
                    }
                    Err(error) if error.is_entity_scoped() => {
                        tracing::warn!(identity = %identity, error = %error, "update skipped");
                        outcome
                            .failures
                            .push(ItemFailure::new(identity.to_string(), error.to_string()));
                    }
                    Err(error) => return Err(error),
                }
            }
        }
    }

    Ok(outcome)
}

/// Create every missing ancestor for a declared path, root to leaf.
///
/// `segments` are the ancestor names from root to the leaf's parent.
/// Missing prefixes are synthesized through `placeholder` (unbookable,
/// no external id) so each synthesized node is available as the parent
/// of the next segment. Returns the reference of the deepest ancestor
/// and how many nodes were synthesized.
pub fn ensure_ancestors<C, S, F>(
    segments: &[String],
    index: &mut NodeIndex<S::Ref, C>,
    sink: &mut S,
    placeholder: F,
) -> Result<(Option<S::Ref>, usize)>
where
    C: NodeContent + Clone,
    S: TreeSink<C>,
    F: Fn(&str) -> C,
{
    let mut parent_ref: Option<S::Ref> = None;
    let mut created = 0;

    for depth in 0..segments.len() {
        let identity = Identity::Path(resolve_path(&segments[..depth], &segments[depth]));
        if let Some(entry) = index.get(&identity) {
            parent_ref = Some(entry.node_ref.clone());
            continue;
        }

        let node = RemoteNode {
            external_id: None,
            parent_external_id: None,
            content: placeholder(&segments[depth]),
        };
        let node_ref = sink.create(&node, parent_ref.as_ref())?;
        index.insert(
            identity,
            IndexEntry {
                node_ref: node_ref.clone(),
                parent_ref: parent_ref.clone(),
                content: node.content,
            },
        );
        parent_ref = Some(node_ref);
        created += 1;
    }

    Ok((parent_ref, created))
}

/// One mirror row, as loaded from the store, ready for indexing.
#[derive(Debug, Clone)]
pub struct MirrorRow<R, C> {
    pub node_ref: R,
    pub external_id: Option<String>,
    pub parent_ref: Option<R>,
    pub content: C,
}

/// Build the identity index over the mirror's current rows.
///
/// Identities prefer the external id and fall back to the path computed
/// from local parent chains. Rows whose identity collides with an
/// earlier row are skipped with a warning; a corrupted parent cycle
/// terminates the chain at the first revisited row.
pub fn mirror_index<R, C>(rows: Vec<MirrorRow<R, C>>) -> NodeIndex<R, C>
where
    R: Clone + Eq + Hash,
    C: NodeContent + Clone,
{
    let by_ref: HashMap<R, (Option<R>, String)> = rows
        .iter()
        .map(|row| {
            (
                row.node_ref.clone(),
                (row.parent_ref.clone(), row.content.name().to_string()),
            )
        })
        .collect();

    let mut index = NodeIndex::with_capacity(rows.len());
    for row in rows {
        let identity = match &row.external_id {
            Some(id) => Identity::External(id.clone()),
            None => {
                let mut chain = Vec::new();
                let mut cursor = row.parent_ref.clone();
                let mut walked: HashSet<R> = HashSet::new();
                while let Some(parent) = cursor {
                    if !walked.insert(parent.clone()) {
                        break;
                    }
                    match by_ref.get(&parent) {
                        Some((grand, name)) => {
                            chain.push(name.clone());
                            cursor = grand.clone();
                        }
                        None => break,
                    }
                }
                chain.reverse();
                Identity::Path(resolve_path(&chain, row.content.name()))
            }
        };

        if index.contains_key(&identity) {
            tracing::warn!(identity = %identity, "duplicate identity in mirror, row skipped");
            continue;
        }
        index.insert(
            identity,
            IndexEntry {
                node_ref: row.node_ref,
                parent_ref: row.parent_ref,
                content: row.content,
            },
        );
    }
    index
}
