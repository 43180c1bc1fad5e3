//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays group
//! membership as a tree. Members appear in priority order; nested groups
//! are expanded, and a group already on the current branch is shown once
//! more and marked as a cycle instead of being expanded again.
//!
//! Each node shows the size of its committed catalog, when there is one.
//! This command is read-only and never takes catalog locks.

use anyhow::{anyhow, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::borrow::Cow;

use group_index::catalog_manager::CatalogManager;
use group_index::registry::StoreRegistry;
use group_index::store::{RepositoryKey, RepositoryType};

use super::Context;

/// Show group membership as a tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Group to display, as type:name. Defaults to every group.
    #[arg(value_name = "KEY")]
    pub key: Option<RepositoryKey>,

    /// Maximum depth to display.
    ///
    /// 0 shows only the root, 1 its direct members, and so on.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.registry()?;
    let catalogs = ctx.catalogs()?;
    let max_depth = args.depth.unwrap_or(usize::MAX);

    let roots = match args.key {
        Some(key) => {
            registry.get(&key).map_err(|e| anyhow!("{}", e))?;
            vec![key]
        }
        None => registry.all_of_type(RepositoryType::Group)?,
    };
    if roots.is_empty() {
        println!("No groups configured in {}", ctx.config_path.display());
        return Ok(());
    }

    for root in &roots {
        let mut branch = Vec::new();
        let node = build_tree_node(registry.as_ref(), &catalogs, root, max_depth, &mut branch);
        print_tree(&node).map_err(|e| anyhow!("Failed to display tree: {}", e))?;
    }
    Ok(())
}

/// Build the tree below `key`. `branch` holds the groups on the path from
/// the root, for cycle detection.
fn build_tree_node(
    registry: &dyn StoreRegistry,
    catalogs: &CatalogManager,
    key: &RepositoryKey,
    max_depth: usize,
    branch: &mut Vec<RepositoryKey>,
) -> TreeNode {
    let label = match catalogs.summary(key) {
        Ok(Some(summary)) => format!("{} [{} entries]", key, summary.entries),
        Ok(None) => format!("{} [no catalog]", key),
        Err(e) => format!("{} [unreadable catalog: {}]", key, e),
    };

    if branch.contains(key) {
        return TreeNode::leaf(format!("{} (cycle)", key));
    }

    let members = match registry.get(key) {
        Ok(descriptor) => descriptor.members().to_vec(),
        Err(_) => return TreeNode::leaf(format!("{} (undefined)", key)),
    };
    if branch.len() >= max_depth || members.is_empty() {
        return TreeNode::leaf(label);
    }

    branch.push(key.clone());
    let children = members
        .iter()
        .map(|member| build_tree_node(registry, catalogs, member, max_depth, branch))
        .collect();
    branch.pop();

    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(label: String) -> Self {
        Self {
            label,
            children: Vec::new(),
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_with;
    use group_index::registry::MemoryRegistry;
    use group_index::store::RepositoryDescriptor;

    fn labels(node: &TreeNode) -> Vec<String> {
        node.children.iter().map(|c| c.label.clone()).collect()
    }

    #[test]
    fn test_nested_group_is_expanded_in_order() {
        let (_temp, ctx) = context_with(&[]);
        let registry = ctx.registry().unwrap();
        let catalogs = ctx.catalogs().unwrap();

        let node = build_tree_node(
            registry.as_ref(),
            &catalogs,
            &RepositoryKey::group("all"),
            usize::MAX,
            &mut Vec::new(),
        );
        assert_eq!(node.label, "group:all [no catalog]");
        assert_eq!(labels(&node), vec!["group:public [no catalog]"]);
        assert_eq!(
            labels(&node.children[0]),
            vec![
                "hosted:releases [no catalog]",
                "hosted:snapshots [no catalog]",
                "remote:central [no catalog]",
            ]
        );
    }

    #[test]
    fn test_depth_limit_stops_expansion() {
        let (_temp, ctx) = context_with(&[]);
        let registry = ctx.registry().unwrap();
        let catalogs = ctx.catalogs().unwrap();

        let node = build_tree_node(
            registry.as_ref(),
            &catalogs,
            &RepositoryKey::group("all"),
            1,
            &mut Vec::new(),
        );
        assert_eq!(node.children.len(), 1);
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn test_cycle_is_marked_not_expanded() {
        let (_temp, ctx) = context_with(&[]);
        let catalogs = ctx.catalogs().unwrap();
        let registry = MemoryRegistry::new();
        registry
            .insert(RepositoryDescriptor::Group {
                name: "a".to_string(),
                members: vec![RepositoryKey::group("b")],
            })
            .unwrap();
        registry
            .insert(RepositoryDescriptor::Group {
                name: "b".to_string(),
                members: vec![RepositoryKey::group("a")],
            })
            .unwrap();

        let node = build_tree_node(
            &registry,
            &catalogs,
            &RepositoryKey::group("a"),
            usize::MAX,
            &mut Vec::new(),
        );
        assert_eq!(labels(&node.children[0]), vec!["group:a (cycle)"]);
    }
}
