//! Structure phase: File and Folder nodes plus CONTAINS edges

use std::collections::BTreeSet;

use axon_core::{generate_id, GraphNode, GraphRelationship, KnowledgeGraph, NodeLabel, RelType};

use crate::config::{base_name, parent_dir};
use crate::walker::FileEntry;

/// Build File/Folder nodes and `contains` relationships for a file list.
///
/// One File node per entry, one Folder node per unique ancestor
/// directory, and `contains` edges from each folder to its direct
/// children. Root-level files have no containing folder.
pub fn process_structure(files: &[FileEntry], graph: &mut KnowledgeGraph) {
    let mut folder_paths: BTreeSet<String> = BTreeSet::new();

    for entry in files {
        let mut dir = parent_dir(&entry.path);
        while !dir.is_empty() {
            folder_paths.insert(dir.to_string());
            dir = parent_dir(dir);
        }
    }

    for dir_path in &folder_paths {
        let folder_id = generate_id(NodeLabel::Folder, dir_path, "");
        if graph.get_node(&folder_id).is_none() {
            graph.add_node(GraphNode::new(
                NodeLabel::Folder,
                dir_path,
                "",
                base_name(dir_path),
            ));
        }
    }

    for entry in files {
        let mut node = GraphNode::new(NodeLabel::File, &entry.path, "", base_name(&entry.path));
        node.content = entry.content.clone();
        node.language = entry.language.clone();
        graph.add_node(node);
    }

    // Folder -> Folder (parent contains child).
    for dir_path in &folder_paths {
        let parent = parent_dir(dir_path);
        if parent.is_empty() {
            // Top-level folder has no parent.
            continue;
        }
        let parent_id = generate_id(NodeLabel::Folder, parent, "");
        let child_id = generate_id(NodeLabel::Folder, dir_path, "");
        graph.add_relationship(GraphRelationship::new(
            format!("contains:{parent_id}->{child_id}"),
            RelType::Contains,
            parent_id,
            child_id,
        ));
    }

    // Folder -> File (immediate parent folder contains file).
    for entry in files {
        let parent = parent_dir(&entry.path);
        if parent.is_empty() {
            // Root-level file, intentionally unowned.
            continue;
        }
        let parent_id = generate_id(NodeLabel::Folder, parent, "");
        let file_id = generate_id(NodeLabel::File, &entry.path, "");
        graph.add_relationship(GraphRelationship::new(
            format!("contains:{parent_id}->{file_id}"),
            RelType::Contains,
            parent_id,
            file_id,
        ));
    }
}
