//! Axon Tools — read-only query tool surface over a storage backend
//!
//! Handlers format query results for clients; the transport layer lives
//! outside this crate. The raw-query write-keyword filter and the
//! unified-diff parser defined here are part of the compatibility
//! contract.

pub mod handlers;
pub mod registry;

pub use handlers::{
    handle_architecture, handle_context, handle_dead_code, handle_detect_changes,
    handle_file_context, handle_flow_trace, handle_impact, handle_query, handle_raw_query,
    handle_related_files,
};
pub use registry::{build_meta, handle_list_repos, RepoMeta, RepoStats};
