//! Axon Indexer — walker, parsers, and the multi-phase ingestion
//! pipeline that turns a source tree into a knowledge graph

pub mod calls;
pub mod community;
pub mod config;
pub mod coupling;
pub mod dead_code;
pub mod diff;
pub mod embeddings;
pub mod heritage;
pub mod imports;
pub mod languages;
pub mod leiden;
pub mod parser_pool;
pub mod parsing;
pub mod pipeline;
pub mod processes;
pub mod structure;
pub mod symbol_index;
pub mod types;
pub mod walker;

pub use config::{get_language, is_supported, load_gitignore, IgnoreRules};
pub use diff::{diff_branches, diff_graphs, format_diff, DiffError, StructuralDiff};
pub use embeddings::{embed_graph, EmbeddingProvider, EMBEDDABLE_LABELS};
pub use pipeline::{build_graph, reindex_files, run_pipeline, PipelineResult};
pub use walker::{read_file, walk_repo, FileEntry};
