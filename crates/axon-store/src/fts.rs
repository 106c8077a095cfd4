//! Full-text index over node name, content, and signature
//!
//! Thin wrapper around a tantivy index living in the store directory.
//! Rebuilds are drop-and-recreate: the graph store calls
//! [`FtsIndex::rebuild`] after any bulk data change and decorates the
//! raw BM25 scores with its own ranking adjustments.

use std::path::Path;

use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// One document to index: the node id plus its searchable text fields.
pub struct FtsDocument<'a> {
    pub node_id: &'a str,
    pub name: &'a str,
    pub content: &'a str,
    pub signature: &'a str,
}

/// A `(node_id, bm25_score)` hit.
#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub node_id: String,
    pub score: f32,
}

pub struct FtsIndex {
    index: Index,
    reader: IndexReader,
    field_node_id: Field,
    field_name: Field,
    field_content: Field,
    field_signature: Field,
}

impl FtsIndex {
    /// Open the index at `dir`, creating it with the fixed schema when
    /// absent.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut builder = Schema::builder();
        let field_node_id = builder.add_text_field("node_id", STRING | STORED);
        let field_name = builder.add_text_field("name", TEXT);
        let field_content = builder.add_text_field("content", TEXT);
        let field_signature = builder.add_text_field("signature", TEXT);
        let schema = builder.build();

        let index = Index::open_or_create(MmapDirectory::open(dir)?, schema)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        Ok(FtsIndex {
            index,
            reader,
            field_node_id,
            field_name,
            field_content,
            field_signature,
        })
    }

    /// Drop every document and index the given set, committing at the
    /// end. The reader is reloaded so searches immediately observe the
    /// new contents.
    pub fn rebuild<'a>(&mut self, documents: impl Iterator<Item = FtsDocument<'a>>) -> Result<()> {
        let mut writer: IndexWriter = self.index.writer(WRITER_MEMORY_BYTES)?;
        writer.delete_all_documents()?;

        for document in documents {
            writer.add_document(doc!(
                self.field_node_id => document.node_id,
                self.field_name => document.name,
                self.field_content => document.content,
                self.field_signature => document.signature,
            ))?;
        }

        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// BM25 search across name, content, and signature. Query syntax
    /// errors are tolerated (lenient parsing); a wholly unparsable query
    /// returns nothing.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(
            &self.index,
            vec![self.field_name, self.field_content, self.field_signature],
        );
        let (parsed, _errors) = parser.parse_query_lenient(query);

        let top = searcher.search(&parsed, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let document: TantivyDocument = searcher.doc(address)?;
            let node_id = document
                .get_first(self.field_node_id)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string();
            if !node_id.is_empty() {
                hits.push(FtsHit { node_id, score });
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_docs() -> Vec<(String, String, String, String)> {
        vec![
            (
                "function:src/auth.py:validate".to_string(),
                "validate".to_string(),
                "def validate(token):\n    return check_token(token)".to_string(),
                "def validate(token)".to_string(),
            ),
            (
                "function:src/db.py:query_db".to_string(),
                "query_db".to_string(),
                "def query_db(sql):\n    return rows".to_string(),
                "def query_db(sql)".to_string(),
            ),
        ]
    }

    fn build(dir: &Path) -> FtsIndex {
        let mut index = FtsIndex::open_or_create(dir).unwrap();
        let docs = sample_docs();
        index
            .rebuild(docs.iter().map(|(id, name, content, signature)| FtsDocument {
                node_id: id,
                name,
                content,
                signature,
            }))
            .unwrap();
        index
    }

    #[test]
    fn finds_by_name_and_content() {
        let tmp = TempDir::new().unwrap();
        let index = build(tmp.path());

        let hits = index.search("validate", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "function:src/auth.py:validate");

        let hits = index.search("rows", 10).unwrap();
        assert_eq!(hits[0].node_id, "function:src/db.py:query_db");
    }

    #[test]
    fn rebuild_replaces_documents() {
        let tmp = TempDir::new().unwrap();
        let mut index = build(tmp.path());

        index
            .rebuild(std::iter::once(FtsDocument {
                node_id: "function:src/new.py:fresh",
                name: "fresh",
                content: "def fresh(): pass",
                signature: "",
            }))
            .unwrap();

        assert!(index.search("validate", 10).unwrap().is_empty());
        assert_eq!(index.search("fresh", 10).unwrap().len(), 1);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = build(tmp.path());
        assert!(index.search("   ", 10).unwrap().is_empty());
    }
}
