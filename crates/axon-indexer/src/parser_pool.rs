//! Thread-backed parser pool
//!
//! Tree-sitter parsers are stateful and not `Sync`, so parsing runs on
//! dedicated worker threads fed through a channel. Each worker lazily
//! builds one parser per language and reuses it for every file it sees.
//! The pool itself is a process-level singleton.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, warn};

use crate::languages::{parser_for, LanguageParser, ParseResult};
use crate::walker::FileEntry;

/// Default number of parser worker threads.
pub const PARSE_WORKERS: usize = 8;

struct ParseJob {
    index: usize,
    path: String,
    content: String,
    language: String,
    reply: mpsc::Sender<(usize, ParseResult)>,
}

pub struct ParserPool {
    sender: mpsc::Sender<ParseJob>,
}

impl ParserPool {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<ParseJob>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..workers.max(1) {
            let receiver = Arc::clone(&receiver);
            std::thread::spawn(move || worker_loop(worker_id, receiver));
        }

        ParserPool { sender }
    }

    /// The process-level pool, created on first use.
    pub fn global() -> &'static ParserPool {
        static POOL: OnceLock<ParserPool> = OnceLock::new();
        POOL.get_or_init(|| ParserPool::new(PARSE_WORKERS))
    }

    /// Parse every entry in parallel, returning results in input order.
    ///
    /// A file whose parser fails contributes an empty [`ParseResult`] so
    /// downstream phases can safely skip it.
    pub fn parse_batch(&self, files: &[FileEntry]) -> Vec<ParseResult> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let mut submitted = 0usize;
        let mut results: Vec<ParseResult> = vec![ParseResult::default(); files.len()];

        for (index, entry) in files.iter().enumerate() {
            let job = ParseJob {
                index,
                path: entry.path.clone(),
                content: entry.content.clone(),
                language: entry.language.clone(),
                reply: reply_tx.clone(),
            };
            if self.sender.send(job).is_ok() {
                submitted += 1;
            } else {
                warn!("parser pool is shut down; skipping {}", entry.path);
            }
        }
        drop(reply_tx);

        for _ in 0..submitted {
            match reply_rx.recv() {
                Ok((index, result)) => results[index] = result,
                Err(_) => break,
            }
        }

        results
    }
}

fn worker_loop(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<ParseJob>>>) {
    debug!("parser worker {worker_id} started");
    let mut parsers: HashMap<String, Box<dyn LanguageParser>> = HashMap::new();

    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                break;
            };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => {
                    debug!("parser worker {worker_id} shutting down");
                    break;
                }
            }
        };

        let result = parse_one(&mut parsers, &job);
        let _ = job.reply.send((job.index, result));
    }
}

fn parse_one(parsers: &mut HashMap<String, Box<dyn LanguageParser>>, job: &ParseJob) -> ParseResult {
    if !parsers.contains_key(&job.language) {
        match parser_for(&job.language) {
            Ok(parser) => {
                parsers.insert(job.language.clone(), parser);
            }
            Err(err) => {
                warn!("failed to build {} parser for {}: {err}", job.language, job.path);
                return ParseResult::default();
            }
        }
    }

    let parser = parsers
        .get_mut(&job.language)
        .expect("parser inserted above");
    parser.parse(&job.content, &job.path)
}
