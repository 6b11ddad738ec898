//! Fuzzy full-text search over a tantivy index.
//!
//! The index holds one document per visible text file: its tracked path
//! (exact term, used for deletes), its title and its source text. An
//! indexer task builds it from the crawler snapshot at startup and then
//! follows the change stream, committing once per batch of events.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, STORED, STRING, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use eb_site::BlogItem;
use eb_storage::{ChangeEvent, ChangeKind, is_dir_path};

use crate::{SearchContext, SearchError, Searcher};

/// Heap shared by the writer's indexing threads.
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Clone, Copy)]
struct Fields {
    path: Field,
    title: Field,
    body: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let fields = Fields {
        path: builder.add_text_field("path", STRING | STORED),
        title: builder.add_text_field("title", TEXT | STORED),
        body: builder.add_text_field("body", TEXT),
    };
    (builder.build(), fields)
}

pub struct FullTextSearcher {
    index: Index,
    fields: Fields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    /// Paths currently in the index, for removing directory subtrees.
    indexed: Mutex<BTreeSet<String>>,
}

impl FullTextSearcher {
    /// Open the index stored in `dir`, creating it if needed.
    ///
    /// An index that cannot be opened (corrupt, or written with another
    /// schema) is discarded and recreated; it is rebuilt at startup anyway.
    pub fn open(dir: &Path) -> Result<Self, SearchError> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();
        let index = match Index::open_or_create(MmapDirectory::open(dir)?, schema.clone()) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Discarding unreadable search index");
                std::fs::remove_dir_all(dir)?;
                std::fs::create_dir_all(dir)?;
                Index::open_or_create(MmapDirectory::open(dir)?, schema)?
            }
        };
        Self::with_index(index, fields)
    }

    /// Index held entirely in memory.
    pub fn in_memory() -> Result<Self, SearchError> {
        let (schema, fields) = build_schema();
        Self::with_index(Index::create_in_ram(schema), fields)
    }

    fn with_index(index: Index, fields: Fields) -> Result<Self, SearchError> {
        let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader,
            indexed: Mutex::new(BTreeSet::new()),
        })
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.indexed.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole index with the current visible text files.
    pub fn rebuild(&self, ctx: &SearchContext) -> Result<usize, SearchError> {
        let items = ctx.file_items();
        let mut writer = self.writer.lock().unwrap();
        let mut indexed = self.indexed.lock().unwrap();
        writer.delete_all_documents()?;
        indexed.clear();
        for item in &items {
            self.add(&writer, &mut indexed, item)?;
        }
        self.commit(&mut writer)?;
        Ok(items.len())
    }

    /// Bring the index in line with a batch of change events.
    pub fn apply(&self, ctx: &SearchContext, events: &[ChangeEvent]) -> Result<(), SearchError> {
        let mut writer = self.writer.lock().unwrap();
        let mut indexed = self.indexed.lock().unwrap();
        for event in events {
            let path = event.path.as_str();
            let gone = event.kind == ChangeKind::Removed || !ctx.ignore.is_visible(path);
            if is_dir_path(path) {
                if gone {
                    self.remove_subtree(&writer, &mut indexed, path);
                } else if event.kind == ChangeKind::Created {
                    // Children of a moved-in directory arrive without events
                    let children: Vec<String> = ctx
                        .visible_paths()
                        .into_iter()
                        .filter(|p| p.starts_with(path) && !is_dir_path(p))
                        .collect();
                    for child in children {
                        self.refresh(ctx, &writer, &mut indexed, &child)?;
                    }
                }
            } else if gone {
                self.remove(&writer, &mut indexed, path);
            } else {
                self.refresh(ctx, &writer, &mut indexed, path)?;
            }
        }
        self.commit(&mut writer)
    }

    /// Re-read `path` from disk and index it if it is a text file.
    fn refresh(
        &self,
        ctx: &SearchContext,
        writer: &IndexWriter,
        indexed: &mut BTreeSet<String>,
        path: &str,
    ) -> Result<(), SearchError> {
        match ctx.loader.read_source(path) {
            Ok(item) if crate::context::is_searchable(&item) => self.add(writer, indexed, &item),
            Ok(_) => {
                self.remove(writer, indexed, path);
                Ok(())
            }
            Err(e) => {
                tracing::debug!(path, error = %e, "Dropping unreadable path from index");
                self.remove(writer, indexed, path);
                Ok(())
            }
        }
    }

    fn add(
        &self,
        writer: &IndexWriter,
        indexed: &mut BTreeSet<String>,
        item: &BlogItem,
    ) -> Result<(), SearchError> {
        writer.delete_term(Term::from_field_text(self.fields.path, &item.path));
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.path, &item.path);
        doc.add_text(self.fields.title, &item.meta.title);
        doc.add_text(self.fields.body, item.text());
        writer.add_document(doc)?;
        indexed.insert(item.path.clone());
        Ok(())
    }

    fn remove(&self, writer: &IndexWriter, indexed: &mut BTreeSet<String>, path: &str) {
        if indexed.remove(path) {
            writer.delete_term(Term::from_field_text(self.fields.path, path));
        }
    }

    fn remove_subtree(&self, writer: &IndexWriter, indexed: &mut BTreeSet<String>, dir: &str) {
        let children: Vec<String> = indexed
            .range(dir.to_owned()..)
            .take_while(|p| p.starts_with(dir))
            .cloned()
            .collect();
        for child in children {
            self.remove(writer, indexed, &child);
        }
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<(), SearchError> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Build the index, then follow `events` until `token` is cancelled.
    ///
    /// `events` must be subscribed before the initial build starts so that
    /// no change falls between the snapshot and the stream.
    pub fn spawn_indexer(
        self: &Arc<Self>,
        ctx: Arc<SearchContext>,
        mut events: broadcast::Receiver<ChangeEvent>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let searcher = Arc::clone(self);
        tokio::spawn(async move {
            searcher.run_blocking(&ctx, None).await;

            loop {
                let received = tokio::select! {
                    () = token.cancelled() => break,
                    received = events.recv() => received,
                };
                let mut batch = Vec::new();
                let mut lagged = false;
                match received {
                    Ok(event) => batch.push(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Search indexer lagged, rebuilding");
                        lagged = true;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                loop {
                    match events.try_recv() {
                        Ok(event) => batch.push(event),
                        Err(broadcast::error::TryRecvError::Lagged(_)) => lagged = true,
                        Err(_) => break,
                    }
                }
                searcher
                    .run_blocking(&ctx, (!lagged).then_some(batch))
                    .await;
            }
            tracing::debug!("Search indexer stopped");
        })
    }

    /// Rebuild (`None`) or apply a batch on the blocking pool, logging failures.
    async fn run_blocking(self: &Arc<Self>, ctx: &Arc<SearchContext>, batch: Option<Vec<ChangeEvent>>) {
        let searcher = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        let result = tokio::task::spawn_blocking(move || match batch {
            None => searcher.rebuild(&ctx).map(|count| {
                tracing::info!(count, "Search index built");
            }),
            Some(batch) => {
                let count = batch.len();
                searcher.apply(&ctx, &batch).map(|()| {
                    tracing::debug!(count, "Search index updated");
                })
            }
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Search index update failed"),
            Err(e) => tracing::error!(error = %e, "Search indexer task panicked"),
        }
    }
}

impl Searcher for FullTextSearcher {
    fn name(&self) -> &str {
        "fulltext"
    }

    fn brief(&self) -> &str {
        "fuzzy full-text search over titles and content"
    }

    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError> {
        if num == 0 {
            return Ok(Vec::new());
        }
        let mut parser = QueryParser::for_index(&self.index, vec![self.fields.title, self.fields.body]);
        parser.set_field_fuzzy(self.fields.title, true, 1, true);
        parser.set_field_fuzzy(self.fields.body, true, 1, true);
        let (query, errors) = parser.parse_query_lenient(keyword);
        if !errors.is_empty() {
            tracing::debug!(keyword, ?errors, "Lenient query parse dropped terms");
        }

        let searcher = self.reader.searcher();
        let mut hits = Vec::new();
        for (score, address) in searcher.search(&query, &TopDocs::with_limit(num))? {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(path) = doc.get_first(self.fields.path).and_then(|v| v.as_str()) {
                hits.push((score, path.to_owned()));
            }
        }
        hits.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(hits.into_iter().map(|(_, path)| path).collect())
    }
}
