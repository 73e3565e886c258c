use std::{collections::BTreeSet, path::Path};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::TopDocs,
    doc,
    query::{AllQuery, BooleanQuery, Occur, Query, TermQuery},
    schema::*,
    tokenizer::{LowerCaser, NgramTokenizer, TextAnalyzer, TokenStream},
};

use crate::{catalog::Device, error::Result, query_plan::AND_TOKEN};

/// Field names used in the schema.
pub mod fields {
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const SERIAL_GRAMS: &str = "serial_grams";
    pub const HOSTNAME: &str = "hostname";
    pub const CONFIG: &str = "config";
}

/// Memory budget handed to index writers.
pub const WRITER_MEMORY_BUDGET: usize = 15_000_000;

const GRAM_TOKENIZER: &str = "grams";
const MIN_GRAM: usize = 2;
const MAX_GRAM: usize = 3;

/// BM25 relevance engine over device serial numbers and configs.
///
/// Both searchable fields are split into lower-cased 2-3 character grams,
/// so a term scores against any document containing pieces of it. That
/// gives recall for substrings such as `ethernet` in `Ethernet1`, at the
/// cost of precision; callers post-filter.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    schema: Schema,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub serial_number: Field,
    pub serial_grams: Field,
    pub hostname: Field,
    pub config: Field,
}

/// A scored candidate from the index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f32,
    pub serial_number: String,
    pub hostname: String,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let serial_number =
        builder.add_text_field(fields::SERIAL_NUMBER, STRING | STORED);
    let hostname = builder.add_text_field(fields::HOSTNAME, STRING | STORED);

    let gram_indexing = TextFieldIndexing::default()
        .set_tokenizer(GRAM_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqs);

    let serial_grams = builder.add_text_field(
        fields::SERIAL_GRAMS,
        TextOptions::default().set_indexing_options(gram_indexing.clone()),
    );
    let config = builder.add_text_field(
        fields::CONFIG,
        TextOptions::default().set_indexing_options(gram_indexing),
    );

    let schema = builder.build();
    let fields = SchemaFields {
        serial_number,
        serial_grams,
        hostname,
        config,
    };

    (schema, fields)
}

fn register_tokenizers(index: &Index) -> Result<()> {
    let grams = TextAnalyzer::builder(NgramTokenizer::new(
        MIN_GRAM, MAX_GRAM, false,
    )?)
    .filter(LowerCaser)
    .build();
    index.tokenizers().register(GRAM_TOKENIZER, grams);
    Ok(())
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let (schema, _) = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                schema.clone(),
                tantivy::IndexSettings::default(),
            )?
        };

        register_tokenizers(&index)?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            schema,
        })
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let (schema, _) = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizers(&index)?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            schema,
        })
    }

    /// Get the resolved field handles.
    pub fn fields(&self) -> Result<SchemaFields> {
        let f = |name: &str| self.schema.get_field(name);
        Ok(SchemaFields {
            serial_number: f(fields::SERIAL_NUMBER)?,
            serial_grams: f(fields::SERIAL_GRAMS)?,
            hostname: f(fields::HOSTNAME)?,
            config: f(fields::CONFIG)?,
        })
    }

    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Add a device via the given writer, replacing any earlier document
    /// with the same serial number.
    pub fn add_device(
        &self,
        writer: &IndexWriter,
        device: &Device,
    ) -> Result<()> {
        let f = self.fields()?;

        let term =
            Term::from_field_text(f.serial_number, &device.serial_number);
        writer.delete_term(term);

        writer.add_document(doc!(
            f.serial_number => device.serial_number.as_str(),
            f.serial_grams => device.serial_number.as_str(),
            f.hostname => device.hostname.as_str(),
            f.config => device.config.as_deref().unwrap_or(""),
        ))?;

        Ok(())
    }

    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Score every document against an engine query.
    ///
    /// The query is a list of terms separated by [`AND_TOKEN`]. The grams of
    /// all terms are OR-combined and scored with BM25, so a document needs
    /// only one gram in common with the query to be returned. When the
    /// terms are too short to yield any gram, every document is returned
    /// with a constant score. Hits come back in descending score order.
    pub fn search(&self, engine_query: &str) -> Result<Vec<SearchHit>> {
        let f = self.fields()?;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let limit = searcher.num_docs() as usize;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = self.build_query(engine_query, &f)?;
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            hits.push(SearchHit {
                score,
                serial_number: extract_text(&doc, f.serial_number),
                hostname: extract_text(&doc, f.hostname),
            });
        }

        tracing::debug!(engine_query, hits = hits.len(), "relevance search");
        Ok(hits)
    }

    fn build_query(
        &self,
        engine_query: &str,
        f: &SchemaFields,
    ) -> Result<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for field in [f.serial_grams, f.config] {
            let mut analyzer = self.index.tokenizer_for_field(field)?;
            let mut grams = BTreeSet::new();
            for term in engine_query.split(AND_TOKEN) {
                let mut stream = analyzer.token_stream(term);
                while stream.advance() {
                    grams.insert(stream.token().text.clone());
                }
            }
            for gram in grams {
                let term = Term::from_field_text(field, &gram);
                clauses.push((
                    Occur::Should,
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
                ));
            }
        }

        if clauses.is_empty() {
            return Ok(Box::new(AllQuery));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
