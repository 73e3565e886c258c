use crate::error::{Error, Result};

/// Combinator placed between terms in a relevance-engine query.
pub const AND_TOKEN: &str = " AND ";

/// A two-stage plan for a "match all terms" search.
///
/// The relevance engine is only trusted for recall and scoring: its AND
/// behaves like OR, returning documents that contain any term. The
/// post-filter ([`QueryPlan::matches`]) decides membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    terms: Vec<String>,
    engine_query: String,
    needles: Vec<String>,
}

impl QueryPlan {
    /// Query string handed to the relevance engine.
    pub fn engine_query(&self) -> &str {
        &self.engine_query
    }

    /// The search terms, in the order given.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Post-filter: true when every term occurs in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.needles.iter().all(|needle| haystack.contains(needle.as_str()))
    }
}

/// Plan a search over `terms`.
///
/// Terms are kept byte for byte, leading indentation included. A single
/// term is used verbatim as the engine query; several are joined with
/// [`AND_TOKEN`]. An empty string is a valid term and matches every
/// document. Fails with [`Error::EmptyQuery`] when `terms` is empty.
pub fn plan<S: AsRef<str>>(terms: &[S]) -> Result<QueryPlan> {
    if terms.is_empty() {
        return Err(Error::EmptyQuery);
    }

    let terms: Vec<String> =
        terms.iter().map(|t| t.as_ref().to_string()).collect();

    let engine_query = terms.join(AND_TOKEN);
    let needles = terms.iter().map(|t| t.to_lowercase()).collect();

    Ok(QueryPlan {
        terms,
        engine_query,
        needles,
    })
}
