use std::io::Write;

use serde::Serialize;

use crate::{error::Result, query_plan};

/// A device returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub hostname: String,
    pub serial_number: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// Run a "match all terms" search.
///
/// 1. Plan the query (fails on an empty term list)
/// 2. Fetch scored candidates from `retrieve` with the engine query
/// 3. Keep the rows whose config contains every term
///
/// `retrieve` is expected to return rows highest score first; that order
/// is kept. Rows without a config never match.
pub fn search<S, F>(terms: &[S], retrieve: F) -> Result<Vec<ResultRow>>
where
    S: AsRef<str>,
    F: FnOnce(&str) -> Result<Vec<ResultRow>>,
{
    let plan = query_plan::plan(terms)?;
    tracing::info!(engine_query = plan.engine_query(), "searching");

    let candidates = retrieve(plan.engine_query())?;
    let total = candidates.len();

    let results: Vec<ResultRow> = candidates
        .into_iter()
        .filter(|row| row.config.as_deref().is_some_and(|c| plan.matches(c)))
        .collect();

    tracing::debug!(
        candidates = total,
        matched = results.len(),
        "post-filtered"
    );
    Ok(results)
}

const COLUMNS: [&str; 3] = ["hostname", "serial_number", "score"];

/// Write results as a padded table, or a "no results" line.
pub fn format_table(
    results: &[ResultRow],
    out: &mut impl Write,
) -> std::io::Result<()> {
    if results.is_empty() {
        return writeln!(out, "No results found");
    }

    let rows: Vec<[String; 3]> = results
        .iter()
        .map(|r| {
            [
                r.hostname.clone(),
                r.serial_number.clone(),
                format!("{:.3}", r.score),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let header = join_padded(&COLUMNS, &widths);
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(header.len()))?;
    for row in &rows {
        writeln!(out, "{}", join_padded(row, &widths))?;
    }
    Ok(())
}

fn join_padded<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell.as_ref()))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Serialize)]
struct JsonOutput<'a, S: Serialize> {
    query: &'a [S],
    result_count: usize,
    results: Vec<JsonRow<'a>>,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    rank: usize,
    hostname: &'a str,
    serial_number: &'a str,
    score: f32,
}

/// Write results as a JSON document.
pub fn format_json<S: Serialize>(
    results: &[ResultRow],
    terms: &[S],
    out: &mut impl Write,
) -> Result<()> {
    let output = JsonOutput {
        query: terms,
        result_count: results.len(),
        results: results
            .iter()
            .enumerate()
            .map(|(i, r)| JsonRow {
                rank: i + 1,
                hostname: &r.hostname,
                serial_number: &r.serial_number,
                score: r.score,
            })
            .collect(),
    };
    serde_json::to_writer(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}
