//! Context assembly: priority merge, dedup, formatting and the budget cap

use folio_core::SearchResult;
use std::collections::HashSet;

/// Repository hits first, then portfolio, then resume
pub fn merge_prioritized(
    repo: Vec<SearchResult>,
    portfolio: Vec<SearchResult>,
    resume: Vec<SearchResult>,
) -> Vec<SearchResult> {
    let mut merged = repo;
    merged.extend(portfolio);
    merged.extend(resume);
    merged
}

/// Keep the first result for each trimmed text, dropping blank ones
pub fn dedup_by_text(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| {
            let text = r.text.trim();
            !text.is_empty() && seen.insert(text.to_string())
        })
        .collect()
}

/// `[<source>]\n<text>`
pub fn format_result(result: &SearchResult) -> String {
    format!("[{}]\n{}", result.source, result.text.trim())
}

/// Longest prefix whose total character count fits in `budget`
///
/// The first string that would overflow ends the sequence; later, shorter
/// strings are not considered.
pub fn cap_to_budget(formatted: Vec<String>, budget: usize) -> Vec<String> {
    let mut total = 0;
    let mut capped = Vec::new();
    for chunk in formatted {
        let len = chunk.chars().count();
        if total + len > budget {
            break;
        }
        total += len;
        capped.push(chunk);
    }
    capped
}

/// Merge, dedup, format and cap in one pass
pub fn assemble(
    repo: Vec<SearchResult>,
    portfolio: Vec<SearchResult>,
    resume: Vec<SearchResult>,
    budget: usize,
) -> Vec<String> {
    let merged = dedup_by_text(merge_prioritized(repo, portfolio, resume));
    cap_to_budget(merged.iter().map(format_result).collect(), budget)
}

/// Distinct source labels of formatted context strings, in order
pub fn context_sources(context: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    context
        .iter()
        .filter_map(|c| c.strip_prefix('[')?.split_once("]\n").map(|(s, _)| s))
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}
