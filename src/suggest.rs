use similar::TextDiff;

use crate::position::PositionMap;
use crate::table::TargetTable;

#[derive(Debug, Clone, Copy)]
pub struct SuggestOptions {
    pub limit: usize,
    // Below this, a candidate needs the query characters in order.
    pub min_score: f32,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub row: usize,
    pub value: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SuggestionSet {
    pub source_column: usize,
    pub target_column: usize,
    pub query: String,
    pub suggestions: Vec<Suggestion>,
}

pub fn similarity(query: &str, candidate: &str) -> f32 {
    let query = query.trim().to_lowercase();
    let candidate = candidate.trim().to_lowercase();
    TextDiff::from_chars(query.as_str(), candidate.as_str()).ratio()
}

fn contains_in_order(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle.chars().all(|wanted| remaining.any(|c| c == wanted))
}

pub fn rank<'a, I>(query: &str, candidates: I, options: &SuggestOptions) -> Vec<Suggestion>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || options.limit == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<Suggestion> = candidates
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .filter_map(|(row, value)| {
            let score = similarity(query, value);
            let in_order = contains_in_order(&needle, &value.trim().to_lowercase());
            (in_order || score >= options.min_score).then(|| Suggestion {
                row,
                value: value.to_string(),
                score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
    ranked.truncate(options.limit);
    ranked
}

pub fn for_row(
    table: &TargetTable,
    source_row: &[String],
    fuzzy: &PositionMap,
    options: &SuggestOptions,
) -> Vec<SuggestionSet> {
    fuzzy
        .iter()
        .map(|(source_column, target_column)| {
            let query = source_row
                .get(source_column)
                .cloned()
                .unwrap_or_default();
            let candidates = table
                .data_rows()
                .map(|(row, _)| (row, table.field(row, target_column)));
            let suggestions = rank(&query, candidates, options);
            SuggestionSet {
                source_column,
                target_column,
                query,
                suggestions,
            }
        })
        .collect()
}
