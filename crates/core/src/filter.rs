//! Client-side search over decoded records.

use crate::models::{Entity, Record};

/// Records whose name contains `query`, ignoring case.
///
/// The query is trimmed first; an empty query keeps every record. Source
/// order is preserved.
pub fn filter_by_name<'a, T: Entity>(records: &'a [Record<T>], query: &str) -> Vec<&'a Record<T>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|record| record.data.name().to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, Platform};

    fn games(names: &[&str]) -> Vec<Record<Game>> {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                Record::new(
                    format!("g{idx}").as_str(),
                    Game {
                        name: name.to_string(),
                        ..Game::default()
                    },
                )
            })
            .collect()
    }

    fn names<T: Entity>(records: &[&Record<T>]) -> Vec<String> {
        records
            .iter()
            .map(|record| record.data.name().to_string())
            .collect()
    }

    #[test]
    fn matches_case_insensitive_substrings_in_order() {
        let catalog = games(&["Chess", "Checkers", "Go"]);
        assert_eq!(names(&filter_by_name(&catalog, "ch")), ["Chess", "Checkers"]);
        assert_eq!(names(&filter_by_name(&catalog, "CKER")), ["Checkers"]);
        assert!(filter_by_name(&catalog, "zelda").is_empty());
    }

    #[test]
    fn empty_query_is_identity() {
        let catalog = games(&["Chess", "Checkers", "Go"]);
        assert_eq!(filter_by_name(&catalog, "").len(), 3);
        assert_eq!(names(&filter_by_name(&catalog, "   ")), ["Chess", "Checkers", "Go"]);
    }

    #[test]
    fn works_for_any_entity() {
        let platforms = vec![
            Record::new("p1", Platform::new("PlayStation 5")),
            Record::new("p2", Platform::new("Switch")),
        ];
        assert_eq!(names(&filter_by_name(&platforms, "station")), ["PlayStation 5"]);
    }
}
