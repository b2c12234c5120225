use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct CanonicalColumns {
    positions: HashMap<String, usize>,
}

impl CanonicalColumns {
    // A repeated name resolves to its first column.
    pub fn from_header(header: &[String]) -> Self {
        let mut positions = HashMap::with_capacity(header.len());
        for (index, name) in header.iter().enumerate() {
            positions.entry(name.clone()).or_insert(index);
        }
        Self { positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedColumn {
    pub source_index: usize,
    pub source_name: String,
    pub target_index: usize,
    pub target_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    columns: Vec<MappedColumn>,
    by_source: BTreeMap<usize, usize>,
}

impl PositionMap {
    pub fn derive(
        canonical: &CanonicalColumns,
        source_header: &[String],
        correspondence: &BTreeMap<String, String>,
    ) -> Self {
        let mut map = Self::default();
        for (source_index, source_name) in source_header.iter().enumerate() {
            let Some(target_name) = correspondence.get(source_name) else {
                continue;
            };
            let Some(target_index) = canonical.position(target_name) else {
                continue;
            };
            map.by_source.insert(source_index, target_index);
            map.columns.push(MappedColumn {
                source_index,
                source_name: source_name.clone(),
                target_index,
                target_name: target_name.clone(),
            });
        }
        map
    }

    pub fn target_of(&self, source_index: usize) -> Option<usize> {
        self.by_source.get(&source_index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.by_source
            .iter()
            .map(|(source, target)| (*source, *target))
    }

    pub fn columns(&self) -> &[MappedColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn max_target(&self) -> Option<usize> {
        self.by_source.values().copied().max()
    }
}

pub fn merge_width<'a>(maps: impl IntoIterator<Item = &'a PositionMap>) -> usize {
    maps.into_iter()
        .filter_map(PositionMap::max_target)
        .max()
        .map_or(0, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn correspondence(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }

    #[test]
    fn maps_only_declared_and_existing_columns() {
        let canonical = CanonicalColumns::from_header(&names(&["Name", "Email", "Phone"]));
        let source = names(&["full_name", "mail", "fax", "cell"]);
        let declared = correspondence(&[
            ("full_name", "Name"),
            ("mail", "Email"),
            ("cell", "Mobile"),
            ("absent", "Phone"),
        ]);

        let map = PositionMap::derive(&canonical, &source, &declared);

        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
        assert_eq!(map.target_of(2), None);
        assert_eq!(map.target_of(3), None);
        assert_eq!(map.max_target(), Some(1));
    }

    #[test]
    fn every_target_index_is_inside_the_header() {
        let header = names(&["A", "B", "C"]);
        let canonical = CanonicalColumns::from_header(&header);
        let source = names(&["x", "y", "z"]);
        let declared = correspondence(&[("x", "C"), ("y", "A"), ("z", "Q")]);

        let map = PositionMap::derive(&canonical, &source, &declared);

        assert!(map.iter().all(|(_, target)| target < header.len()));
        assert_eq!(map.columns()[0].target_name, "C");
    }

    #[test]
    fn derivation_is_deterministic() {
        let canonical = CanonicalColumns::from_header(&names(&["Name", "Email"]));
        let source = names(&["mail", "name"]);
        let declared = correspondence(&[("name", "Name"), ("mail", "Email")]);

        let first = PositionMap::derive(&canonical, &source, &declared);
        let second = PositionMap::derive(&canonical, &source, &declared);
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_canonical_names_resolve_to_first_column() {
        let canonical = CanonicalColumns::from_header(&names(&["Id", "Note", "Note"]));
        assert_eq!(canonical.position("Note"), Some(1));
    }

    #[test]
    fn merge_width_covers_highest_column() {
        let canonical = CanonicalColumns::from_header(&names(&["A", "B", "C", "D"]));
        let first = PositionMap::derive(
            &canonical,
            &names(&["a"]),
            &correspondence(&[("a", "B")]),
        );
        let second = PositionMap::derive(
            &canonical,
            &names(&["d"]),
            &correspondence(&[("d", "D")]),
        );
        assert_eq!(merge_width([&first, &second]), 4);
        assert_eq!(merge_width([&PositionMap::default()]), 0);
    }
}
