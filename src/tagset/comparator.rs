//! Tagset ordering
//!
//! Orders tagsets lexicographically over a list of tag names. For each name
//! a missing tag sorts first, then the empty string, then any other value in
//! natural string order. Names declared numeric are compared as `f64`; a
//! value that does not parse is reported as an error rather than silently
//! compared as text.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use crate::tagset::error::{TagsetError, TagsetResult};
use crate::tagset::types::Tagset;

/// Configurable tagset comparator
#[derive(Debug, Clone, Default)]
pub struct TagsetComparator {
    /// Names to compare, in priority order; `None` = every name present
    names: Option<Vec<String>>,
    /// Names whose values compare as numbers
    numeric: HashSet<String>,
    descending: bool,
}

/// Sort key for one value of one name
#[derive(Debug, Clone)]
enum KeyValue {
    Absent,
    Number(f64),
    Text(String),
}

impl KeyValue {
    fn rank(&self) -> u8 {
        match self {
            KeyValue::Absent => 0,
            KeyValue::Number(_) => 1,
            KeyValue::Text(_) => 2,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Number(a), KeyValue::Number(b)) => a.total_cmp(b),
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

type SortKey = Vec<Vec<KeyValue>>;

impl TagsetComparator {
    /// Compare every name present, ascending
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare only these names, in this order
    pub fn by_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Builder: compare values of `name` as numbers
    pub fn numeric(mut self, name: impl Into<String>) -> Self {
        self.numeric.insert(name.into());
        self
    }

    /// Builder: sort descending
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Builder: flip the current direction
    pub fn reversed(mut self) -> Self {
        self.descending = !self.descending;
        self
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Compare two tagsets
    pub fn compare(&self, a: &Tagset, b: &Tagset) -> TagsetResult<Ordering> {
        let names = self.names_for([a, b]);
        let ka = self.sort_key(a, &names)?;
        let kb = self.sort_key(b, &names)?;
        Ok(self.direct(ka.cmp(&kb)))
    }

    /// Sort tagsets in place
    pub fn sort(&self, tagsets: &mut [Tagset]) -> TagsetResult<()> {
        self.sort_by_tagset(tagsets, |t| t)
    }

    /// Sort arbitrary items by the tagset each one carries
    ///
    /// All keys are computed up front, so a format error leaves `items`
    /// untouched.
    pub fn sort_by_tagset<T, F>(&self, items: &mut [T], tagset_of: F) -> TagsetResult<()>
    where
        F: Fn(&T) -> &Tagset,
    {
        let names = self.names_for(items.iter().map(&tagset_of));
        let keys = items
            .iter()
            .map(|item| self.sort_key(tagset_of(item), &names))
            .collect::<TagsetResult<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&i, &j| self.direct(keys[i].cmp(&keys[j])));
        apply_permutation(items, order);
        Ok(())
    }

    fn direct(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }

    fn names_for<'a, I>(&self, tagsets: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Tagset>,
    {
        match &self.names {
            Some(names) => names.clone(),
            None => {
                let mut all = BTreeSet::new();
                for tagset in tagsets {
                    all.extend(tagset.names().into_iter().map(str::to_string));
                }
                all.into_iter().collect()
            }
        }
    }

    fn sort_key(&self, tagset: &Tagset, names: &[String]) -> TagsetResult<SortKey> {
        names
            .iter()
            .map(|name| {
                let numeric = self.numeric.contains(name);
                let mut values = tagset
                    .values(name)
                    .map(|value| match value {
                        None => Ok(KeyValue::Absent),
                        Some(v) if numeric => v
                            .trim()
                            .parse::<f64>()
                            .map(KeyValue::Number)
                            .map_err(|_| TagsetError::NumberFormat {
                                name: name.clone(),
                                value: v.to_string(),
                            }),
                        Some(v) => Ok(KeyValue::Text(v.to_string())),
                    })
                    .collect::<TagsetResult<Vec<_>>>()?;
                values.sort();
                Ok(values)
            })
            .collect()
    }
}

/// Reorder `items` so that position `k` holds the item previously at `order[k]`
fn apply_permutation<T>(items: &mut [T], mut order: Vec<usize>) {
    for start in 0..order.len() {
        let mut current = start;
        while order[current] != start {
            let next = order[current];
            items.swap(current, next);
            order[current] = current;
            current = next;
        }
        order[current] = current;
    }
}
