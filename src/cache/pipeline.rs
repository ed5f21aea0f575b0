//! Result processing pipeline
//!
//! An ordered chain of stages applied to query results, e.g. sort by a
//! numeric tag, newest first, then keep the top ten.

use crate::tagset::{Tagset, TagsetComparator, TagsetResult};

/// One processing step
#[derive(Debug, Clone)]
pub enum Stage {
    /// Sort by tagset
    Sort(TagsetComparator),
    /// Reverse the current order
    Reverse,
    /// Drop the first `n` items
    Skip(usize),
    /// Keep at most `n` items
    Limit(usize),
}

/// Ordered chain of stages
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append any stage
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn sort(self, comparator: TagsetComparator) -> Self {
        self.stage(Stage::Sort(comparator))
    }

    pub fn reverse(self) -> Self {
        self.stage(Stage::Reverse)
    }

    pub fn skip(self, n: usize) -> Self {
        self.stage(Stage::Skip(n))
    }

    pub fn limit(self, n: usize) -> Self {
        self.stage(Stage::Limit(n))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order
    pub fn apply<T, F>(&self, mut items: Vec<T>, tagset_of: F) -> TagsetResult<Vec<T>>
    where
        F: Fn(&T) -> &Tagset,
    {
        for stage in &self.stages {
            match stage {
                Stage::Sort(comparator) => comparator.sort_by_tagset(&mut items, &tagset_of)?,
                Stage::Reverse => items.reverse(),
                Stage::Skip(n) => {
                    items.drain(..(*n).min(items.len()));
                }
                Stage::Limit(n) => items.truncate(*n),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagset::TagsetError;

    fn tagsets(texts: &[&str]) -> Vec<Tagset> {
        texts.iter().map(|t| Tagset::parse(t).unwrap()).collect()
    }

    fn render(items: &[Tagset]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let items = tagsets(&["b=1", "a=1"]);
        let out = Pipeline::new().apply(items.clone(), |t| t).unwrap();
        assert_eq!(out, items);
    }

    #[test]
    fn test_sort_skip_limit() {
        let pipeline = Pipeline::new()
            .sort(TagsetComparator::by_names(["run"]).numeric("run"))
            .reverse()
            .skip(1)
            .limit(2);
        assert_eq!(pipeline.stages().len(), 4);

        let items = tagsets(&["run=3", "run=10", "run=1", "run=7"]);
        let out = pipeline.apply(items, |t| t).unwrap();
        assert_eq!(render(&out), vec!["run=7", "run=3"]);
    }

    #[test]
    fn test_skip_past_end() {
        let out = Pipeline::new()
            .skip(5)
            .apply(tagsets(&["a", "b"]), |t| t)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_sort_error_propagates() {
        let pipeline = Pipeline::new().sort(TagsetComparator::by_names(["n"]).numeric("n"));
        let err = pipeline.apply(tagsets(&["n=1", "n=x"]), |t| t).unwrap_err();
        assert!(matches!(err, TagsetError::NumberFormat { .. }));
    }
}
