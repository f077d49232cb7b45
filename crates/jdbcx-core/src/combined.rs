//! Presents a sequence of downstream cursors as one forward-only cursor
//! (spec §4.7). Grounded on the teacher's `CachedMetadataConnection`
//! decorator-over-trait-object style and on `rsql_driver::QueryResult`'s
//! `async fn next(&mut self) -> Option<&Row>` cursor shape (other_examples
//! file `theseus-rs-rsql__rsql_driver-src-connection.rs`).

use crate::error::{Error, Result, Warning};
use crate::field::Field;
use crate::result::RowStream;
use crate::row::Row;
use std::collections::VecDeque;

pub struct CombinedResultSet {
    children: Vec<Box<dyn RowStream>>,
    current: usize,
    metadata: Vec<Field>,
    first_error: Option<Error>,
    warnings: VecDeque<Warning>,
}

impl CombinedResultSet {
    /// Before the first `next()`, metadata comes from the first child (or is
    /// empty if there are no children at all).
    pub fn new(children: Vec<Box<dyn RowStream>>) -> Self {
        Self::with_warnings(children, Vec::new())
    }

    /// Same as [`Self::new`], but chains `warnings` onto the cursor in order
    /// (spec §7: `getNextWarning()`-style linked list).
    pub fn with_warnings(children: Vec<Box<dyn RowStream>>, warnings: Vec<Warning>) -> Self {
        let metadata = children.first().map(|c| c.fields().to_vec()).unwrap_or_default();
        Self {
            children,
            current: 0,
            metadata,
            first_error: None,
            warnings: warnings.into(),
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.metadata
    }

    /// Advances the current child; on exhaustion closes it, advances to the
    /// next (recomputing metadata if its shape differs), and recurses.
    /// Returns `None` only once every child is exhausted.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.current >= self.children.len() {
                return Ok(None);
            }
            match self.children[self.current].next().await? {
                Some(row) => return Ok(Some(row)),
                None => {
                    let _ = self.children[self.current].close().await;
                    self.current += 1;
                    if self.current < self.children.len() {
                        self.metadata = self.children[self.current].fields().to_vec();
                    }
                }
            }
        }
    }

    /// Closes every still-open child. Per-child errors are swallowed after
    /// the first, which is retained via [`Self::take_first_error`].
    pub async fn close(&mut self) {
        for child in self.children.iter_mut() {
            if child.is_closed() {
                continue;
            }
            if let Err(e) = child.close().await {
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }

    pub fn take_first_error(&mut self) -> Option<Error> {
        self.first_error.take()
    }

    pub fn is_closed(&self, index: usize) -> bool {
        self.children.get(index).map(|c| c.is_closed()).unwrap_or(true)
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Pops the oldest chained warning (spec §7's `getNextWarning()`); `None`
    /// once the chain is drained.
    pub fn next_warning(&mut self) -> Option<Warning> {
        self.warnings.pop_front()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::VecRowStream;
    use crate::value::Value;

    fn stream(values: Vec<i64>) -> Box<dyn RowStream> {
        let rows: Vec<Row> = values
            .into_iter()
            .map(|v| Row::synthetic("int", vec![Value::int(v)]))
            .collect();
        let fields = rows.first().map(|r| r.fields().to_vec()).unwrap_or_default();
        Box::new(VecRowStream::new(fields, rows))
    }

    #[tokio::test]
    async fn concatenates_children_in_order() {
        let mut combined = CombinedResultSet::new(vec![stream(vec![1, 2]), stream(vec![3])]);
        let mut seen = Vec::new();
        while let Some(row) = combined.next().await.unwrap() {
            seen.push(row.value(0).as_int());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn exhausted_children_are_closed_as_we_advance() {
        let mut combined = CombinedResultSet::new(vec![stream(vec![1]), stream(vec![2])]);
        assert!(!combined.is_closed(0));
        while combined.next().await.unwrap().is_some() {}
        assert!(combined.is_closed(0));
        assert!(combined.is_closed(1));
    }

    #[tokio::test]
    async fn close_marks_every_child_closed_even_if_partially_consumed() {
        let mut combined = CombinedResultSet::new(vec![stream(vec![1, 2]), stream(vec![3, 4])]);
        combined.next().await.unwrap();
        combined.close().await;
        assert!(combined.is_closed(0));
        assert!(combined.is_closed(1));
    }

    #[tokio::test]
    async fn zero_children_yields_empty_cursor_with_synthetic_metadata() {
        let mut combined = CombinedResultSet::new(Vec::new());
        assert!(combined.fields().is_empty());
        assert_eq!(combined.next().await.unwrap(), None);
    }

    #[test]
    fn warnings_chain_in_order_and_drain() {
        use crate::error::ErrorKind;

        let mut combined = CombinedResultSet::with_warnings(
            Vec::new(),
            vec![
                Warning::new(ErrorKind::Backend, "first"),
                Warning::new(ErrorKind::Timeout, "second"),
            ],
        );
        assert_eq!(combined.next_warning().unwrap().message, "first");
        assert_eq!(combined.next_warning().unwrap().message, "second");
        assert!(combined.next_warning().is_none());
    }
}
