//! Uniform wrapper over scalar / row / streaming / byte-stream / fields-only
//! output (spec §3 `Result<T>`, §9's `Iterable<Row>` translation).

use crate::field::Field;
use crate::row::Row;
use crate::{Error, Result as CoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;

/// A capability trait for row sources that are single-pass and cancel-aware
/// (spec §9). One instance per source kind (query rows, array rows, deferred
/// rows, ...) the way the teacher's blocks produce one concrete iterator type
/// per origin.
#[async_trait]
pub trait RowStream: Send {
    async fn next(&mut self) -> CoreResult<Option<Row>>;

    fn fields(&self) -> &[Field];

    /// Releases any resource backing this stream. Combined result sets call
    /// this on exhaustion of each child (spec §4.7).
    async fn close(&mut self) -> CoreResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// An in-memory `RowStream` built from an already-materialized `Vec<Row>`,
/// used by interpreters whose backend returns everything at once (e.g. the
/// `var` and `table` built-ins) and by tests.
pub struct VecRowStream {
    fields: Vec<Field>,
    rows: std::vec::IntoIter<Row>,
    closed: std::sync::atomic::AtomicBool,
}

impl VecRowStream {
    pub fn new(fields: Vec<Field>, rows: Vec<Row>) -> Self {
        Self {
            fields,
            rows: rows.into_iter(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RowStream for VecRowStream {
    async fn next(&mut self) -> CoreResult<Option<Row>> {
        Ok(self.rows.next())
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    async fn close(&mut self) -> CoreResult<()> {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// The one populated variant of a `QueryResult` (spec: "at most one variant
/// populated").
pub enum Body {
    Scalar(String),
    Row(Row),
    Stream(Box<dyn RowStream>),
    Bytes(Bytes),
    FieldsOnly,
}

/// Sum-type result wrapper. `fields()` is always derivable without consuming
/// the body; the body itself may only be taken once — a second attempt
/// raises a backend error instead of silently re-iterating (spec §3: "a
/// streaming result is single-pass").
pub struct QueryResult {
    fields: Vec<Field>,
    body: Mutex<Option<Body>>,
}

impl QueryResult {
    fn new(fields: Vec<Field>, body: Body) -> Self {
        Self {
            fields,
            body: Mutex::new(Some(body)),
        }
    }

    pub fn scalar(value: impl Into<String>) -> Self {
        Self::new(
            vec![Field::synthetic(0, 1, "string")],
            Body::Scalar(value.into()),
        )
    }

    pub fn row(row: Row) -> Self {
        let fields = row.fields().to_vec();
        Self::new(fields, Body::Row(row))
    }

    pub fn stream(stream: Box<dyn RowStream>) -> Self {
        let fields = stream.fields().to_vec();
        Self::new(fields, Body::Stream(stream))
    }

    pub fn bytes(fields: Vec<Field>, bytes: Bytes) -> Self {
        Self::new(fields, Body::Bytes(bytes))
    }

    pub fn fields_only(fields: Vec<Field>) -> Self {
        Self::new(fields.clone(), Body::FieldsOnly)
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Body::FieldsOnly)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Takes the body out exactly once; a second call is the "re-iteration"
    /// failure mode spec.md calls out.
    pub fn take_body(&self) -> CoreResult<Body> {
        self.body
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::backend("result has already been consumed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_pass_guard_rejects_second_take() {
        let qr = QueryResult::scalar("x");
        assert!(qr.take_body().is_ok());
        assert!(qr.take_body().is_err());
    }

    #[tokio::test]
    async fn vec_row_stream_yields_then_exhausts() {
        let row = Row::synthetic("string", vec![crate::value::Value::int(1)]);
        let mut stream = VecRowStream::new(row.fields().to_vec(), vec![row.clone()]);
        assert_eq!(stream.next().await.unwrap(), Some(row));
        assert_eq!(stream.next().await.unwrap(), None);
    }
}
