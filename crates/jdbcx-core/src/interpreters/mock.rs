//! Test-only mock interpreter. Grounded on `rsql_driver::MockConnection`'s
//! expectation-queue builder pattern (other_examples file
//! `theseus-rs-rsql__rsql_driver-src-connection.rs`): register canned
//! responses up front, then consume them in call order, so the query
//! builder and combined result set are exercised end to end without a
//! live database.

use super::{Interpreter, InvocationContext};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use jdbcx_templates::PropertyBag;
use std::sync::Mutex;

enum Expectation {
    Scalar(String),
    Failure(String),
}

pub struct MockInterpreter {
    expectations: Mutex<Vec<Expectation>>,
}

impl MockInterpreter {
    pub fn new() -> Self {
        Self {
            expectations: Mutex::new(Vec::new()),
        }
    }

    pub fn expect_scalar(self, value: impl Into<String>) -> Self {
        self.expectations.lock().unwrap().push(Expectation::Scalar(value.into()));
        self
    }

    pub fn expect_failure(self, message: impl Into<String>) -> Self {
        self.expectations.lock().unwrap().push(Expectation::Failure(message.into()));
        self
    }

    /// Expectations never consumed — call at the end of a test to catch
    /// over-mocking the way `MockConnection`'s drop check does.
    pub fn remaining(&self) -> usize {
        self.expectations.lock().unwrap().len()
    }
}

impl Default for MockInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interpreter for MockInterpreter {
    async fn interpret(&self, content: &str, _props: &PropertyBag, _ctx: &InvocationContext<'_>) -> Result<QueryResult> {
        let next = {
            let mut expectations = self.expectations.lock().unwrap();
            if expectations.is_empty() {
                None
            } else {
                Some(expectations.remove(0))
            }
        };
        match next {
            Some(Expectation::Scalar(value)) => Ok(QueryResult::scalar(value)),
            Some(Expectation::Failure(message)) => Err(Error::backend(message)),
            None => Err(Error::backend(format!("MockInterpreter: unexpected call with content: {content}"))),
        }
    }

    fn substitutes_content(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::connection::ConnectionManager;
    use jdbcx_templates::{TagStyle, VariableStore};

    #[tokio::test]
    async fn consumes_expectations_in_order() {
        let mock = MockInterpreter::new().expect_scalar("one").expect_scalar("two");
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = std::collections::BTreeMap::new();
        let ctx = InvocationContext {
            store: &store,
            bag: &bag,
            tag: TagStyle::Brace,
            cancel: CancellationToken::new(),
            manager: &manager,
            headers: &headers,
        };

        let first = mock.interpret("ignored", &bag, &ctx).await.unwrap();
        match first.take_body().unwrap() {
            crate::result::Body::Scalar(s) => assert_eq!(s, "one"),
            _ => panic!("expected scalar"),
        }
        let second = mock.interpret("ignored", &bag, &ctx).await.unwrap();
        match second.take_body().unwrap() {
            crate::result::Body::Scalar(s) => assert_eq!(s, "two"),
            _ => panic!("expected scalar"),
        }
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn surfaces_queued_failure() {
        let mock = MockInterpreter::new().expect_failure("simulated backend error");
        let store = VariableStore::new();
        let bag = PropertyBag::new();
        let manager = ConnectionManager::new();
        let headers = std::collections::BTreeMap::new();
        let ctx = InvocationContext {
            store: &store,
            bag: &bag,
            tag: TagStyle::Brace,
            cancel: CancellationToken::new(),
            manager: &manager,
            headers: &headers,
        };
        let err = mock.interpret("ignored", &bag, &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "simulated backend error");
    }
}
