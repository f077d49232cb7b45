//! Core runtime for the polyglot query gateway.
//!
//! Parses multi-dialect query text into executable blocks ([`parser`]),
//! expands the cartesian product of variable-scoped blocks into concrete
//! statements ([`builder`]), dispatches each statement to the extension
//! registered for its block type ([`interpreters`]), and stitches the
//! per-statement results back into one forward-only cursor
//! ([`combined`]). [`facade`] wires the pipeline into the
//! connection/statement/result-set shape downstream callers (the CLI, or a
//! future JDBC-style client) expect.

pub mod builder;
pub mod cancel;
pub mod combined;
pub mod connection;
pub mod error;
pub mod facade;
pub mod field;
pub mod interpreters;
pub mod options;
pub mod parser;
pub mod result;
pub mod row;
pub mod value;

pub use error::{Error, ErrorKind, Result, Warning};
pub use field::Field;
pub use row::Row;
pub use value::{Charset, Value};

pub use builder::build_statements;
pub use cancel::CancellationToken;
pub use combined::CombinedResultSet;
pub use connection::{ConnectionManager, DownstreamConnection};
pub use facade::{Connection, QueryContext, Statement};
pub use interpreters::{invoke_with_policy, Interpreter, InvocationContext};
pub use options::{OptionDescriptor, OptionRegistry};
pub use parser::{parse, ExecutableBlock, ParsedQuery};
pub use result::{Body, QueryResult, RowStream, VecRowStream};

pub use jdbcx_templates::{PropertyBag, Scope, TagStyle, VariableStore};
