//! Deterministic expression language for exercising the tagforge runtime.
//!
//! Supports dotted property paths over map values (`#{bean.name}`), string and
//! number literals, prefixed function calls (`#{fn:upper(item.name)}`) and text
//! with several embedded expressions. Callbacks are plain closures wrapped in
//! [`FnMethod`]. Every factory operation is counted so tests can assert how
//! often coercion and compilation happened.

mod context;
mod eval;
mod factory;
mod method;

pub use context::MockContext;
pub use factory::MockExpressionFactory;
pub use method::FnMethod;
