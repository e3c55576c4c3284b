/*!
 * Monitoring
 * Tracing bootstrap and structured operation spans
 */

mod tracer;

pub use tracer::{init_tracing, span_operation, OperationSpan};
