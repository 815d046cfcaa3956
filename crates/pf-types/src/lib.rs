pub mod errors;
pub mod evaluation;
pub mod metrics;
pub mod parameter;

pub use errors::*;
pub use evaluation::*;
pub use metrics::*;
pub use parameter::*;
