//! Execution sandbox: certifies data-access requests and bounds their run time.
//!
//! This is a classification layer, not OS-level isolation. Queries are
//! screened against a keyword/pattern blacklist and expressions against a
//! closed grammar with an allow-listed set of builtins.

pub mod execution;
pub mod expr;
pub mod policy;

pub use execution::{ExecutionSandbox, SandboxResult};
pub use policy::{PolicyVerdict, MUTATING_KEYWORDS, SUSPICIOUS_PATTERNS};
