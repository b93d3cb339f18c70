/// Executor module - runs planned scans and modifications over a session
///
/// Structure:
/// - scan: Unopened → Connected → Executing → Streaming → Exhausted, plus Closed
/// - modify: Unopened → Prepared → Ready (per-row execute) → Closed
/// - evaluate: local predicate evaluation for conjuncts kept on the host
pub mod evaluate;
pub mod modify;
pub mod scan;

pub use evaluate::{like_pattern_match, EvalError, Evaluator};
pub use modify::{ModifyExecutor, ModifyRow, ModifyState};
pub use scan::{ScanExecutor, ScanState};
