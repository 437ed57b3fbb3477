//! Shared helpers: probability arithmetic, collection transforms and the
//! resumable bulk driver.

pub mod collections;
pub mod exec;
pub mod prob;

pub use collections::{freq, infer_arcs, invert_multimap, invert_seq, sort_v, split_asc, FxIndexMap};
pub use exec::{exec_unique, pending_unique, BoxError, BulkExecutor, ExecError, PoolExecutor, SerialExecutor, PROGRESS_STEPS};
pub use prob::{
    f1_score, geo_prog_range, int_unique, iterconverge, power_law_fit, union_ind, ConvergenceError, CONVERGE_INIT,
    CONVERGE_MAXSTEPS,
};
