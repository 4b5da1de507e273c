// tests/common/mod.rs
pub use tokenflow_test_utils::fixtures;
pub use tokenflow_test_utils::{TestEngine, init_tracing};

use tokenflow::types::Variables;

pub fn no_vars() -> Variables {
    Variables::new()
}
