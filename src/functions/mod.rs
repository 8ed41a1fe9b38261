//! Named reduction functions injected into the pipeline.
//!
//! Reduce nodes, resample downsampling and classic conditions all look up
//! reducers by name in a `FunctionCatalog`. The catalog is owned by the caller,
//! so the set of available functions is not fixed by this crate.

pub mod reducer;
pub mod resample;

use crate::store::Point;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reduces the samples of one series to a single, possibly absent, value.
pub type ReducerFn = Arc<dyn Fn(&[Point]) -> Option<f64> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionCatalog {
    reducers: HashMap<String, ReducerFn>,
}

impl fmt::Debug for FunctionCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.reducers.keys().collect();
        names.sort();
        f.debug_struct("FunctionCatalog").field("reducers", &names).finish()
    }
}

impl FunctionCatalog {
    /// A catalog without any function.
    pub fn empty() -> Self { Self::default() }

    /// The built-in reducers: `avg` (alias `mean`), `sum`, `min`, `max`,
    /// `count`, `count_non_null`, `last`, `median`, `diff`, `diff_abs`,
    /// `percent_diff`, `percent_diff_abs`.
    pub fn with_defaults() -> Self {
        let mut catalog = Self::empty();
        catalog
            .register("avg", reducer::avg)
            .register("mean", reducer::avg)
            .register("sum", reducer::sum)
            .register("min", reducer::min)
            .register("max", reducer::max)
            .register("count", reducer::count)
            .register("count_non_null", reducer::count_non_null)
            .register("last", reducer::last)
            .register("median", reducer::median)
            .register("diff", reducer::diff)
            .register("diff_abs", reducer::diff_abs)
            .register("percent_diff", reducer::percent_diff)
            .register("percent_diff_abs", reducer::percent_diff_abs);
        catalog
    }

    /// Registers (or replaces) a reducer.
    pub fn register<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Point]) -> Option<f64> + Send + Sync + 'static,
    {
        self.reducers.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn reducer(&self, name: &str) -> Option<&ReducerFn> {
        self.reducers.get(name)
    }

    pub fn has_reducer(&self, name: &str) -> bool {
        self.reducers.contains_key(name)
    }
}
