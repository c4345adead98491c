//! Batch compilation of independent modules on a thread pool.
//!
//! Every module gets its own transpiler and compiler, so nothing is shared
//! between workers beyond the read-only options.

use crate::ast::Program;
use crate::{CompileOptions, CompileOutput, Error, Result, compile};
use rayon::prelude::*;

/// Compiles modules on a dedicated thread pool.
pub struct ParallelCompiler {
    /// Thread pool for CPU-bound work
    pool: rayon::ThreadPool,
    options: CompileOptions,
}

impl ParallelCompiler {
    /// Creates a compiler with the default number of threads.
    pub fn new(options: CompileOptions) -> Result<Self> {
        Self::build(rayon::ThreadPoolBuilder::new(), options)
    }

    /// Creates a compiler with a specific number of threads.
    pub fn with_threads(num_threads: usize, options: CompileOptions) -> Result<Self> {
        Self::build(
            rayon::ThreadPoolBuilder::new().num_threads(num_threads),
            options,
        )
    }

    fn build(builder: rayon::ThreadPoolBuilder, options: CompileOptions) -> Result<Self> {
        let pool = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to create thread pool: {}", e)))?;
        Ok(Self { pool, options })
    }

    /// Compiles every module, keeping input order.
    pub fn compile_all(&self, programs: &[Program]) -> Vec<Result<CompileOutput>> {
        tracing::debug!(
            "compiling {} modules on {} threads",
            programs.len(),
            self.pool.current_num_threads()
        );
        self.pool
            .install(|| compile_parallel(programs, &self.options))
    }
}

/// Compiles every module on the global pool, keeping input order.
pub fn compile_parallel(programs: &[Program], options: &CompileOptions) -> Vec<Result<CompileOutput>> {
    programs
        .par_iter()
        .map(|program| compile(program, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::Type;

    #[test]
    fn test_results_keep_input_order() {
        let good = program(vec![let_("x", Some(Type::Number), Some(num(1)))]);
        let bad = program(vec![expr_stmt(ident("missing"))]);
        let results = compile_parallel(
            &[good.clone(), bad, good],
            &CompileOptions::default(),
        );
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Diagnostics(_))));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_dedicated_pool_matches_sequential() {
        let module = program(vec![let_("s", Some(Type::String), Some(string("abc")))]);
        let options = CompileOptions::default();
        let sequential = compile(&module, &options).unwrap();
        let pool = ParallelCompiler::with_threads(2, options).unwrap();
        let parallel = pool.compile_all(std::slice::from_ref(&module));
        assert_eq!(parallel[0].as_ref().unwrap().script, sequential.script);
    }
}
