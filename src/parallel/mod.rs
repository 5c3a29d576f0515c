//! Worker pool for CPU-bound batch work
//!
//! The pool only manages system resources and execution strategy: it knows
//! CPU cores, thread limits and channels, not what the work items are.
//! Callers decide when a batch is big enough to go parallel and pass the
//! worker count they want:
//!
//! ```rust
//! use dmarcguard::parallel::ExecutionStrategy;
//!
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
//! let strategy = ExecutionStrategy::auto(100, 4, workers);
//! let doubled = strategy.execute((0..100).collect(), |x: u32| x * 2).unwrap();
//! assert_eq!(doubled[99], 198);
//! ```

pub mod core;

pub use self::core::{ExecutionStrategy, ParallelExecutor};
