//! Esperar: a wait-expression engine with immutable condition chains,
//! deadline-aware executions, and debounced change observation.
//!
//! Esperar (Spanish: "to wait") evaluates *wait expressions*: chains of
//! condition/transform steps over a generic observed tree. A chain is built
//! fluently, never mutated, and runs as an execution that re-checks the
//! whole chain whenever one of its observed scopes reports a change or one
//! of its deadlines lapses, fulfilling exactly once with the final value or
//! a composed error.
//!
//! # Architecture
//!
//! ```text
//!   Waiter ──builds──► Expression chain (immutable, back-linked)
//!     │                      │ prepare / execute
//!     │                      ▼
//!     │                 Execution ◄─── deadline timers
//!     │                      │ pending on scope X
//!     ▼                      ▼
//!   ScopeBinding ──► ScopeObservers (per-scope, coalesced re-checks)
//! ```
//!
//! The subject model is pluggable: implement [`Subject`] and [`Scope`] for
//! your tree's handles, implement [`Step`] for steps that query it, and
//! implement [`ScopeBinding`] to feed real change signals in.
//!
//! # Example
//!
//! ```no_run
//! use esperar::{Chainable, Waiter};
//! use std::time::Duration;
//!
//! # #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! # struct Doc(u32);
//! # impl esperar::Scope for Doc {}
//! # #[derive(Debug, Clone)]
//! # struct Node(Doc);
//! # impl esperar::Subject for Node {
//! #     type Scope = Doc;
//! #     fn scope(&self) -> Doc {
//! #         self.0.clone()
//! #     }
//! # }
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let waiter: Waiter<Node> = Waiter::new();
//! let found = waiter
//!     .target_with("query nodes", || Ok(esperar::Value::None))
//!     .timeout(Duration::from_secs(5))
//!     .first()
//!     .execute()
//!     .await?;
//! # let _ = found;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod binding;
pub mod builder;
pub mod clock;
pub mod engine;
pub mod execution;
pub mod expression;
mod observer;
pub mod outcome;
pub mod result;
pub mod step;
pub mod steps;
pub mod subject;
mod sync;
#[cfg(test)]
mod testutil;
pub mod timer;
pub mod value;

pub use binding::{ChangeSink, NullBinding, ScopeBinding};
pub use builder::Chainable;
pub use clock::{Clock, MockClock, SystemClock};
pub use engine::{WaitHooks, Waiter, WaiterBuilder, WaiterConfig, DEFAULT_TIMEOUT};
pub use execution::{Execution, OutcomeHandle};
pub use expression::{Expression, StartTimeOverride};
pub use outcome::{format_seconds, Failure, Outcome, Reason, ReasonFragment, StepError};
pub use result::{TimeoutError, WaitError, WaitResult};
pub use step::{Step, StepMeta};
pub use steps::{
    describe_label, quote_label, AmountStep, DelayStep, FilterStep, FirstStep, NoopStep,
    TargetStep,
};
pub use subject::{Scope, Subject};
pub use timer::{BackendCallback, ManualBackend, Timer, TimerBackend, TimerId, TokioBackend};
pub use value::Value;
