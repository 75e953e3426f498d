//! This library crate contains the reusable parts of `mk`, a Make-like
//! build tool and task runner.
//!
//! # Pipeline
//!
//! A build goes through four stages, each its own module:
//!
//! - **Rule model** ([`model`])
//!
//!   [`Rule`][model::Rule], [`Target`][model::Target] and
//!   [`Dependency`][model::Dependency] describe what to build and what it
//!   depends on. A [`RuleSet`][model::RuleSet] is a validated, de-duplicated
//!   collection of rules, however they were declared: by hand through the
//!   builder API, or parsed by [`loader`] from a `Mkfile.toml`.
//!
//! - **Graph** ([`graph`])
//!
//!   [`Graph::build`][graph::Graph::build] walks the transitive closure of a
//!   requested target, detecting cycles and unresolved references, and
//!   produces a leaves-first topological order.
//!
//! - **Freshness** ([`freshness`])
//!
//!   [`freshness::evaluate`] decides, for every rule in the graph, whether
//!   it's outdated, by comparing `mtime`s (see [`mtime`]) and invoking any
//!   [`Predicate`][callable::Predicate] dependencies exactly once.
//!
//! - **Queue and executor** ([`queue`], [`executor`])
//!
//!   [`queue::BuildQueue`] tracks per-rule state and dispatch order;
//!   [`executor::execute`] drains it with a pool of worker threads, honoring
//!   fail-fast and parallel-safety, and reports progress through a
//!   [`Reporter`][reporter::Reporter].
//!
//! # Utilities
//!
//! - **Error handling**
//!
//!   [`error::MkError`] unifies the error types the pipeline stages produce,
//!   with an [`exit_code`][error::MkError::exit_code] matching the CLI's
//!   contract. [`error::ErrorWithLocation`] additionally tags an error with
//!   the file and line it came from, for the loader's diagnostics.
//!
//! - **User-supplied in-process code**
//!
//!   [`callable`] defines the [`Predicate`][callable::Predicate] and
//!   [`RecipeFn`][callable::RecipeFn] traits that let an embedder hook
//!   arbitrary Rust code into freshness checks and recipes.

pub mod callable;
pub mod error;
pub mod executor;
pub mod freshness;
pub mod graph;
pub mod loader;
pub mod model;
pub mod mtime;
pub mod queue;
pub mod reporter;
pub mod timeformat;
