//! Deciding whether a target is outdated.
//!
//! The whole reachable closure is evaluated eagerly, leaves first, before
//! the executor is started (see the design note on why: it keeps predicate
//! evaluation single-threaded). Each node's result is memoized; each
//! [`Predicate`] is invoked at most once per invocation, keyed by its
//! identity rather than by which dependency slot it's attached to, in case
//! the same predicate is shared between rules.

use crate::callable::Predicate;
use crate::graph::Graph;
use crate::model::{Dependency, Target};
use crate::mtime::{StatCache, Timestamp};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub enum FreshnessError {
	/// `stat` on a path failed for a reason other than "not found".
	Stat(PathBuf, io::Error),
	/// A predicate panicked instead of returning a clean boolean.
	PredicateFailed(String),
}

impl fmt::Display for FreshnessError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			FreshnessError::Stat(path, err) => {
				write!(f, "unable to stat '{}': {}", path.display(), err)
			}
			FreshnessError::PredicateFailed(msg) => write!(f, "predicate failed: {}", msg),
		}
	}
}

impl std::error::Error for FreshnessError {}

/// The per-invocation outdated status of every node in a [`Graph`].
#[derive(Debug)]
pub struct Freshness {
	/// Indexed the same way as `Graph::rule`/`Graph::order`: by rule index.
	outdated: HashMap<usize, bool>,
}

impl Freshness {
	/// Whether the rule at `rule_index` is outdated. Panics if `rule_index`
	/// was not part of the graph this was computed from.
	pub fn is_outdated(&self, rule_index: usize) -> bool {
		self.outdated[&rule_index]
	}
}

/// Evaluate freshness for the whole graph, leaves first.
///
/// In `dry_run`, predicates are never invoked (they are assumed to report
/// "unchanged", since dry-run must be side-effect free); everything else is
/// still checked so the dry-run output reflects real file state.
pub fn evaluate(graph: &Graph, stat_cache: &mut StatCache, dry_run: bool) -> Result<Freshness, FreshnessError> {
	let mut outdated = HashMap::with_capacity(graph.order.len());
	let mut predicate_cache: HashMap<usize, bool> = HashMap::new();

	for &rule_index in graph.order.iter() {
		let rule = graph.rule(rule_index);
		let target_mtime = match &rule.target {
			Target::FilePath(path) => Some(stat(stat_cache, path)?),
			Target::Phony(_) => None,
		};

		let result = match &rule.target {
			Target::Phony(_) => {
				if rule.deps.is_empty() {
					true
				} else {
					let mut any_dep_outdated = false;
					let mut next_target_ref = 0;
					for dep in &rule.deps {
						any_dep_outdated |= dependency_outdated(
							dep,
							graph,
							&outdated,
							&mut predicate_cache,
							stat_cache,
							dry_run,
							&mut next_target_ref,
							&graph.direct_deps[rule_index],
							None,
						)?;
					}
					any_dep_outdated
				}
			}
			Target::FilePath(_) => {
				let target_mtime = target_mtime.unwrap();
				if rule.deps.is_empty() {
					target_mtime.is_none()
				} else {
					let mut any = target_mtime.is_none();
					let mut next_target_ref = 0;
					for dep in &rule.deps {
						any |= dependency_outdated(
							dep,
							graph,
							&outdated,
							&mut predicate_cache,
							stat_cache,
							dry_run,
							&mut next_target_ref,
							&graph.direct_deps[rule_index],
							target_mtime,
						)?;
					}
					any
				}
			}
		};

		debug!("{}: outdated={}", rule.target, result);
		outdated.insert(rule_index, result);
	}

	Ok(Freshness { outdated })
}

fn stat(cache: &mut StatCache, path: &std::path::Path) -> Result<Option<Timestamp>, FreshnessError> {
	cache.mtime(path).map_err(|e| FreshnessError::Stat(path.to_path_buf(), e))
}

#[allow(clippy::too_many_arguments)]
fn dependency_outdated(
	dep: &Dependency,
	graph: &Graph,
	outdated: &HashMap<usize, bool>,
	predicate_cache: &mut HashMap<usize, bool>,
	stat_cache: &mut StatCache,
	dry_run: bool,
	next_target_ref: &mut usize,
	direct_deps: &[usize],
	target_mtime: Option<Timestamp>,
) -> Result<bool, FreshnessError> {
	match dep {
		Dependency::FilePath(path) => {
			let dep_mtime = stat(stat_cache, path)?;
			let missing = dep_mtime.is_none();
			let newer = match (dep_mtime, target_mtime) {
				(Some(d), Some(t)) => d > t,
				_ => false,
			};
			Ok(missing || newer)
		}
		Dependency::TargetRef(_) => {
			let dep_index = direct_deps[*next_target_ref];
			*next_target_ref += 1;
			let dep_rule_outdated = outdated[&dep_index];
			let newer = if let Target::FilePath(dep_path) = &graph.rule(dep_index).target {
				match (stat(stat_cache, dep_path)?, target_mtime) {
					(Some(d), Some(t)) => d > t,
					_ => false,
				}
			} else {
				false
			};
			Ok(dep_rule_outdated || newer)
		}
		Dependency::Predicate(predicate) => {
			if dry_run {
				return Ok(false);
			}
			evaluate_predicate(predicate, predicate_cache)
		}
	}
}

/// A predicate that panics is not "dep changed", it is a fatal error for
/// the whole invocation: the caller can't tell what the predicate meant to
/// report, so the only honest answer is to stop.
fn evaluate_predicate(
	predicate: &Arc<dyn Predicate>,
	cache: &mut HashMap<usize, bool>,
) -> Result<bool, FreshnessError> {
	let key = Arc::as_ptr(predicate) as *const () as usize;
	if let Some(&result) = cache.get(&key) {
		return Ok(result);
	}
	let result = catch_unwind(AssertUnwindSafe(|| predicate.check())).map_err(|payload| {
		let msg = payload
			.downcast_ref::<&str>()
			.map(|s| s.to_string())
			.or_else(|| payload.downcast_ref::<String>().cloned())
			.unwrap_or_else(|| "predicate panicked".to_string());
		FreshnessError::PredicateFailed(msg)
	})?;
	debug!("predicate changed={}", result);
	cache.insert(key, result);
	Ok(result)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::model::{Rule, RuleSet};
	use std::sync::Arc;
	use tempfile::tempdir;

	#[test]
	fn phony_with_no_deps_is_always_outdated() {
		let rules = RuleSet::new(vec![Rule::new(Target::Phony("all".into()))]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("all".into())).unwrap();
		let mut cache = StatCache::new();
		let fresh = evaluate(&graph, &mut cache, false).unwrap();
		assert!(fresh.is_outdated(graph.order[graph.root]));
	}

	#[test]
	fn phony_with_deps_tracks_dependency_freshness() {
		let dir = tempdir().unwrap();
		let dep_path = dir.path().join("dep");
		std::fs::write(&dep_path, b"x").unwrap();

		let mut all = Rule::new(Target::Phony("all".into()));
		all = all.dep(Dependency::FilePath(dep_path.clone()));
		let rules = RuleSet::new(vec![all]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("all".into())).unwrap();
		let mut cache = StatCache::new();
		let fresh = evaluate(&graph, &mut cache, false).unwrap();
		// Dep exists and there's nothing to compare it against (phony has no
		// mtime of its own), so it's not "newer than" anything; not missing
		// either, so not outdated.
		assert!(!fresh.is_outdated(graph.order[graph.root]));
	}

	#[test]
	fn missing_target_file_is_outdated() {
		let dir = tempdir().unwrap();
		let target_path = dir.path().join("target");
		let rules = RuleSet::new(vec![Rule::new(Target::FilePath(target_path))]).unwrap();
		let root = rules.rules()[0].target.clone();
		let graph = Graph::build(&rules, &root).unwrap();
		let mut cache = StatCache::new();
		let fresh = evaluate(&graph, &mut cache, false).unwrap();
		assert!(fresh.is_outdated(graph.order[graph.root]));
	}

	#[test]
	fn up_to_date_file_with_older_dep_is_not_outdated() {
		let dir = tempdir().unwrap();
		let dep_path = dir.path().join("dep");
		let target_path = dir.path().join("target");
		std::fs::write(&dep_path, b"x").unwrap();
		std::thread::sleep(std::time::Duration::from_millis(10));
		std::fs::write(&target_path, b"y").unwrap();

		let mut target = Rule::new(Target::FilePath(target_path.clone()));
		target = target.dep(Dependency::FilePath(dep_path));
		let rules = RuleSet::new(vec![target]).unwrap();
		let graph = Graph::build(&rules, &Target::FilePath(target_path)).unwrap();
		let mut cache = StatCache::new();
		let fresh = evaluate(&graph, &mut cache, false).unwrap();
		assert!(!fresh.is_outdated(graph.order[graph.root]));
	}

	#[test]
	fn newer_dep_triggers_rebuild() {
		let dir = tempdir().unwrap();
		let dep_path = dir.path().join("dep");
		let target_path = dir.path().join("target");
		std::fs::write(&target_path, b"y").unwrap();
		std::thread::sleep(std::time::Duration::from_millis(10));
		std::fs::write(&dep_path, b"x").unwrap();

		let mut target = Rule::new(Target::FilePath(target_path.clone()));
		target = target.dep(Dependency::FilePath(dep_path));
		let rules = RuleSet::new(vec![target]).unwrap();
		let graph = Graph::build(&rules, &Target::FilePath(target_path)).unwrap();
		let mut cache = StatCache::new();
		let fresh = evaluate(&graph, &mut cache, false).unwrap();
		assert!(fresh.is_outdated(graph.order[graph.root]));
	}

	#[test]
	fn predicate_is_memoized_across_dependents() {
		use std::sync::atomic::{AtomicUsize, Ordering};
		let calls = Arc::new(AtomicUsize::new(0));
		let calls2 = calls.clone();
		let predicate: Arc<dyn Predicate> = Arc::new(move || {
			calls2.fetch_add(1, Ordering::SeqCst);
			true
		});

		let mut a = Rule::new(Target::Phony("a".into()));
		a = a.dep(Dependency::Predicate(predicate.clone()));
		let mut b = Rule::new(Target::Phony("b".into()));
		b = b.dep(Dependency::TargetRef(Target::Phony("a".into())));
		b = b.dep(Dependency::Predicate(predicate));
		let rules = RuleSet::new(vec![a, b]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("b".into())).unwrap();
		let mut cache = StatCache::new();
		evaluate(&graph, &mut cache, false).unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn dry_run_never_invokes_predicates() {
		use std::sync::atomic::{AtomicUsize, Ordering};
		let calls = Arc::new(AtomicUsize::new(0));
		let calls2 = calls.clone();
		let predicate: Arc<dyn Predicate> = Arc::new(move || {
			calls2.fetch_add(1, Ordering::SeqCst);
			true
		});
		let mut a = Rule::new(Target::Phony("a".into()));
		a = a.dep(Dependency::Predicate(predicate));
		let rules = RuleSet::new(vec![a]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("a".into())).unwrap();
		let mut cache = StatCache::new();
		evaluate(&graph, &mut cache, true).unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn panicking_predicate_is_a_fatal_error() {
		let predicate: Arc<dyn Predicate> = Arc::new(|| panic!("boom"));
		let mut a = Rule::new(Target::Phony("a".into()));
		a = a.dep(Dependency::Predicate(predicate));
		let rules = RuleSet::new(vec![a]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("a".into())).unwrap();
		let mut cache = StatCache::new();
		let err = evaluate(&graph, &mut cache, false).unwrap_err();
		assert!(matches!(err, FreshnessError::PredicateFailed(_)));
	}
}
