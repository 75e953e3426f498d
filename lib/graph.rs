//! Building a directed acyclic dependency graph rooted at a requested target.
//!
//! The graph is stored as an arena: nodes are identified by their index into
//! the owning [`RuleSet`][crate::model::RuleSet], never by pointer. A side
//! color array (white/gray/black) makes cycle detection a straightforward
//! depth-first search instead of something needing a separate detection
//! pass.

use crate::model::{Dependency, Rule, RuleSet, Target};
use log::{debug, trace, warn};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
	White,
	Gray,
	Black,
}

/// Error produced while building or sorting the graph.
#[derive(Debug)]
pub enum GraphError {
	/// The requested root does not name a declared rule, and is not a bare
	/// file referenced as a dependency by any rule either.
	UnknownTarget(Target),
	/// A `TargetRef` dependency names a target with no declared rule.
	UnresolvedReference { from: Target, to: Target },
	/// A cycle was found; `path` lists the targets in traversal order,
	/// starting and ending at the repeated target.
	Cycle { path: Vec<Target> },
}

impl fmt::Display for GraphError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			GraphError::UnknownTarget(t) => write!(f, "no rule to make target '{}'", t),
			GraphError::UnresolvedReference { from, to } => write!(
				f,
				"rule '{}' depends on '{}', which has no rule",
				from, to
			),
			GraphError::Cycle { path } => {
				write!(f, "dependency cycle: ")?;
				for (i, t) in path.iter().enumerate() {
					if i > 0 {
						write!(f, " -> ")?;
					}
					write!(f, "{}", t)?;
				}
				Ok(())
			}
		}
	}
}

impl std::error::Error for GraphError {}

/// The transitive closure of a requested root target, in leaves-first
/// topological order.
#[derive(Debug)]
pub struct Graph<'a> {
	rules: &'a RuleSet,
	/// Rule indices reachable from the root, leaves first.
	pub order: Vec<usize>,
	/// For each reachable rule index, the indices (also into `rules`) of its
	/// direct `TargetRef` dependencies, in declaration order.
	pub direct_deps: Vec<Vec<usize>>,
	/// Index into `order`/`direct_deps` of the root itself.
	pub root: usize,
}

impl<'a> Graph<'a> {
	/// Build the graph reachable from `root_target`.
	pub fn build(rules: &'a RuleSet, root_target: &Target) -> Result<Self, GraphError> {
		debug!("building graph rooted at '{}'", root_target);
		let root_index = match rules.index_of(root_target) {
			Some(i) => i,
			None => {
				if is_known_bare_file(rules, root_target) {
					// A bare file leaf: no rule builds it, so it contributes no
					// node of its own. Callers (the freshness evaluator) treat
					// an absent node as "exists, therefore not outdated"; report
					// an empty, trivially up-to-date graph.
					debug!("'{}' is a bare file leaf, not a declared rule", root_target);
					return Ok(Graph {
						rules,
						order: Vec::new(),
						direct_deps: Vec::new(),
						root: 0,
					});
				}
				warn!("no rule to make target '{}'", root_target);
				return Err(GraphError::UnknownTarget(root_target.clone()));
			}
		};

		let n = rules.len();
		let mut color = vec![Color::White; n];
		let mut order = Vec::new();
		let mut direct_deps = vec![Vec::new(); n];
		let mut stack = Vec::new();

		visit(rules, root_index, &mut color, &mut stack, &mut order, &mut direct_deps)?;

		let root = order
			.iter()
			.position(|&i| i == root_index)
			.expect("root must appear in its own post-order");

		debug!("graph closure has {} rule(s), root at position {}", order.len(), root);
		Ok(Graph {
			rules,
			order,
			direct_deps,
			root,
		})
	}

	pub fn rule(&self, index: usize) -> &Rule {
		&self.rules.rules()[index]
	}

	pub fn root_rule(&self) -> Option<&Rule> {
		self.order.get(self.root).map(|&i| self.rule(i))
	}

	/// Size of the index space rule indices are drawn from (the number of
	/// rules in the owning [`RuleSet`]), for callers that want to size a
	/// `Vec` indexed the same way as `order`/`direct_deps` without depending
	/// on `RuleSet` directly.
	pub fn rule_capacity(&self) -> usize {
		self.rules.len()
	}
}

fn is_known_bare_file(rules: &RuleSet, target: &Target) -> bool {
	let path = match target {
		Target::FilePath(p) => p,
		Target::Phony(_) => return false,
	};
	rules.rules().iter().any(|rule| {
		rule.deps.iter().any(|dep| matches!(dep, Dependency::FilePath(p) if p == path))
	})
}

fn visit(
	rules: &RuleSet,
	index: usize,
	color: &mut [Color],
	stack: &mut Vec<usize>,
	order: &mut Vec<usize>,
	direct_deps: &mut [Vec<usize>],
) -> Result<(), GraphError> {
	match color[index] {
		Color::Black => return Ok(()),
		Color::Gray => {
			let mut path: Vec<Target> = stack
				.iter()
				.skip_while(|&&i| i != index)
				.map(|&i| rules.rules()[i].target.clone())
				.collect();
			path.push(rules.rules()[index].target.clone());
			warn!(
				"dependency cycle: {}",
				path.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" -> ")
			);
			return Err(GraphError::Cycle { path });
		}
		Color::White => {}
	}

	color[index] = Color::Gray;
	stack.push(index);

	let rule = &rules.rules()[index];
	trace!("visiting rule '{}'", rule.target);
	for dep in &rule.deps {
		if let Dependency::TargetRef(target) = dep {
			let dep_index = rules.index_of(target).ok_or_else(|| {
				warn!("rule '{}' depends on '{}', which has no rule", rule.target, target);
				GraphError::UnresolvedReference {
					from: rule.target.clone(),
					to: target.clone(),
				}
			})?;
			visit(rules, dep_index, color, stack, order, direct_deps)?;
			direct_deps[index].push(dep_index);
		}
	}

	stack.pop();
	color[index] = Color::Black;
	order.push(index);
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::model::{Dependency, RecipeStep, Rule, Target};

	fn phony(name: &str, deps: Vec<&str>) -> Rule {
		let mut rule = Rule::new(Target::Phony(name.to_owned()));
		for dep in deps {
			rule = rule.dep(Dependency::TargetRef(Target::Phony(dep.to_owned())));
		}
		rule
	}

	#[test]
	fn leaves_first_post_order() {
		// a depends on b depends on c
		let rules = RuleSet::new(vec![phony("a", vec!["b"]), phony("b", vec!["c"]), phony("c", vec![])])
			.unwrap();
		let graph = Graph::build(&rules, &Target::Phony("a".into())).unwrap();
		let names: Vec<String> = graph
			.order
			.iter()
			.map(|&i| graph.rule(i).target.to_string())
			.collect();
		assert_eq!(names, vec!["c", "b", "a"]);
	}

	#[test]
	fn sibling_order_follows_declaration_order() {
		let rules = RuleSet::new(vec![
			phony("root", vec!["x", "y"]),
			phony("x", vec![]),
			phony("y", vec![]),
		])
		.unwrap();
		let graph = Graph::build(&rules, &Target::Phony("root".into())).unwrap();
		let names: Vec<String> = graph
			.order
			.iter()
			.map(|&i| graph.rule(i).target.to_string())
			.collect();
		assert_eq!(names, vec!["x", "y", "root"]);
	}

	#[test]
	fn detects_cycle() {
		let rules = RuleSet::new(vec![phony("x", vec!["y"]), phony("y", vec!["x"])]).unwrap();
		let err = Graph::build(&rules, &Target::Phony("x".into())).unwrap_err();
		match err {
			GraphError::Cycle { path } => {
				assert!(path.iter().any(|t| t.to_string() == "x"));
				assert!(path.iter().any(|t| t.to_string() == "y"));
			}
			_ => panic!("expected cycle error"),
		}
	}

	#[test]
	fn unresolved_reference_is_fatal() {
		let rules = RuleSet::new(vec![phony("a", vec!["missing"])]).unwrap();
		let err = Graph::build(&rules, &Target::Phony("a".into())).unwrap_err();
		assert!(matches!(err, GraphError::UnresolvedReference { .. }));
	}

	#[test]
	fn unknown_root_is_fatal() {
		let rules = RuleSet::new(vec![phony("a", vec![])]).unwrap();
		let err = Graph::build(&rules, &Target::Phony("nope".into())).unwrap_err();
		assert!(matches!(err, GraphError::UnknownTarget(_)));
	}

	#[test]
	fn does_not_revisit_shared_dependency() {
		// diamond: root -> {x, y}, x -> c, y -> c
		let mut root = Rule::new(Target::Phony("root".into()));
		root = root.dep(Dependency::TargetRef(Target::Phony("x".into())));
		root = root.dep(Dependency::TargetRef(Target::Phony("y".into())));
		let mut x = Rule::new(Target::Phony("x".into()));
		x = x.dep(Dependency::TargetRef(Target::Phony("c".into())));
		let mut y = Rule::new(Target::Phony("y".into()));
		y = y.dep(Dependency::TargetRef(Target::Phony("c".into())));
		let c = Rule::new(Target::Phony("c".into())).step(RecipeStep::Command("true".into()));
		let rules = RuleSet::new(vec![root, x, y, c]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("root".into())).unwrap();
		let c_count = graph
			.order
			.iter()
			.filter(|&&i| graph.rule(i).target.to_string() == "c")
			.count();
		assert_eq!(c_count, 1);
	}
}
