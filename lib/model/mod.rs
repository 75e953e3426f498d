//! The rule model: [`Target`], [`Dependency`], [`RecipeStep`] and [`Rule`].
//!
//! These are plain sum types (see the design note on tagged unions over
//! inheritance): the freshness table in [`crate::freshness`] dispatches on
//! the variant rather than on a virtual method.

pub mod path;

use crate::callable::{Predicate, RecipeFn};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The identity a rule produces.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
	/// A filesystem path, canonicalized relative to the project root.
	FilePath(PathBuf),
	/// A symbolic label with no on-disk representation.
	Phony(String),
}

impl Target {
	pub fn is_phony(&self) -> bool {
		matches!(self, Target::Phony(_))
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Target::FilePath(p) => write!(f, "{}", p.display()),
			Target::Phony(name) => write!(f, "{}", name),
		}
	}
}

/// A rule's dependency on something else being current.
pub enum Dependency {
	/// Depends on another rule's target.
	TargetRef(Target),
	/// Depends on a file not produced by any rule; outdated iff missing.
	FilePath(PathBuf),
	/// Depends on a side-effecting nullary check, memoized per invocation.
	Predicate(Arc<dyn Predicate>),
}

impl fmt::Debug for Dependency {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Dependency::TargetRef(t) => f.debug_tuple("TargetRef").field(t).finish(),
			Dependency::FilePath(p) => f.debug_tuple("FilePath").field(p).finish(),
			Dependency::Predicate(_) => f.write_str("Predicate(..)"),
		}
	}
}

/// A single step of a rule's recipe.
pub enum RecipeStep {
	/// An external process invocation, interpreted by `/bin/sh -c`.
	Command(String),
	/// An in-process callable with no meaningful return value.
	Function(Arc<dyn RecipeFn>),
}

impl fmt::Debug for RecipeStep {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RecipeStep::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
			RecipeStep::Function(_) => f.write_str("Function(..)"),
		}
	}
}

impl fmt::Display for RecipeStep {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RecipeStep::Command(cmd) => write!(f, "{}", cmd),
			RecipeStep::Function(_) => write!(f, "<function>"),
		}
	}
}

/// A declared build rule: the triple (target, deps, recipe) plus metadata.
#[derive(Debug)]
pub struct Rule {
	pub target: Target,
	pub deps: Vec<Dependency>,
	pub recipe: Vec<RecipeStep>,
	pub help: Option<String>,
	pub listed: bool,
	pub parallel: bool,
}

impl Rule {
	/// Start building a rule for `target`. Defaults: no deps, no recipe,
	/// no help text, listed, not parallel-safe.
	pub fn new(target: Target) -> Self {
		Rule {
			target,
			deps: Vec::new(),
			recipe: Vec::new(),
			help: None,
			listed: true,
			parallel: false,
		}
	}

	pub fn dep(mut self, dep: Dependency) -> Self {
		self.deps.push(dep);
		self
	}

	pub fn step(mut self, step: RecipeStep) -> Self {
		self.recipe.push(step);
		self
	}

	pub fn help(mut self, text: impl Into<String>) -> Self {
		self.help = Some(text.into());
		self
	}

	pub fn listed(mut self, listed: bool) -> Self {
		self.listed = listed;
		self
	}

	pub fn parallel(mut self, parallel: bool) -> Self {
		self.parallel = parallel;
		self
	}
}

/// Errors raised while assembling a flat rule list into a validated
/// [`RuleSet`] (see [`crate::error::MkError::Graph`] for the variant that
/// wraps these at the top level).
#[derive(Debug)]
pub enum ModelError {
	/// Two rules declared the same target.
	DuplicateTarget(Target),
}

impl fmt::Display for ModelError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ModelError::DuplicateTarget(t) => write!(f, "duplicate rule for target '{}'", t),
		}
	}
}

impl std::error::Error for ModelError {}

/// The validated, de-duplicated collection of all rules known to one
/// invocation. Reference closure (every `TargetRef` names a declared rule)
/// is *not* checked here: that's the graph builder's job, since it only
/// needs to hold for the subset reachable from the requested root.
#[derive(Debug)]
pub struct RuleSet {
	rules: Vec<Rule>,
	/// Maps a target to its index in `rules`, preserving declaration order
	/// for iteration.
	index: indexmap::IndexMap<Target, usize>,
}

impl RuleSet {
	/// Build a `RuleSet` from a flat, ordered list of rules.
	///
	/// Errors with [`ModelError::DuplicateTarget`] at the first duplicate
	/// target encountered, in declaration order.
	pub fn new(rules: Vec<Rule>) -> Result<Self, ModelError> {
		let mut index = indexmap::IndexMap::with_capacity(rules.len());
		for (i, rule) in rules.iter().enumerate() {
			if index.insert(rule.target.clone(), i).is_some() {
				return Err(ModelError::DuplicateTarget(rule.target.clone()));
			}
		}
		Ok(RuleSet { rules, index })
	}

	pub fn get(&self, target: &Target) -> Option<&Rule> {
		self.index.get(target).map(|&i| &self.rules[i])
	}

	pub fn index_of(&self, target: &Target) -> Option<usize> {
		self.index.get(target).copied()
	}

	pub fn rules(&self) -> &[Rule] {
		&self.rules
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}
