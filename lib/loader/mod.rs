//! Reading rule definitions from a declarative TOML file.
//!
//! `Predicate` and `Function` recipe steps can't be named in a text file (no
//! text format lets you embed a Rust closure), so they stay out of this
//! module entirely: programs that need them build a [`RuleSet`] directly
//! through the builder API instead of going through a file at all.

use crate::error::{ErrorWithLocation, Location};
use crate::model::path::canonicalize_in;
use crate::model::{Dependency, RecipeStep, Rule, Target};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum LoadError {
	Io(std::io::Error),
	Parse(toml::de::Error),
}

impl fmt::Display for LoadError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			LoadError::Io(e) => write!(f, "{}", e),
			LoadError::Parse(e) => write!(f, "{}", e),
		}
	}
}

impl std::error::Error for LoadError {}

#[derive(Deserialize)]
struct RawFile {
	#[serde(default, rename = "rule")]
	rules: Vec<RawRule>,
}

#[derive(Deserialize)]
struct RawRule {
	target: String,
	#[serde(default)]
	deps: Vec<String>,
	help: Option<String>,
	#[serde(default = "default_listed")]
	listed: bool,
	#[serde(default)]
	parallel: bool,
	#[serde(default)]
	recipe: Vec<String>,
}

fn default_listed() -> bool {
	true
}

/// The result of successfully reading a rule-definition file.
#[derive(Debug)]
pub struct LoadedFile {
	pub rules: Vec<Rule>,
	/// The file's parent directory; the engine treats this as the project
	/// root and changes into it before resolving any relative paths.
	pub root_dir: PathBuf,
}

/// Read and parse a `Mkfile.toml`-shaped file at `path`.
pub fn load(path: &Path) -> Result<LoadedFile, ErrorWithLocation<LoadError>> {
	let location = |line: Option<NonZeroU32>| Location {
		file: Some(path),
		line,
	};

	let text = std::fs::read_to_string(path).map_err(|e| location(None).error(LoadError::Io(e)))?;
	let raw: RawFile = toml::from_str(&text).map_err(|e| {
		let line = e.line_col().and_then(|(line, _)| NonZeroU32::new(line as u32 + 1));
		location(line).error(LoadError::Parse(e))
	})?;

	let root_dir = path
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.map(Path::to_path_buf)
		.unwrap_or_else(|| PathBuf::from("."));
	// Resolve relative target/dependency paths against the directory the
	// engine is about to chdir into, so "./foo" and "foo" name the same
	// target whether or not the rule file wrote the leading "./".
	let absolute_root = std::fs::canonicalize(&root_dir).map_err(|e| location(None).error(LoadError::Io(e)))?;

	let declared_targets: HashSet<Target> =
		raw.rules.iter().map(|r| parse_target(&r.target, &absolute_root)).collect();

	let rules = raw
		.rules
		.into_iter()
		.map(|raw_rule| {
			let mut rule = Rule::new(parse_target(&raw_rule.target, &absolute_root));
			for dep in &raw_rule.deps {
				rule = rule.dep(resolve_dependency(dep, &absolute_root, &declared_targets));
			}
			for command in raw_rule.recipe {
				rule = rule.step(RecipeStep::Command(command));
			}
			if let Some(help) = raw_rule.help {
				rule = rule.help(help);
			}
			rule.listed(raw_rule.listed).parallel(raw_rule.parallel)
		})
		.collect();

	Ok(LoadedFile { rules, root_dir })
}

/// A bare string is a phony target if it carries the `name:` marker, and a
/// file path otherwise.
fn parse_target(raw: &str, root: &Path) -> Target {
	match raw.strip_prefix("name:") {
		Some(name) => Target::Phony(name.to_owned()),
		None => Target::FilePath(canonicalize_in(root, Path::new(raw))),
	}
}

fn resolve_dependency(raw: &str, root: &Path, declared_targets: &HashSet<Target>) -> Dependency {
	let target = parse_target(raw, root);
	if declared_targets.contains(&target) {
		Dependency::TargetRef(target)
	} else {
		Dependency::FilePath(canonicalize_in(root, Path::new(raw)))
	}
}
