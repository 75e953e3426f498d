pub mod list;
pub mod run;

use mk::model::path::canonicalize_in;
use mk::model::{RuleSet, Target};
use std::path::Path;

/// Resolve a bare CLI target string the same way a TOML dependency string is
/// resolved: the `name:` marker selects a phony target, anything else is a
/// file path. File paths are canonicalized against the current directory,
/// which by the time this runs has already been changed to the project root
/// (see `main::run`), so this lines up with how the loader resolved the same
/// string when it declared the rule.
pub fn resolve_target(raw: &str) -> Target {
	match raw.strip_prefix("name:") {
		Some(name) => Target::Phony(name.to_owned()),
		None => {
			let cwd = std::env::current_dir().unwrap_or_default();
			Target::FilePath(canonicalize_in(&cwd, Path::new(raw)))
		}
	}
}

/// If `raw` names a declared rule under either reading, prefer that reading;
/// this lets `mk build` find a phony rule named `build` without requiring
/// the `name:` marker on the command line, while still resolving to a file
/// path if no such rule exists.
pub fn resolve_target_against(rules: &RuleSet, raw: &str) -> Target {
	let phony = Target::Phony(raw.to_owned());
	if rules.get(&phony).is_some() {
		return phony;
	}
	resolve_target(raw)
}
