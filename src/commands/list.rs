use mk::error::MkError;
use mk::freshness;
use mk::graph::Graph;
use mk::model::{RuleSet, Target};
use mk::mtime::StatCache;

pub fn run(rules: &RuleSet, mark_outdated: bool, all: bool) -> Result<i32, MkError> {
	for rule in rules.rules() {
		if !rule.listed && !all {
			continue;
		}

		let marker = if mark_outdated && !rule.target.is_phony() && is_outdated(rules, &rule.target) {
			"* "
		} else {
			""
		};

		match &rule.help {
			Some(help) => println!("{}{}\t{}", marker, rule.target, help),
			None => println!("{}{}", marker, rule.target),
		}
	}
	Ok(0)
}

fn is_outdated(rules: &RuleSet, target: &Target) -> bool {
	let graph = match Graph::build(rules, target) {
		Ok(graph) => graph,
		Err(_) => return false,
	};
	let mut cache = StatCache::new();
	match freshness::evaluate(&graph, &mut cache, false) {
		Ok(freshness) => freshness.is_outdated(graph.order[graph.root]),
		Err(_) => false,
	}
}
