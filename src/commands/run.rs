use super::resolve_target_against;
use mk::error::MkError;
use mk::executor::{self, ExecuteOptions, ExecutionMode};
use mk::freshness;
use mk::graph::Graph;
use mk::model::RuleSet;
use mk::mtime::StatCache;
use mk::queue::BuildQueue;
use mk::reporter::Reporter;

#[allow(clippy::too_many_arguments)]
pub fn run(
	rules: &RuleSet,
	target: &str,
	dry_run: bool,
	question: bool,
	output_sync: bool,
	jobs: Option<usize>,
) -> Result<i32, MkError> {
	let target = resolve_target_against(rules, target);
	let graph = Graph::build(rules, &target)?;
	let mut cache = StatCache::new();
	let freshness = freshness::evaluate(&graph, &mut cache, dry_run)?;
	let root_outdated = graph.order.get(graph.root).map(|&i| freshness.is_outdated(i)).unwrap_or(false);

	if question {
		return Ok(if root_outdated { 1 } else { 0 });
	}

	let reporter = Reporter::new(output_sync);
	let queue = BuildQueue::new(&graph, &freshness);
	let jobs = jobs.unwrap_or_else(default_jobs);
	let mode = if dry_run { ExecutionMode::DryRun } else { ExecutionMode::Run };

	let outcome = executor::execute(&graph, queue, &reporter, &ExecuteOptions { mode, jobs });
	if !root_outdated && outcome.ran == 0 {
		reporter.up_to_date(&target);
	}

	match outcome.failed {
		Some(err) => Err(MkError::from(err)),
		None => Ok(0),
	}
}

fn default_jobs() -> usize {
	std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
