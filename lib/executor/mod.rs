//! Running a [`BuildQueue`] to completion: dispatching ready rules to a pool
//! of worker threads, streaming their output, and honoring fail-fast and
//! parallel-safety.

mod subprocess;

use crate::callable::invoke_caught;
use crate::graph::Graph;
use crate::model::{RecipeStep, Target};
use crate::queue::{AsyncBuildQueue, BuildQueue, NodeStatus};
use crate::reporter::Reporter;
use log::{debug, error, trace};
use std::fmt;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Mutex, RwLock};

/// How the executor should treat rules it would otherwise run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExecutionMode {
	/// Actually run recipes.
	Run,
	/// Walk the same dispatch order and report what would run, without
	/// spawning anything or invoking any [`crate::callable::RecipeFn`].
	DryRun,
}

pub struct ExecuteOptions {
	pub mode: ExecutionMode,
	/// Maximum number of rules running at once.
	pub jobs: usize,
}

/// Why a rule's recipe failed.
#[derive(Debug)]
pub enum RecipeError {
	Spawn(Target, std::io::Error),
	Io(Target, std::io::Error),
	NonZeroExit(Target, i32),
	Signaled(Target, i32),
	Function(Target, Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for RecipeError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RecipeError::Spawn(t, e) => write!(f, "'{}': failed to spawn recipe: {}", t, e),
			RecipeError::Io(t, e) => write!(f, "'{}': error reading recipe output: {}", t, e),
			RecipeError::NonZeroExit(t, code) => write!(f, "'{}': recipe exited with status {}", t, code),
			RecipeError::Signaled(t, signal) => write!(f, "'{}': recipe was killed by signal {}", t, signal),
			RecipeError::Function(t, e) => write!(f, "'{}': recipe function failed: {}", t, e),
		}
	}
}

impl std::error::Error for RecipeError {}

/// Summary of what happened while draining the queue.
pub struct Outcome {
	pub ran: usize,
	pub up_to_date: usize,
	pub skipped: usize,
	pub failed: Option<RecipeError>,
}

/// Run (or simulate running) every outdated rule in `graph`, in dependency
/// order, using up to `options.jobs` concurrent workers.
///
/// Rules not marked `parallel` exclude *all* other rules while they run,
/// file and phony alike: two rules only ever run concurrently if both sides
/// opted in.
pub fn execute(graph: &Graph, queue: BuildQueue, reporter: &Reporter, options: &ExecuteOptions) -> Outcome {
	let jobs = options.jobs.max(1);
	let up_to_date = queue_count(&queue, graph, NodeStatus::SkippedUpToDate);
	let async_queue = queue.make_async();
	let exclusive = RwLock::new(());
	let first_error: Mutex<Option<RecipeError>> = Mutex::new(None);

	let result = crossbeam::thread::scope(|scope| {
		for _ in 0..jobs {
			scope.spawn(|_| worker_loop(graph, &async_queue, reporter, options, &exclusive, &first_error));
		}
	});
	if result.is_err() {
		panic!("a worker thread panicked");
	}

	let queue = async_queue.into_inner();
	let mut ran = 0;
	let mut skipped = 0;
	for &index in &graph.order {
		match queue.status(index) {
			NodeStatus::Completed | NodeStatus::Failed => ran += 1,
			NodeStatus::SkippedDepFailed => {
				skipped += 1;
				reporter.skipped_dep_failed(&graph.rule(index).target);
			}
			_ => {}
		}
	}

	Outcome {
		ran,
		up_to_date,
		skipped,
		failed: first_error.into_inner().unwrap(),
	}
}

fn queue_count(queue: &BuildQueue, graph: &Graph, status: NodeStatus) -> usize {
	graph.order.iter().filter(|&&i| queue.status(i) == status).count()
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
	graph: &Graph,
	queue: &AsyncBuildQueue,
	reporter: &Reporter,
	options: &ExecuteOptions,
	exclusive: &RwLock<()>,
	first_error: &Mutex<Option<RecipeError>>,
) {
	loop {
		let index = match queue.lock().wait() {
			Some(i) => i,
			None => return,
		};
		let rule = graph.rule(index);
		debug!("dispatching '{}'", rule.target);

		let _guard = if rule.parallel {
			Guard::Read(exclusive.read().unwrap())
		} else {
			Guard::Write(exclusive.write().unwrap())
		};

		let result = run_rule(graph, index, reporter, options);
		match result {
			Ok(()) => {
				debug!("completed '{}'", rule.target);
				queue.lock().complete(index);
			}
			Err(err) => {
				error!("'{}' failed: {}", rule.target, err);
				reporter.recipe_failed(index, &rule.target, &err);
				first_error.lock().unwrap().get_or_insert(err);
				queue.lock().fail(index);
			}
		}
	}
}

enum Guard<'a> {
	Read(std::sync::RwLockReadGuard<'a, ()>),
	Write(std::sync::RwLockWriteGuard<'a, ()>),
}

fn run_rule(graph: &Graph, index: usize, reporter: &Reporter, options: &ExecuteOptions) -> Result<(), RecipeError> {
	let rule = graph.rule(index);
	let start = std::time::Instant::now();

	for step in &rule.recipe {
		match step {
			RecipeStep::Command(command) => {
				if options.mode == ExecutionMode::DryRun {
					reporter.dry_run_announce(&rule.target, command);
					continue;
				}
				reporter.announce(&rule.target, command);
				run_command(&rule.target, index, command, reporter)?;
			}
			RecipeStep::Function(function) => {
				if options.mode == ExecutionMode::DryRun {
					reporter.dry_run_announce(&rule.target, "<function>");
					continue;
				}
				invoke_caught(function.as_ref()).map_err(|e| RecipeError::Function(rule.target.clone(), e))?;
			}
		}
	}

	reporter.completed(index, &rule.target, start.elapsed());
	Ok(())
}

fn run_command(target: &Target, rule_index: usize, command: &str, reporter: &Reporter) -> Result<(), RecipeError> {
	trace!("'{}': spawning: {}", target, command);
	let child = Command::new("sh")
		.arg("-c")
		.arg(command)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.map_err(|e| {
			error!("'{}': failed to spawn: {}", target, e);
			RecipeError::Spawn(target.clone(), e)
		})?;

	let status: ExitStatus = subprocess::listen_to_child(child, &|source, chunk| {
		reporter.output(rule_index, source, chunk);
	})
	.map_err(|e| RecipeError::Io(target.clone(), e))?;

	match status.code() {
		Some(0) => {
			trace!("'{}': exited 0", target);
			Ok(())
		}
		Some(code) => {
			debug!("'{}': exited with status {}", target, code);
			Err(RecipeError::NonZeroExit(target.clone(), code))
		}
		None => {
			#[cfg(unix)]
			{
				use std::os::unix::process::ExitStatusExt;
				let signal = status.signal().unwrap_or(-1);
				debug!("'{}': killed by signal {}", target, signal);
				Err(RecipeError::Signaled(target.clone(), signal))
			}
			#[cfg(not(unix))]
			{
				Err(RecipeError::NonZeroExit(target.clone(), -1))
			}
		}
	}
}

