//! Tracking of which rules need to be executed, and in what order.
//!
//! A [`BuildQueue`] is de-coupled from the details of what a rule's recipe
//! actually does: it only knows rule indices (as assigned by
//! [`crate::graph::Graph`]), which ones depend on which, and whether each is
//! outdated (from [`crate::freshness::Freshness`], computed once up front).
//! [`next`][Self::next] hands out the next rule ready to run; after running
//! it, the caller reports success or failure through
//! [`complete`][Self::complete]/[`fail`][Self::fail].
//!
//! Unlike a pure dependency-existence tool, a phony target here may carry a
//! real recipe (see the end-to-end "phony always runs" scenario), so phony
//! nodes are dispatched exactly like file nodes; only their freshness rule
//! differs (see [`crate::freshness`]).

use crate::freshness::Freshness;
use crate::graph::Graph;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// The status of a single rule inside a [`BuildQueue`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeStatus {
	/// Still waiting on at least one dependency.
	Waiting,
	/// All dependencies have reached a terminal state; not yet dispatched.
	Ready,
	/// Currently executing on a worker.
	Running,
	/// Ran and succeeded.
	Completed,
	/// Ran and failed.
	Failed,
	/// Not outdated; its recipe did not need to run.
	SkippedUpToDate,
	/// Skipped because a dependency failed.
	SkippedDepFailed,
}

impl NodeStatus {
	pub fn is_terminal(self) -> bool {
		!matches!(self, NodeStatus::Waiting | NodeStatus::Ready | NodeStatus::Running)
	}
}

#[derive(Clone)]
struct Node {
	status: NodeStatus,
	outdated: bool,
	/// Rules that depend on this one (the reverse of `Graph::direct_deps`).
	dependents: Vec<usize>,
	n_deps_left: usize,
	/// Set once any (possibly not yet fully counted) dependency has failed
	/// or been skipped because one of *its* dependencies failed. Checked
	/// once `n_deps_left` reaches zero to decide between `Ready` and
	/// `SkippedDepFailed`.
	dep_failed: bool,
	start_time: Option<Instant>,
	duration: Option<Duration>,
}

/// Tracks dispatch order and terminal status for every rule in a [`Graph`]'s
/// closure.
pub struct BuildQueue {
	nodes: Vec<Option<Node>>,
	/// FIFO: siblings become ready in `graph.order`'s declaration order, and
	/// must dispatch in that same order under serial execution.
	ready: VecDeque<usize>,
	/// Count of nodes not yet in a terminal state.
	n_left: usize,
	/// Set once any node has failed; blocks further dispatch (fail-fast).
	failed: bool,
}

impl BuildQueue {
	/// Build a queue from a graph and its precomputed freshness. Nodes that
	/// are not outdated (and have no outdated dependents waiting on a
	/// transitive rebuild) start out already finished.
	pub fn new(graph: &Graph, freshness: &Freshness) -> BuildQueue {
		let capacity = graph.rule_capacity();
		let mut nodes: Vec<Option<Node>> = vec![None; capacity];

		for &index in &graph.order {
			nodes[index] = Some(Node {
				status: NodeStatus::Waiting,
				outdated: freshness.is_outdated(index),
				dependents: Vec::new(),
				n_deps_left: graph.direct_deps[index].len(),
				dep_failed: false,
				start_time: None,
				duration: None,
			});
		}
		for &index in &graph.order {
			for &dep in &graph.direct_deps[index] {
				nodes[dep].as_mut().unwrap().dependents.push(index);
			}
		}

		let mut queue = BuildQueue {
			nodes,
			ready: VecDeque::new(),
			n_left: graph.order.len(),
			failed: false,
		};

		// Seed readiness for leaves (n_deps_left == 0), leaves-first order
		// means earlier entries in `graph.order` never depend on later ones,
		// so a single forward pass is enough to cascade skips.
		for &index in &graph.order {
			if queue.nodes[index].as_ref().unwrap().n_deps_left == 0 {
				queue.mark_ready_or_skip(index);
			}
		}

		queue
	}

	fn mark_ready_or_skip(&mut self, index: usize) {
		let node = self.nodes[index].as_mut().unwrap();
		debug_assert_eq!(node.status, NodeStatus::Waiting);
		if node.outdated {
			node.status = NodeStatus::Ready;
			self.ready.push_back(index);
		} else {
			node.status = NodeStatus::SkippedUpToDate;
			self.n_left -= 1;
			self.propagate_finished(index);
		}
	}

	/// Hand out the next rule ready to run, marking it `Running`.
	///
	/// Returns `None` if there is nothing dispatchable right now (either
	/// everything is done, or a prior failure has stopped new dispatch).
	pub fn next(&mut self) -> Option<usize> {
		if self.failed {
			return None;
		}
		let index = self.ready.pop_front()?;
		let node = self.nodes[index].as_mut().unwrap();
		node.status = NodeStatus::Running;
		node.start_time = Some(Instant::now());
		Some(index)
	}

	/// Report that rule `index`'s recipe completed successfully.
	pub fn complete(&mut self, index: usize) {
		let node = self.nodes[index].as_mut().unwrap();
		debug_assert_eq!(node.status, NodeStatus::Running);
		node.status = NodeStatus::Completed;
		node.duration = node.start_time.map(|t| t.elapsed());
		self.n_left -= 1;
		self.propagate_finished(index);
	}

	/// Report that rule `index`'s recipe failed. Stops further dispatch and
	/// transitively skips everything depending on it.
	pub fn fail(&mut self, index: usize) {
		let node = self.nodes[index].as_mut().unwrap();
		debug_assert_eq!(node.status, NodeStatus::Running);
		node.status = NodeStatus::Failed;
		node.duration = node.start_time.map(|t| t.elapsed());
		self.n_left -= 1;
		self.failed = true;
		self.propagate_finished(index);
	}

	/// Walk dependents of a just-finished node, decrementing their
	/// `n_deps_left` and, if the just-finished node itself failed or was
	/// already doomed by one of *its* deps, marking them as doomed too. A
	/// dependent's fate is only decided once all of its own deps have
	/// reported in, since a later sibling might still be the one that
	/// dooms it even if this one succeeded.
	fn propagate_finished(&mut self, index: usize) {
		let failed_here = matches!(
			self.nodes[index].as_ref().unwrap().status,
			NodeStatus::Failed | NodeStatus::SkippedDepFailed
		);
		let dependents = self.nodes[index].as_ref().unwrap().dependents.clone();
		for dependent in dependents {
			let node = self.nodes[dependent].as_mut().unwrap();
			node.n_deps_left -= 1;
			node.dep_failed |= failed_here;
			if node.n_deps_left == 0 && node.status == NodeStatus::Waiting {
				if node.dep_failed {
					node.status = NodeStatus::SkippedDepFailed;
					self.n_left -= 1;
					self.propagate_finished(dependent);
				} else {
					self.mark_ready_or_skip(dependent);
				}
			}
		}
	}

	pub fn status(&self, index: usize) -> NodeStatus {
		self.nodes[index].as_ref().unwrap().status
	}

	pub fn duration(&self, index: usize) -> Option<Duration> {
		self.nodes[index].as_ref().unwrap().duration
	}

	/// Count of nodes not yet in a terminal state.
	pub fn n_left(&self) -> usize {
		self.n_left
	}

	pub fn has_failed(&self) -> bool {
		self.failed
	}

	/// Turn this into a concurrency-safe queue multiple workers can share.
	pub fn make_async(self) -> AsyncBuildQueue {
		AsyncBuildQueue {
			queue: Mutex::new(self),
			condvar: Condvar::new(),
		}
	}
}

impl AsyncBuildQueue {
	/// Recover the plain queue once no worker is touching it anymore, to
	/// read final per-rule status without going back through the lock.
	pub fn into_inner(self) -> BuildQueue {
		self.queue.into_inner().unwrap()
	}
}

/// Wraps a [`BuildQueue`] so multiple worker threads can share and wait on
/// it.
pub struct AsyncBuildQueue {
	queue: Mutex<BuildQueue>,
	condvar: Condvar,
}

pub struct LockedAsyncBuildQueue<'a> {
	queue: MutexGuard<'a, BuildQueue>,
	condvar: &'a Condvar,
}

impl AsyncBuildQueue {
	pub fn lock(&self) -> LockedAsyncBuildQueue {
		LockedAsyncBuildQueue {
			queue: self.queue.lock().unwrap(),
			condvar: &self.condvar,
		}
	}
}

impl<'a> LockedAsyncBuildQueue<'a> {
	/// Non-blocking: returns `None` if nothing is dispatchable right now.
	pub fn next(&mut self) -> Option<usize> {
		self.queue.next()
	}

	/// Block until a rule is ready to run, or everything is done.
	pub fn wait(mut self) -> Option<usize> {
		loop {
			if let Some(index) = self.queue.next() {
				return Some(index);
			}
			if self.queue.n_left() == 0 || self.queue.has_failed() {
				return None;
			}
			self.queue = self.condvar.wait(self.queue).unwrap();
		}
	}

	pub fn complete(&mut self, index: usize) {
		self.queue.complete(index);
		self.condvar.notify_all();
	}

	pub fn fail(&mut self, index: usize) {
		self.queue.fail(index);
		self.condvar.notify_all();
	}

	pub fn status(&self, index: usize) -> NodeStatus {
		self.queue.status(index)
	}

	pub fn duration(&self, index: usize) -> Option<Duration> {
		self.queue.duration(index)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::model::{Dependency, Rule, RuleSet, Target};

	fn outdated_all(graph: &Graph) -> Freshness {
		crate::freshness::evaluate(graph, &mut crate::mtime::StatCache::new(), false).unwrap()
	}

	fn chain() -> RuleSet {
		let mut a = Rule::new(Target::Phony("a".into()));
		a = a.dep(Dependency::TargetRef(Target::Phony("b".into())));
		let mut b = Rule::new(Target::Phony("b".into()));
		b = b.dep(Dependency::TargetRef(Target::Phony("c".into())));
		let c = Rule::new(Target::Phony("c".into()));
		RuleSet::new(vec![a, b, c]).unwrap()
	}

	#[test]
	fn dispatches_leaves_before_their_dependents() {
		let rules = chain();
		let graph = Graph::build(&rules, &Target::Phony("a".into())).unwrap();
		let freshness = outdated_all(&graph);
		let mut queue = BuildQueue::new(&graph, &freshness);

		let c_index = rules.index_of(&Target::Phony("c".into())).unwrap();
		let b_index = rules.index_of(&Target::Phony("b".into())).unwrap();
		let a_index = rules.index_of(&Target::Phony("a".into())).unwrap();

		let first = queue.next().unwrap();
		assert_eq!(first, c_index);
		assert_eq!(queue.next(), None); // b not ready until c completes
		queue.complete(first);
		let second = queue.next().unwrap();
		assert_eq!(second, b_index);
		queue.complete(second);
		let third = queue.next().unwrap();
		assert_eq!(third, a_index);
		queue.complete(third);
		assert_eq!(queue.n_left(), 0);
	}

	#[test]
	fn sibling_leaves_dispatch_in_declaration_order() {
		// root depends on x then y; both are outdated leaves ready in the
		// same pass, so under serial dispatch x must come out before y.
		let mut root = Rule::new(Target::Phony("root".into()));
		root = root.dep(Dependency::TargetRef(Target::Phony("x".into())));
		root = root.dep(Dependency::TargetRef(Target::Phony("y".into())));
		let x = Rule::new(Target::Phony("x".into()));
		let y = Rule::new(Target::Phony("y".into()));
		let rules = RuleSet::new(vec![root, x, y]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("root".into())).unwrap();
		let freshness = outdated_all(&graph);
		let mut queue = BuildQueue::new(&graph, &freshness);

		let x_index = rules.index_of(&Target::Phony("x".into())).unwrap();
		let y_index = rules.index_of(&Target::Phony("y".into())).unwrap();

		assert_eq!(queue.next(), Some(x_index));
		assert_eq!(queue.next(), Some(y_index));
	}

	#[test]
	fn failure_cascades_to_skipped_dep_failed() {
		let mut root = Rule::new(Target::Phony("root".into()));
		root = root.dep(Dependency::TargetRef(Target::Phony("a".into())));
		let a = Rule::new(Target::Phony("a".into()));
		let rules = RuleSet::new(vec![root, a]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("root".into())).unwrap();
		let freshness = outdated_all(&graph);
		let mut queue = BuildQueue::new(&graph, &freshness);

		let a_index = rules.index_of(&Target::Phony("a".into())).unwrap();
		let root_index = rules.index_of(&Target::Phony("root".into())).unwrap();

		let first = queue.next().unwrap();
		assert_eq!(first, a_index);
		queue.fail(first);
		assert_eq!(queue.status(root_index), NodeStatus::SkippedDepFailed);
		assert_eq!(queue.next(), None);
		assert!(queue.has_failed());
	}

	#[test]
	fn no_new_dispatch_after_failure() {
		let mut root = Rule::new(Target::Phony("root".into()));
		root = root.dep(Dependency::TargetRef(Target::Phony("a".into())));
		root = root.dep(Dependency::TargetRef(Target::Phony("b".into())));
		let a = Rule::new(Target::Phony("a".into()));
		let b = Rule::new(Target::Phony("b".into()));
		let rules = RuleSet::new(vec![root, a, b]).unwrap();
		let graph = Graph::build(&rules, &Target::Phony("root".into())).unwrap();
		let freshness = outdated_all(&graph);
		let mut queue = BuildQueue::new(&graph, &freshness);

		let first = queue.next().unwrap();
		let second = queue.next().unwrap();
		assert_ne!(first, second);
		queue.fail(first);
		// `second` was already dispatched before the failure; it may still
		// finish, but nothing new is handed out.
		assert_eq!(queue.next(), None);
		queue.complete(second);
		assert_eq!(queue.next(), None);
	}
}
