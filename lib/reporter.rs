//! User-facing progress and error output.
//!
//! This is deliberately separate from the `log` facade configured in
//! [`crate::logger`] (see the design note on the two streams): this module
//! is what a user watches scroll by while a build runs, not a diagnostic
//! trail for whoever embeds the library.

use crate::model::Target;
use crate::timeformat::MinSec;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

/// Which stream a chunk of subprocess output came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
	Stdout,
	Stderr,
}

/// Prints build progress to stdout/stderr, with a fixed program prefix.
///
/// In `output_sync` mode, a running rule's output is buffered and flushed as
/// one contiguous block when it finishes, instead of being interleaved with
/// other concurrently-running rules' output as it arrives.
pub struct Reporter {
	output_sync: bool,
	buffers: Mutex<HashMap<usize, Vec<u8>>>,
}

impl Reporter {
	pub fn new(output_sync: bool) -> Self {
		Reporter {
			output_sync,
			buffers: Mutex::new(HashMap::new()),
		}
	}

	/// Announce that a rule's recipe is about to run, echoing its command
	/// text (if any) before it runs.
	pub fn announce(&self, target: &Target, command: &str) {
		self.line(&format!("{}: {}", target, command));
	}

	pub fn dry_run_announce(&self, target: &Target, command: &str) {
		self.line(&format!("{}: (dry run) {}", target, command));
	}

	/// Record a chunk of a running rule's subprocess output.
	pub fn output(&self, rule_index: usize, _source: Source, chunk: &[u8]) {
		if self.output_sync {
			self.buffers.lock().unwrap().entry(rule_index).or_default().extend_from_slice(chunk);
		} else {
			let _ = std::io::stdout().write_all(chunk);
		}
	}

	pub fn up_to_date(&self, target: &Target) {
		self.line(&format!("{}: up to date", target));
	}

	pub fn completed(&self, rule_index: usize, target: &Target, duration: Duration) {
		self.flush_buffered(rule_index);
		self.line(&format!("{}: done in {}", target, MinSec::from_duration(duration)));
	}

	pub fn skipped_dep_failed(&self, target: &Target) {
		self.line(&format!("{}: skipped, a dependency failed", target));
	}

	pub fn recipe_failed(&self, rule_index: usize, target: &Target, detail: &dyn std::fmt::Display) {
		self.flush_buffered(rule_index);
		self.error(&format!("recipe for '{}' failed: {}", target, detail));
	}

	pub fn error(&self, message: &str) {
		eprintln!("mk: error: {}", message);
	}

	pub fn line(&self, message: &str) {
		println!("mk: {}", message);
	}

	fn flush_buffered(&self, rule_index: usize) {
		if let Some(buffer) = self.buffers.lock().unwrap().remove(&rule_index) {
			if !buffer.is_empty() {
				let _ = std::io::stdout().write_all(&buffer);
			}
		}
	}
}
