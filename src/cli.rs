//! Command-line surface.
//!
//! `mk <target>` is shorthand for `mk run <target>`, mirroring the
//! underlying tool this was distilled from, where a bare word is ambiguous
//! between "subcommand" and "target name". Anything that isn't a declared
//! subcommand and isn't a single bare word is rejected outright rather than
//! silently guessed at.

use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "mk", about = "A Make-like build tool and task runner.")]
pub struct Options {
	/// Increase logging verbosity (-v info, -vv debug, -vvv trace).
	#[structopt(short = "v", long = "verbose", parse(from_occurrences), global = true)]
	pub verbose: u8,

	/// Buffer each running rule's output and flush it as one block instead
	/// of interleaving concurrent rules' output.
	#[structopt(long = "output-sync", global = true)]
	pub output_sync: bool,

	/// Path to the rule-definition file.
	#[structopt(short = "f", long = "file", default_value = "Mkfile.toml", global = true)]
	pub file: PathBuf,

	/// Maximum number of recipes to run at once. Defaults to the number of
	/// available CPUs.
	#[structopt(short = "j", long = "jobs", global = true)]
	pub jobs: Option<usize>,

	#[structopt(subcommand)]
	pub command: Command,
}

#[derive(StructOpt)]
pub enum Command {
	/// List declared rules.
	List {
		/// Mark non-phony outdated rules with `* `.
		#[structopt(short = "q")]
		outdated: bool,
		/// Include rules with listed=false.
		#[structopt(short = "a")]
		all: bool,
	},
	/// Build a target.
	Run {
		target: String,
		/// Report what would run, without running it.
		#[structopt(long = "dry-run", short = "n")]
		dry_run: bool,
		/// Exit 0 if up to date, 1 if a rebuild is needed, without running
		/// anything.
		#[structopt(long = "question", short = "q")]
		question: bool,
	},
	#[structopt(external_subcommand)]
	Shorthand(Vec<String>),
}
