mod cli;
mod commands;
mod logger;

use cli::{Command, Options};
use mk::error::{MkError, UsageError};
use mk::model::RuleSet;
use std::process::exit;
use structopt::StructOpt;

fn main() {
	let options = Options::from_args();
	logger::Logger::install(logger::Logger::level_for_verbosity(options.verbose));

	match run(options) {
		Ok(code) => exit(code),
		Err(err) => {
			eprintln!("mk: error: {}", err);
			exit(err.exit_code());
		}
	}
}

fn run(options: Options) -> Result<i32, MkError> {
	let loaded = mk::loader::load(&options.file)?;
	std::env::set_current_dir(&loaded.root_dir).map_err(|e| {
		UsageError(format!("cannot enter '{}': {}", loaded.root_dir.display(), e))
	})?;
	let rules = RuleSet::new(loaded.rules)?;

	let command = dispatch(options.command, &rules)?;

	match command {
		Command::List { outdated, all } => commands::list::run(&rules, outdated, all),
		Command::Run {
			target,
			dry_run,
			question,
		} => commands::run::run(&rules, &target, dry_run, question, options.output_sync, options.jobs),
		Command::Shorthand(_) => unreachable!("resolved by dispatch()"),
	}
}

/// Resolve the `external_subcommand` fallback into a `Run`, or reject it.
///
/// A single bare word is shorthand for `run <word>`, but only when it names a
/// declared, listed rule; anything else (no words, more than one, or a word
/// that isn't a declared+listed rule) is a usage mistake, not a guess.
fn dispatch(command: Command, rules: &RuleSet) -> Result<Command, MkError> {
	match command {
		Command::Shorthand(words) => match words.as_slice() {
			[target] if is_declared_and_listed(rules, target) => Ok(Command::Run {
				target: target.clone(),
				dry_run: false,
				question: false,
			}),
			[] => Err(UsageError("no target given".to_owned()).into()),
			[target] => Err(UsageError(format!("unrecognized command: {}", target)).into()),
			_ => Err(UsageError(format!("unrecognized command: {}", words.join(" "))).into()),
		},
		other => Ok(other),
	}
}

fn is_declared_and_listed(rules: &RuleSet, raw: &str) -> bool {
	let target = commands::resolve_target_against(rules, raw);
	rules.get(&target).map_or(false, |rule| rule.listed)
}
