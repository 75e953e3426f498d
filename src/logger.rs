//! Internal engine diagnostics, distinct from `mk::reporter`'s user-facing
//! progress output: this is what `-v`/`-vv` turns on, off by default.

use log::{LevelFilter, Metadata, Record};

pub struct Logger {
	level: LevelFilter,
}

impl Logger {
	pub fn install(level: LevelFilter) {
		log::set_max_level(level);
		log::set_boxed_logger(Box::new(Logger { level })).expect("logger already installed");
	}

	/// Map repeated `-v` flags to a level: none is warnings-and-errors only,
	/// one is info, two is debug, three or more is trace.
	pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
		match verbosity {
			0 => LevelFilter::Warn,
			1 => LevelFilter::Info,
			2 => LevelFilter::Debug,
			_ => LevelFilter::Trace,
		}
	}
}

impl log::Log for Logger {
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= self.level
	}

	fn log(&self, record: &Record) {
		if self.enabled(record.metadata()) {
			eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
		}
	}

	fn flush(&self) {}
}
