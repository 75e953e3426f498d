//! Binary-level integration tests, driving the real `mk` executable against
//! temporary directories and real subprocesses.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use std::thread::sleep;
use std::time::Duration;
use tempfile::tempdir;

fn mk(dir: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_mk"))
		.arg("-f")
		.arg(dir.join("Mkfile.toml"))
		.args(args)
		.output()
		.expect("failed to run mk")
}

fn write_mkfile(dir: &Path, contents: &str) {
	fs::write(dir.join("Mkfile.toml"), contents).unwrap();
}

fn mtime(path: &Path) -> std::time::SystemTime {
	fs::metadata(path).unwrap().modified().unwrap()
}

// A bit more than most filesystems' mtime resolution, so two writes separated
// by this are reliably ordered.
fn settle() {
	sleep(Duration::from_millis(20));
}

#[test]
fn path_dep_triggers_rebuild_only_when_newer() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "target"
			deps = ["dep"]
			recipe = ["touch target"]
		"#,
	);
	fs::write(dir.path().join("dep"), b"1").unwrap();

	let output = mk(dir.path(), &["run", "target"]);
	assert!(output.status.success(), "{:?}", output);
	let target_path = dir.path().join("target");
	assert!(target_path.exists());
	let first_mtime = mtime(&target_path);

	settle();
	let output = mk(dir.path(), &["run", "target"]);
	assert!(output.status.success());
	assert_eq!(mtime(&target_path), first_mtime, "unchanged dep must not trigger a rebuild");

	settle();
	fs::write(dir.path().join("dep"), b"2").unwrap();
	let output = mk(dir.path(), &["run", "target"]);
	assert!(output.status.success());
	assert!(mtime(&target_path) > first_mtime, "touched dep must trigger a rebuild");
}

#[test]
fn phony_always_runs() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "name:all"
			recipe = ["echo line >> log"]
		"#,
	);

	assert!(mk(dir.path(), &["run", "all"]).status.success());
	assert!(mk(dir.path(), &["run", "all"]).status.success());

	let log = fs::read_to_string(dir.path().join("log")).unwrap();
	assert_eq!(log.lines().count(), 2);
}

#[test]
fn transitive_rebuild_runs_every_outdated_ancestor() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "a"
			deps = ["b"]
			recipe = ["touch a"]

			[[rule]]
			target = "b"
			deps = ["c"]
			recipe = ["touch b"]
		"#,
	);
	fs::write(dir.path().join("c"), b"1").unwrap();

	assert!(mk(dir.path(), &["run", "a"]).status.success());
	let a_path = dir.path().join("a");
	let b_path = dir.path().join("b");
	assert!(a_path.exists());
	assert!(b_path.exists());
	let a_first = mtime(&a_path);
	let b_first = mtime(&b_path);

	settle();
	assert!(mk(dir.path(), &["run", "a"]).status.success());
	assert_eq!(mtime(&a_path), a_first, "nothing changed, a must not rebuild");
	assert_eq!(mtime(&b_path), b_first, "nothing changed, b must not rebuild");
}

#[test]
fn cycle_is_rejected_before_any_recipe_runs() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "name:x"
			deps = ["name:y"]
			recipe = ["touch x_ran"]

			[[rule]]
			target = "name:y"
			deps = ["name:x"]
			recipe = ["touch y_ran"]
		"#,
	);

	let output = mk(dir.path(), &["run", "x"]);
	assert!(!output.status.success());
	assert!(!dir.path().join("x_ran").exists());
	assert!(!dir.path().join("y_ran").exists());

	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains('x') && stderr.contains('y'), "stderr: {}", stderr);
}

#[test]
fn question_mode_reports_without_running_anything() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "target"
			deps = ["dep"]
			recipe = ["touch target"]
		"#,
	);
	fs::write(dir.path().join("dep"), b"1").unwrap();
	assert!(mk(dir.path(), &["run", "target"]).status.success());
	let target_path = dir.path().join("target");
	let built_mtime = mtime(&target_path);

	let output = mk(dir.path(), &["run", "--question", "target"]);
	assert!(output.status.success(), "up to date: expected exit 0");
	assert_eq!(mtime(&target_path), built_mtime);

	settle();
	fs::write(dir.path().join("dep"), b"2").unwrap();
	let output = mk(dir.path(), &["run", "--question", "target"]);
	assert!(!output.status.success(), "outdated: expected nonzero exit");
	assert_eq!(mtime(&target_path), built_mtime, "question mode must not run the recipe");
}

#[test]
fn fail_fast_stops_the_dependent_without_cancelling_siblings() {
	let dir = tempdir().unwrap();
	write_mkfile(
		dir.path(),
		r#"
			[[rule]]
			target = "name:root"
			deps = ["name:a", "name:b"]
			recipe = ["touch root_ran"]

			[[rule]]
			target = "name:a"
			parallel = true
			recipe = ["exit 1"]

			[[rule]]
			target = "name:b"
			parallel = true
			recipe = ["sleep 0.2 && touch b_ran"]
		"#,
	);

	let output = mk(dir.path(), &["-j", "2", "run", "root"]);
	assert!(!output.status.success());
	assert!(!dir.path().join("root_ran").exists(), "root must never run once a dependency fails");
}
