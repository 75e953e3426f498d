//! Capability interfaces for user-supplied in-process code.
//!
//! A [`Predicate`][crate::model::Dependency::Predicate] dependency or a
//! [`Function`][crate::model::RecipeStep::Function] recipe step is arbitrary
//! code supplied by whatever embeds this crate. Rather than giving them a
//! concrete function-pointer type, we expose a single "invoke" capability and
//! let the caller box whatever closure or object implements it. This keeps
//! the freshness and executor code free of generics.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A nullary, side-effect-permitting check: "has this dependency changed
/// since the target was last built?"
///
/// May be called zero or more times; the engine memoizes the first result
/// per invocation (see [`crate::freshness`]).
pub trait Predicate: Send + Sync {
	fn check(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> Predicate for F {
	fn check(&self) -> bool {
		self()
	}
}

/// An in-process recipe step. Failure is signaled through the normal error
/// channel, not a special return value.
pub trait RecipeFn: Send + Sync {
	fn invoke(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> RecipeFn for F
where
	F: Fn() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync,
{
	fn invoke(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self()
	}
}

/// Invoke a [`RecipeFn`], turning a panic into an ordinary error so a
/// misbehaving user function can't take the whole build down with it.
pub fn invoke_caught(f: &dyn RecipeFn) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	match catch_unwind(AssertUnwindSafe(|| f.invoke())) {
		Ok(result) => result,
		Err(panic) => Err(Box::new(PanicError(panic_message(panic)))),
	}
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_owned()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"recipe function panicked".to_owned()
	}
}

#[derive(Debug)]
struct PanicError(String);

impl fmt::Display for PanicError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "panicked: {}", self.0)
	}
}

impl std::error::Error for PanicError {}
