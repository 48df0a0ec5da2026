//! Test-then-deploy assistant for agent repositories.
//!
//! The crate clones a GitHub repository, runs its `test_*.py` files, and on
//! explicit confirmation deploys it to Cloud Run through the agent deploy CLI.
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (platform and confirmation
//!   classifiers, URL and report handling, the session state machine).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, scratch directories,
//!   process execution for git, pytest and the deploy tool). Isolated behind
//!   [`io::process::CommandRunner`] to enable fakes in tests.
//!
//! Orchestration modules ([`tester`], [`deploy`], [`session`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod core;
pub mod deploy;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tester;
