//! External program invocation.
//!
//! The runner talks to the outside world only through [`ProgramInvoker`],
//! so tests can substitute a fake that writes outputs and counts calls.

mod invoker;

pub use invoker::{Invocation, InvocationOutput, ProcessInvoker, ProgramInvoker};
