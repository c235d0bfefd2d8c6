//! `actions` crate — the `ActionHandler` contract and everything a handler sees.
//!
//! Every business action a workflow step invokes (database write, payment
//! call, build-tool run, ...) implements [`ActionHandler`] and is looked up
//! by name through an [`ActionRegistry`].  The engine crate dispatches
//! through this trait object and never knows what an action does.

pub mod context;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use context::{Params, WorkflowContext};
pub use error::ActionError;
pub use registry::ActionRegistry;
pub use traits::{action_fn, ActionHandler, FnAction};
