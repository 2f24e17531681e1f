pub mod traits;
pub mod registry;
pub mod retailers;
pub mod notifiers;

pub use registry::{RetailerBinding, RetailerRegistry};
pub use traits::{Notifier, Probe};
