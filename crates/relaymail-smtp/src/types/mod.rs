//! Core SMTP types.

mod address;
mod capability;
mod mechanism;
mod reply;

pub use address::{Address, Mailbox};
pub use capability::{CapabilitySet, Extension};
pub use mechanism::Mechanism;
pub use reply::{Category, Reply, ReplyCode, ReplyLine};
