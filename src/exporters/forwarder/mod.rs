// SPDX-License-Identifier: Apache-2.0

//! Bounded queue and batched, retrying delivery of matched results.

mod config;
mod error;
mod item;
mod queue;
mod result_forwarder;

pub use config::ForwarderConfig;
pub use error::{ForwardError, Result};
pub use item::{ForwardItem, now_millis};
pub use queue::{ForwarderHandle, ForwarderStats};
pub use result_forwarder::{DrainOutcome, ResultForwarder};

#[cfg(test)]
pub(crate) mod test_util;
