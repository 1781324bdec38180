// SPDX-License-Identifier: Apache-2.0

mod decoder;
mod header;
mod tailer;

pub use decoder::{Assembled, LineAssembler};
pub use header::HeaderPrefix;
pub use tailer::{FileTailer, PollOutcome, TailerState};
