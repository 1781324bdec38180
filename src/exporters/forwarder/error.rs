// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Forwarder queue is full (capacity {0})")]
    QueueFull(usize),
}

pub type Result<T> = std::result::Result<T, ForwardError>;
