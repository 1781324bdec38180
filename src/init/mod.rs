// SPDX-License-Identifier: Apache-2.0

pub mod agent;
pub mod args;
pub mod check;
pub mod forwarder;
pub mod logfile_receiver;
pub mod parse;
pub mod wait;
