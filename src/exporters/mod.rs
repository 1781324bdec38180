// SPDX-License-Identifier: Apache-2.0

pub mod blackhole;
pub mod forwarder;
pub mod json_lines;
pub mod notifications;
