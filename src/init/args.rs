// SPDX-License-Identifier: Apache-2.0

use crate::init::forwarder::ForwarderArgs;
use crate::init::logfile_receiver::LogfileReceiverArgs;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_NOTIFICATION_QUEUE_SIZE: usize = 1_000;

#[derive(Debug, Args, Clone)]
pub struct AgentRun {
    /// Daemonize
    #[arg(long, env = "LOGMON_DAEMON", default_value = "false")]
    pub daemon: bool,

    /// PID file
    #[arg(long, env = "LOGMON_PID_FILE", default_value = "/tmp/logmon-agent.pid")]
    pub pid_file: String,

    /// Log file
    #[arg(long, env = "LOGMON_LOG_FILE", default_value = "/tmp/logmon-agent.log")]
    pub log_file: String,

    /// JSON document listing the monitors, reloaded when it changes
    #[arg(long, env = "LOGMON_MONITORS_FILE")]
    pub monitors_file: PathBuf,

    /// Where matched results and notifications are sent
    #[arg(value_enum, long, env = "LOGMON_EXPORTER", default_value = "json-lines")]
    pub exporter: Exporter,

    /// Output file for the json-lines exporter, stdout when unset
    #[arg(long, env = "LOGMON_JSON_LINES_OUTPUT")]
    pub json_lines_output: Option<PathBuf>,

    /// Maximum pending notifications before new ones are dropped
    #[arg(long, env = "LOGMON_NOTIFICATION_QUEUE_SIZE", default_value_t = DEFAULT_NOTIFICATION_QUEUE_SIZE)]
    pub notification_queue_size: usize,

    #[command(flatten)]
    pub logfile_receiver: LogfileReceiverArgs,

    #[command(flatten)]
    pub forwarder: ForwarderArgs,
}

impl AgentRun {
    pub fn new(monitors_file: impl Into<PathBuf>) -> Self {
        AgentRun {
            daemon: false,
            pid_file: "/tmp/logmon-agent.pid".to_string(),
            log_file: "/tmp/logmon-agent.log".to_string(),
            monitors_file: monitors_file.into(),
            exporter: Exporter::JsonLines,
            json_lines_output: None,
            notification_queue_size: DEFAULT_NOTIFICATION_QUEUE_SIZE,
            logfile_receiver: LogfileReceiverArgs::default(),
            forwarder: ForwarderArgs::default(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct CheckConfig {
    /// JSON document listing the monitors
    #[arg(long, env = "LOGMON_MONITORS_FILE")]
    pub monitors_file: PathBuf,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Exporter {
    JsonLines,
    Blackhole,
}
