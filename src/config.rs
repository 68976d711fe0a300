//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::state::TimerConfig;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "tomatod")]
#[command(about = "A daemon that is the single timer authority for a desktop Pomodoro app")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20873")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Work phase duration in minutes
    #[arg(short, long, default_value = "25")]
    pub work_minutes: u64,

    /// Break phase duration in minutes
    #[arg(short, long, default_value = "5")]
    pub break_minutes: u64,

    /// Alert sound file; sound is disabled when omitted
    #[arg(long)]
    pub sound_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Timer durations, clamped into their valid ranges
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig::clamped(
            self.work_minutes.saturating_mul(60),
            self.break_minutes.saturating_mul(60),
        )
    }
}
