pub mod fake_mailchannels;

use log::LevelFilter;
use simplelog::{Config, TestLogger};

/// Routes `log` records (and `tracing` events, through its `log` feature) to the test output.
pub fn setup_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}
