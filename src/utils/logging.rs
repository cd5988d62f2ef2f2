use std::time::Instant;

use anyhow::Error;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::runtime::ConfigBuilder;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::hts::record::AlignmentRecord;

const LOG_DEST_STDERR: &'static str = "stderr";

pub(crate) fn default_configbuilder() -> ConfigBuilder {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{l:<7} {d(%Y-%m-%d %H:%M:%S)}     {t}  {m}{n}",
        )))
        .build();

    Config::builder().appender(Appender::builder().build(LOG_DEST_STDERR, Box::new(stderr)))
}

/// Installs the process-wide log4rs logger writing to stderr. Fails if a logger is already set.
pub fn init_global_logger(level: LevelFilter) -> Result<(), Error> {
    let config = default_configbuilder()
        .build(Root::builder().appender(LOG_DEST_STDERR).build(level))?;

    log4rs::init_config(config)?;

    Ok(())
}

/// Logs a line every `n` records with the elapsed time and the last position seen.
pub(crate) struct ProgressLogger {
    log: &'static str,
    n: usize,
    verb: &'static str,
    noun: &'static str,

    last_reference: Option<usize>,
    last_pos: i64,
    last_read_name: String,

    start_time: Instant,
    last_start_time: Option<u64>,
    count_non_increasing: i64,

    processed: usize,
}

impl ProgressLogger {
    pub(crate) fn new(log: &'static str, n: usize, verb: &'static str, noun: &'static str) -> Self {
        Self {
            log,
            n: n.max(1),
            verb,
            noun,
            start_time: Instant::now(),
            processed: 0,
            last_start_time: None,
            last_reference: None,
            last_pos: 0,
            last_read_name: String::new(),
            count_non_increasing: 0,
        }
    }

    pub(crate) fn record(&mut self, rec: &AlignmentRecord) -> bool {
        self.check_and_then_record(rec.reference_index, rec.alignment_start, &rec.name)
    }

    #[cfg(test)]
    pub(crate) fn processed(&self) -> usize {
        self.processed
    }

    fn check_and_then_record(&mut self, reference: Option<usize>, pos: i64, rname: &str) -> bool {
        if reference.is_some() && reference == self.last_reference && pos < self.last_pos {
            self.count_non_increasing += 1;
        } else {
            self.last_reference = reference;
        }

        self.last_pos = pos;
        self.last_read_name.clear();
        self.last_read_name.push_str(rname);

        if self.last_start_time.is_none() {
            self.last_start_time = Some(self.start_time.elapsed().as_secs());
        }

        self.processed += 1;
        if self.processed % self.n == 0 {
            self.log_progress();
            true
        } else {
            false
        }
    }

    fn log_progress(&mut self) {
        let seconds = self.start_time.elapsed().as_secs();

        let last_period_seconds = seconds - self.last_start_time.unwrap_or(seconds);

        self.last_start_time = Some(seconds);

        let elapsed = format_elapsed_time(seconds);
        let period = pad(&last_period_seconds.to_string(), 4);
        let processed = pad(&self.processed.to_string(), 13);

        let read_info = match self.last_reference {
            Some(reference) => format!("{}:{}", reference, self.last_pos),
            None => "*/*".to_string(),
        };

        let rn_info = if !self.last_read_name.is_empty() && self.count_non_increasing > 1000 {
            format!(".  Last read name: {}", self.last_read_name)
        } else {
            String::new()
        };

        log::info!(target: self.log,
            "{} {} {} .  Elapsed time: {}s.  Time for last {}: {}s.  Last read position: {}{}",
            self.verb,
            processed,
            self.noun,
            elapsed,
            self.n,
            period,
            read_info,
            rn_info
        );
    }
}

fn format_elapsed_time(seconds: u64) -> String {
    let s = seconds % 60;
    let all_minutes = seconds / 60;
    let m = all_minutes % 60;
    let h = all_minutes / 60;

    format!("{:0>2}:{:0>2}:{:0>2}", h, m, s)
}

fn pad(s: &str, length: usize) -> String {
    format!("{:>width$}", s, width = length)
}
