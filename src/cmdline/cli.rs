#![allow(non_snake_case)]

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{anyhow, Context, Error};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use macro_sup::set_mlog;

use crate::{
    hts::{duplicate_scoring_strategy::ScoringStrategy, record::AlignmentRecord},
    markdup::{
        config::MarkDuplicatesConfig,
        markduplicates::{DuplicateMarker, DuplicationSummary, MarkedRecord},
        utils::{
            optical_duplicate_finder::{DistanceMetric, OpticalDuplicateFinder},
            read_name_parser::DEFAULT_READ_NAME_REGEX,
        },
    },
    utils::{errors::Error as MarkDuplicatesError, human_readable_byte_count, mem_stats},
};

set_mlog!(stringify!(MarkDuplicatesCli));

/// Marks duplicate reads in a coordinate sorted stream of alignment records, using mate cigars
/// to place soft clipped mates. Records are read and written as JSON lines.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Coordinate sorted alignment records, one JSON object per line.
    #[arg(long = "INPUT", short = 'I', value_name = "File")]
    pub INPUT: PathBuf,

    /// Marked records, one JSON object per line, in input order.
    #[arg(long = "OUTPUT", short = 'O', value_name = "File")]
    pub OUTPUT: PathBuf,

    /// File to write duplication metrics to, as JSON.
    #[arg(long = "METRICS_FILE", short = 'M', value_name = "File")]
    pub METRICS_FILE: Option<PathBuf>,

    /// The minimum distance to buffer records to account for clipping on the 5' end of the records.
    /// Must be at least the largest soft clip found in the input.
    #[arg(long = "MINIMUM_DISTANCE", value_name = "Integer", allow_negative_numbers = true)]
    pub MINIMUM_DISTANCE: i64,

    /// The maximum offset between two duplicate clusters in order to consider them optical duplicates.
    #[arg(
        long = "OPTICAL_DUPLICATE_PIXEL_DISTANCE",
        value_name = "Integer",
        default_value_t = OpticalDuplicateFinder::DEFAULT_OPTICAL_DUPLICATE_DISTANCE,
    )]
    pub OPTICAL_DUPLICATE_PIXEL_DISTANCE: i32,

    /// How two cluster locations are compared against OPTICAL_DUPLICATE_PIXEL_DISTANCE.
    #[arg(
        long = "OPTICAL_DISTANCE_METRIC",
        value_enum,
        default_value_t = DistanceMetric::Chebyshev,
    )]
    pub OPTICAL_DISTANCE_METRIC: DistanceMetric,

    /// The scoring strategy for choosing the non-duplicate among candidates.
    #[arg(
        long = "DUPLICATE_SCORING_STRATEGY",
        short = 'S',
        value_enum,
        default_value_t = ScoringStrategy::TotalMappedReferenceLength,
    )]
    pub DUPLICATE_SCORING_STRATEGY: ScoringStrategy,

    /// Assume that every paired record carries the cigar of its mate when one is present.
    #[arg(
        long = "ASSUME_MATE_CIGAR",
        value_name = "Boolean",
        action = ArgAction::Set,
        default_value_t = true,
    )]
    pub ASSUME_MATE_CIGAR: bool,

    /// Regular expression that parses tile, x and y out of read names. Set to null to disable
    /// optical duplicate detection for records without an explicit location.
    #[arg(
        long = "READ_NAME_REGEX",
        value_name = "String",
        default_value = DEFAULT_READ_NAME_REGEX,
    )]
    pub READ_NAME_REGEX: String,

    /// Duplicate sets larger than this are not checked for optical duplicates.
    #[arg(
        long = "MAX_OPTICAL_DUPLICATE_SET_SIZE",
        value_name = "Long",
        default_value_t = OpticalDuplicateFinder::DEFAULT_MAX_DUPLICATE_SET_SIZE,
    )]
    pub MAX_OPTICAL_DUPLICATE_SET_SIZE: usize,

    /// Log progress every this many records; 0 disables progress logging.
    #[arg(
        long = "PROGRESS_INTERVAL",
        value_name = "Integer",
        default_value_t = MarkDuplicatesConfig::DEFAULT_PROGRESS_INTERVAL,
    )]
    pub PROGRESS_INTERVAL: usize,

    #[arg(long = "VERBOSITY", value_name = "LogLevel", default_value_t = LevelFilter::Info)]
    pub VERBOSITY: LevelFilter,
}

impl Cli {
    pub fn to_config(&self) -> MarkDuplicatesConfig {
        MarkDuplicatesConfig {
            optical_duplicate_pixel_distance: self.OPTICAL_DUPLICATE_PIXEL_DISTANCE,
            distance_metric: self.OPTICAL_DISTANCE_METRIC,
            scoring_strategy: self.DUPLICATE_SCORING_STRATEGY,
            has_mate_cigar_information: self.ASSUME_MATE_CIGAR,
            read_name_regex: match self.READ_NAME_REGEX.as_str() {
                "null" => None,
                regex => Some(regex.to_string()),
            },
            max_duplicate_set_size: self.MAX_OPTICAL_DUPLICATE_SET_SIZE,
            progress_interval: self.PROGRESS_INTERVAL,
            ..MarkDuplicatesConfig::new(self.MINIMUM_DISTANCE)
        }
    }
}

/// Reads INPUT, marks duplicates and writes OUTPUT (and METRICS_FILE when given). On any error
/// OUTPUT is removed, so a failed run never leaves a partial pass behind.
pub fn run(cli: &Cli) -> Result<(), Error> {
    let reader = BufReader::new(
        File::open(&cli.INPUT).with_context(|| format!("Failed to open {:?}", cli.INPUT))?,
    );
    let writer = BufWriter::new(
        File::create(&cli.OUTPUT).with_context(|| format!("Failed to create {:?}", cli.OUTPUT))?,
    );

    let (summary, written) = match mark_records(cli, reader, writer) {
        Ok(marked) => marked,
        Err(err) => {
            if let Err(rm_err) = std::fs::remove_file(&cli.OUTPUT) {
                mlog::warn!("Failed to remove incomplete {:?}: {}", cli.OUTPUT, rm_err);
            }
            if matches!(err.downcast_ref::<MarkDuplicatesError>(), Some(e) if e.is_configuration_error()) {
                mlog::error!("Rerun with a larger MINIMUM_DISTANCE or a corrected configuration.");
            }
            return Err(err);
        }
    };

    if let Some(path) = &cli.METRICS_FILE {
        let metrics = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {:?}", path))?,
        );
        serde_json::to_writer_pretty(metrics, &summary)?;
    }

    let mem = mem_stats().record();
    mlog::info!(
        "Wrote {} records. Memory allocated: {}, resident: {}",
        written,
        human_readable_byte_count(mem.allocated),
        human_readable_byte_count(mem.resident)
    );

    Ok(())
}

/// One full pass: every input line goes through the marker and every released record is written.
/// Stops at the first unreadable line or marking error.
fn mark_records<R: BufRead, W: Write>(
    cli: &Cli,
    reader: R,
    mut writer: W,
) -> Result<(DuplicationSummary, u64), Error> {
    let mut marker = DuplicateMarker::new(cli.to_config())?;
    let mut written = 0_u64;

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {} of {:?}", i + 1, cli.INPUT))?;
        if line.trim().is_empty() {
            continue;
        }

        let rec = serde_json::from_str::<AlignmentRecord>(&line).with_context(|| {
            format!("Failed to read record at line {} of {:?}", i + 1, cli.INPUT)
        })?;
        marker.add(rec)?;
        written += write_marked(&mut writer, marker.poll())?;
    }

    written += write_marked(&mut writer, marker.finish()?)?;
    writer.flush()?;

    let summary = marker.summary();
    if summary.records != written {
        Err(anyhow!(
            "Read {} records but wrote {}.",
            summary.records,
            written
        ))?
    }

    Ok((summary, written))
}

fn write_marked<W: Write>(writer: &mut W, marked: Vec<MarkedRecord>) -> Result<u64, Error> {
    let n = marked.len() as u64;
    for rec in marked {
        serde_json::to_writer(&mut *writer, &rec)?;
        writer.write_all(b"\n")?;
    }

    Ok(n)
}
