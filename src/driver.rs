//! Sequencing loop: enumerate, process, commit, report.

use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::discover;
use crate::error::Result;
use crate::pipeline::{process_log_file, process_song_file};
use crate::progress::{create_progress_bar, log_progress};
use crate::stats::RunSummary;
use crate::store::{FileWriter, Warehouse};

/// Run `func` over every data file under `root`, one transaction per file.
///
/// Row-level problems are absorbed by `func`; an error returned here (an
/// unreadable file, a failed commit) stops the run.
pub fn process_data<F>(
    warehouse: &mut Warehouse,
    root: &Path,
    func: F,
    summary: &mut RunSummary,
    log_only: bool,
) -> Result<()>
where
    F: Fn(&FileWriter<'_>, &Path, &mut RunSummary) -> Result<()>,
{
    let files = discover::json_files(root)?;
    let total = files.len();
    summary.files_found += total;
    info!("{} files found in {}", total, root.display());

    let pb = create_progress_bar(total as u64, &format!("Loading {}", root.display()), log_only);
    for (i, datafile) in files.iter().enumerate() {
        let writer = warehouse.begin_file()?;
        func(&writer, datafile, summary)?;
        writer.commit()?;
        summary.files_processed += 1;
        log_progress(&pb, i + 1, total);
    }
    pb.finish_with_message(format!("Loaded {} files from {}", total, root.display()));

    Ok(())
}

/// Song pipeline first so the catalog is in place before plays resolve.
pub fn run(
    warehouse: &mut Warehouse,
    song_data: &Path,
    log_data: &Path,
    log_only: bool,
) -> Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary {
        songplay_conflict: warehouse.queries().songplay_conflict.as_str(),
        ..Default::default()
    };
    info!("Songplay conflict policy: {}", summary.songplay_conflict);

    process_data(warehouse, song_data, process_song_file, &mut summary, log_only)?;
    process_data(warehouse, log_data, process_log_file, &mut summary, log_only)?;

    summary.elapsed_seconds = start.elapsed().as_secs_f64();
    Ok(summary)
}
