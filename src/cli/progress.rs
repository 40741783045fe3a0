use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bar over one track's samples, or a spinner when the length is unknown.
pub fn create_track_bar(
    multi: &MultiProgress,
    total_samples: Option<u64>,
    name: &str,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_samples {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} samples ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} samples\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb
    };
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message(name.to_string());
    Ok(pb)
}

/// Bar over the tracks of an `info` run.
pub fn create_scan_bar(multi: &MultiProgress, tracks: usize) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new(tracks as u64));
    pb.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} tracks\n{msg}",
    )?);
    Ok(pb)
}
