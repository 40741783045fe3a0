/// Formats a sample count at `sample_rate` as `HH:MM:SS.mmm`.
pub fn clock_str(samples: u64, sample_rate: u32) -> String {
    let rate = sample_rate.max(1) as u64;
    let total_ms = samples * 1000 / rate;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);

    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[test]
fn formats_sample_positions() {
    assert_eq!(clock_str(0, 8000), "00:00:00.000");
    assert_eq!(clock_str(16_000, 8000), "00:00:02.000");
    assert_eq!(clock_str(8000 * 3723 + 4, 8000), "01:02:03.000");
    assert_eq!(clock_str(12, 8000), "00:00:00.001");
}
