pub fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;

            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Words per minute from a whitespace-separated word count; 0 before any time has passed.
pub fn words_per_minute(words: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        words as f64 / elapsed_secs * 60.0
    } else {
        0.0
    }
}

/// `part / whole` as a percentage clamped to `[0, 100]`; 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}
