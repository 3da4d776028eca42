//! Peak detection
//!
//! Local-maximum search with two filters applied in order:
//! 1. Minimum horizontal distance, keeping the taller peak of any close pair
//! 2. Minimum topographic prominence

/// Find local maxima of `signal` at least `distance` samples apart whose
/// prominence is at least `min_prominence`. Indices are returned ascending.
pub fn find_peaks(signal: &[f64], distance: usize, min_prominence: f64) -> Vec<usize> {
    let candidates = local_maxima(signal);
    let spaced = select_by_distance(signal, &candidates, distance.max(1));

    spaced
        .into_iter()
        .filter(|&peak| prominence(signal, peak) >= min_prominence)
        .collect()
}

/// Indices of local maxima. A flat top yields its middle sample; the first
/// and last samples are never maxima.
pub fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if signal.len() < 3 {
        return peaks;
    }

    let i_max = signal.len() - 1;
    let mut i = 1;
    while i < i_max {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < i_max && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    peaks
}

/// Drop peaks closer than `distance` to a taller kept peak.
fn select_by_distance(signal: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];

    // Tallest first; ties resolved towards the later peak
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[a]].total_cmp(&signal[peaks[b]]).then(a.cmp(&b)));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Height of a peak above the higher of its two bases. Each base is the
/// minimum between the peak and the nearest higher sample (or the border).
pub fn prominence(signal: &[f64], peak: usize) -> f64 {
    let height = signal[peak];

    let mut left_min = height;
    for &v in signal[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &signal[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima() {
        let signal = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 0.0, 3.0];
        // Plateau 3..=5 reports its middle; the last sample is a border
        assert_eq!(local_maxima(&signal), vec![1, 4]);
    }

    #[test]
    fn test_local_maxima_short_or_flat() {
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
        assert!(local_maxima(&[1.0; 20]).is_empty());
        // Rising edge into a plateau that never falls is not a peak
        assert!(local_maxima(&[0.0, 1.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_distance_keeps_tallest() {
        let signal = [0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let peaks = find_peaks(&signal, 3, 0.0);
        assert_eq!(peaks, vec![3, 10]);
    }

    #[test]
    fn test_prominence() {
        let signal = [0.0, 2.0, 1.0, 3.0, 0.5, 0.0];
        // Peak at 1: left base 0, right search stops at 3 with min 1
        assert!((prominence(&signal, 1) - 1.0).abs() < 1e-12);
        // Peak at 3 is the global max: bases 0 and 0
        assert!((prominence(&signal, 3) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_prominence_filters_ripples() {
        let signal = [0.0, 2.0, 1.95, 2.05, 0.0, 0.0];
        let peaks = find_peaks(&signal, 1, 0.2);
        assert_eq!(peaks, vec![3]);
    }
}
