use std::cmp::Ordering;

/// Truncation selection: indices of the `n` highest values, best first.
///
/// Ties keep their original order. NaN values rank last. If `n` exceeds the
/// number of values every index is returned.
pub fn select_top(values: &[f64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| descending(values[a], values[b]));
    order.truncate(n);
    order
}

/// Selection intensity realised by keeping `n_selected` of `values`:
/// the selection differential in standard-deviation units.
///
/// Returns `None` if nothing is selected or the values have no spread.
pub fn selection_differential(values: &[f64], n_selected: usize) -> Option<f64> {
    let n = values.len();
    if n < 2 || n_selected == 0 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    if var <= 0.0 {
        return None;
    }
    let chosen = select_top(values, n_selected);
    let selected_mean = chosen.iter().map(|&i| values[i]).sum::<f64>() / chosen.len() as f64;
    Some((selected_mean - mean) / var.sqrt())
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
