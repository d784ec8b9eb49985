//! Partitioning, ordering and frame bounds for window functions.
//!
//! All positions are indices into a partition sorted by the window order.
//! Frames are half-open ranges `[start, end)` over those positions.

use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::model::{Dataset, Order, Value, ValueKey, WindowFrame};

/// Column index and direction.
pub(crate) type SortSpec = Vec<(usize, Order)>;

/// Row indices grouped by partition key, in first-seen order.
pub(crate) fn partitions(data: &Dataset, columns: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: IndexMap<Vec<ValueKey>, Vec<usize>> = IndexMap::new();
    for (index, row) in data.rows().iter().enumerate() {
        let key = columns.iter().map(|&c| row[c].key()).collect();
        groups.entry(key).or_default().push(index);
    }
    groups.into_values().collect()
}

/// Ascending puts nulls first, descending puts them last.
pub(crate) fn compare_rows(data: &Dataset, a: usize, b: usize, order: &[(usize, Order)]) -> Ordering {
    let rows = data.rows();
    order
        .iter()
        .map(|&(column, direction)| {
            let ordering = rows[a][column].sort_cmp(&rows[b][column]);
            match direction {
                Order::Asc => ordering,
                Order::Desc => ordering.reverse(),
            }
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable sort of a partition by the window order.
pub(crate) fn sort(data: &Dataset, mut members: Vec<usize>, order: &[(usize, Order)]) -> Vec<usize> {
    members.sort_by(|&a, &b| compare_rows(data, a, b, order));
    members
}

/// Frame of the row at `position` within `sorted`.
pub(crate) fn frame(
    data: &Dataset,
    sorted: &[usize],
    position: usize,
    order: &[(usize, Order)],
    frame: Option<&WindowFrame>,
) -> (usize, usize) {
    let n = sorted.len();
    let (start, end) = match frame {
        None if order.is_empty() => (0, n),
        // Running frame: everything up to the current row and its peers.
        None => (0, last_peer(data, sorted, position, order) + 1),
        Some(WindowFrame::Rows { lower, upper }) => {
            let clamp = |offset: i64| (position as i64 + offset).clamp(0, n as i64) as usize;
            let start = lower.offset().map(clamp).unwrap_or(0);
            let end = upper.offset().map(|o| clamp(o + 1)).unwrap_or(n);
            (start, end)
        }
        Some(WindowFrame::Range { lower, upper }) => {
            range_frame(data, sorted, position, order, lower.offset(), upper.offset())
        }
    };
    (start, end.max(start))
}

fn last_peer(data: &Dataset, sorted: &[usize], position: usize, order: &[(usize, Order)]) -> usize {
    let mut last = position;
    while last + 1 < sorted.len()
        && compare_rows(data, sorted[last + 1], sorted[position], order) == Ordering::Equal
    {
        last += 1;
    }
    last
}

/// Rows whose (single, numeric) order value lies within the offsets of the
/// current row's value. Descending windows measure "preceding" toward larger
/// values. A null order value only frames its null peers.
fn range_frame(
    data: &Dataset,
    sorted: &[usize],
    position: usize,
    order: &[(usize, Order)],
    lower: Option<i64>,
    upper: Option<i64>,
) -> (usize, usize) {
    let n = sorted.len();
    let Some(&(column, direction)) = order.first() else {
        return (0, n);
    };
    let value_at = |p: usize| data.rows()[sorted[p]][column].as_f64();
    let current = match value_at(position) {
        Some(v) => v,
        None => {
            let first = (0..n)
                .find(|&p| data.rows()[sorted[p]][column] == Value::Null)
                .unwrap_or(position);
            let last = (0..n)
                .rev()
                .find(|&p| data.rows()[sorted[p]][column] == Value::Null)
                .unwrap_or(position);
            let start = if lower.is_none() { 0 } else { first };
            let end = if upper.is_none() { n } else { last + 1 };
            return (start, end);
        }
    };
    let sign = match direction {
        Order::Asc => 1.0,
        Order::Desc => -1.0,
    };
    // Distance from the current value in window order.
    let distance = |p: usize| value_at(p).map(|v| (v - current) * sign);
    let start = match lower {
        None => 0,
        Some(lo) => (0..n)
            .find(|&p| distance(p).map_or(false, |d| d >= lo as f64))
            .unwrap_or(n),
    };
    let end = match upper {
        None => n,
        Some(hi) => (0..n)
            .rev()
            .find(|&p| distance(p).map_or(false, |d| d <= hi as f64))
            .map(|p| p + 1)
            .unwrap_or(0),
    };
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, FrameBound, ValueType};

    fn dataset(values: &[Option<i64>]) -> Dataset {
        Dataset::from_rows(
            vec![
                Component::identifier("g", ValueType::String),
                Component::measure("x", ValueType::Int64),
            ],
            values
                .iter()
                .map(|v| vec![Value::from("a"), Value::from(*v)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_sort_and_running_frame() {
        let data = dataset(&[Some(3), Some(1), Some(3), Some(2)]);
        let order = vec![(1, Order::Asc)];
        let sorted = sort(&data, vec![0, 1, 2, 3], &order);
        assert_eq!(sorted, vec![1, 3, 0, 2]);
        // Peers of the first 3 are included.
        assert_eq!(frame(&data, &sorted, 2, &order, None), (0, 4));
        assert_eq!(frame(&data, &sorted, 1, &order, None), (0, 2));
        assert_eq!(frame(&data, &sorted, 1, &[], None), (0, 4));
    }

    #[test]
    fn test_rows_frame() {
        let data = dataset(&[Some(1), Some(2), Some(3), Some(4)]);
        let order = vec![(1, Order::Asc)];
        let sorted = sort(&data, vec![0, 1, 2, 3], &order);
        let rows = WindowFrame::Rows {
            lower: FrameBound::Preceding(1),
            upper: FrameBound::Following(1),
        };
        assert_eq!(frame(&data, &sorted, 0, &order, Some(&rows)), (0, 2));
        assert_eq!(frame(&data, &sorted, 2, &order, Some(&rows)), (1, 4));
        assert_eq!(frame(&data, &sorted, 3, &order, Some(&rows)), (2, 4));
    }

    #[test]
    fn test_range_frame() {
        let data = dataset(&[Some(1), Some(2), Some(4), Some(5)]);
        let sorted = vec![0, 1, 2, 3];
        let range = WindowFrame::Range {
            lower: FrameBound::Preceding(1),
            upper: FrameBound::CurrentRow,
        };
        let asc = vec![(1, Order::Asc)];
        assert_eq!(frame(&data, &sorted, 1, &asc, Some(&range)), (0, 2));
        assert_eq!(frame(&data, &sorted, 2, &asc, Some(&range)), (2, 3));

        let desc = vec![(1, Order::Desc)];
        let sorted = sort(&data, vec![0, 1, 2, 3], &desc);
        assert_eq!(sorted, vec![3, 2, 1, 0]);
        // 4 preceded by 5 in descending order.
        assert_eq!(frame(&data, &sorted, 1, &desc, Some(&range)), (0, 2));
    }

    #[test]
    fn test_partitions() {
        let data = Dataset::from_rows(
            vec![Component::measure("k", ValueType::String)],
            vec![vec!["b".into()], vec!["a".into()], vec!["b".into()]],
        )
        .unwrap();
        assert_eq!(partitions(&data, &[0]), vec![vec![0, 2], vec![1]]);
        assert_eq!(partitions(&data, &[]), vec![vec![0, 1, 2]]);
    }
}
