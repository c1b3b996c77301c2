use super::thread::CommentTree;
use super::timepoint::Timepoint;

pub(crate) const DEFAULT_BUCKET_COUNT: usize = 100;

/// Comment counts over fixed-width slices of an episode.
///
/// `x_axis[i] == i` for every bucket, and bucket `i` covers
/// `[i * bucket_width, (i + 1) * bucket_width)`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommentDensityHistogram {
    x_axis: Vec<usize>,
    y_axis: Vec<u32>,
    bucket_width: f64,
}

impl CommentDensityHistogram {
    pub(crate) fn empty(bucket_count: usize, duration: u64) -> Self {
        Self::from_sparse(&[], bucket_count, duration)
    }

    /// Expands sparse `(bucket, count)` pairs into dense axes of exactly
    /// `bucket_count` entries, filling every gap with zero.
    ///
    /// Pairs are sorted first. Repeated buckets are summed and buckets past
    /// the end are folded into the last one.
    pub(crate) fn from_sparse(sparse: &[(usize, u32)], bucket_count: usize, duration: u64) -> Self {
        let bucket_count = bucket_count.max(1);
        let last = bucket_count - 1;
        let mut pairs = sparse
            .iter()
            .map(|&(index, count)| (index.min(last), count))
            .collect::<Vec<_>>();
        pairs.sort_by_key(|&(index, _)| index);

        let mut x_axis = Vec::with_capacity(bucket_count);
        let mut y_axis: Vec<u32> = Vec::with_capacity(bucket_count);
        let mut running = 0;
        for (index, count) in pairs {
            if index < running {
                if let Some(previous) = y_axis.last_mut() {
                    *previous += count;
                }
                continue;
            }
            while running < index {
                x_axis.push(running);
                y_axis.push(0);
                running += 1;
            }
            x_axis.push(index);
            y_axis.push(count);
            running = index + 1;
        }
        while x_axis.len() < bucket_count {
            x_axis.push(running);
            y_axis.push(0);
            running += 1;
        }

        Self {
            x_axis,
            y_axis,
            bucket_width: bucket_width(duration, bucket_count),
        }
    }

    /// Groups timestamps by `floor(t / bucket_width)` into ordered sparse pairs,
    /// the shape the server returns.
    pub(crate) fn aggregate(
        timestamps: impl IntoIterator<Item = Timepoint>,
        duration: u64,
        bucket_count: usize,
    ) -> Vec<(usize, u32)> {
        let bucket_count = bucket_count.max(1);
        let width = bucket_width(duration, bucket_count);
        let mut counts = vec![0_u32; bucket_count];
        for timestamp in timestamps {
            counts[bucket_index(timestamp, width, bucket_count)] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .filter(|&(_, count)| count > 0)
            .collect()
    }

    pub(crate) fn from_tree(tree: &CommentTree, duration: u64, bucket_count: usize) -> Self {
        let sparse = Self::aggregate(tree.iter().map(|c| c.timepoint), duration, bucket_count);
        Self::from_sparse(&sparse, bucket_count, duration)
    }

    /// Re-derives the bucket width from the real episode length and pads the
    /// axes out to `bucket_count`. Surplus buckets fold into the last one.
    pub(crate) fn repad(&mut self, duration: u64, bucket_count: usize) {
        let bucket_count = bucket_count.max(1);
        if self.y_axis.len() > bucket_count {
            let overflow = self.y_axis.drain(bucket_count..).sum::<u32>();
            self.x_axis.truncate(bucket_count);
            self.y_axis[bucket_count - 1] += overflow;
        }
        while self.x_axis.len() < bucket_count {
            self.x_axis.push(self.x_axis.len());
            self.y_axis.push(0);
        }
        self.bucket_width = bucket_width(duration, bucket_count);
    }

    pub(crate) fn record(&mut self, timepoint: Timepoint) {
        if let Some(index) = self.bucket_for(timepoint) {
            self.y_axis[index] += 1;
        }
    }

    pub(crate) fn bucket_for(&self, timepoint: Timepoint) -> Option<usize> {
        if self.y_axis.is_empty() {
            return None;
        }
        Some(bucket_index(timepoint, self.bucket_width, self.y_axis.len()))
    }

    #[cfg(test)]
    pub(crate) fn x_axis(&self) -> &[usize] {
        &self.x_axis
    }

    pub(crate) fn y_axis(&self) -> &[u32] {
        &self.y_axis
    }

    pub(crate) fn bucket_width(&self) -> f64 {
        self.bucket_width
    }

    pub(crate) fn len(&self) -> usize {
        self.x_axis.len()
    }

    pub(crate) fn max_count(&self) -> u32 {
        self.y_axis.iter().copied().max().unwrap_or(0)
    }
}

fn bucket_width(duration: u64, bucket_count: usize) -> f64 {
    duration as f64 / bucket_count as f64
}

fn bucket_index(timepoint: Timepoint, width: f64, bucket_count: usize) -> usize {
    if width <= 0.0 {
        return 0;
    }
    ((timepoint.seconds() as f64 / width).floor() as usize).min(bucket_count - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_fill_produces_dense_contiguous_axes() {
        let histogram = CommentDensityHistogram::from_sparse(&[(2, 5), (5, 1)], 7, 70);
        assert_eq!(histogram.x_axis(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(histogram.y_axis(), &[0, 0, 5, 0, 0, 1, 0]);
        assert_eq!(histogram.bucket_width(), 10.0);
    }

    #[test]
    fn gap_fill_handles_empty_and_leading_bucket() {
        let empty = CommentDensityHistogram::empty(4, 40);
        assert_eq!(empty.y_axis(), &[0, 0, 0, 0]);
        assert_eq!(empty.x_axis(), &[0, 1, 2, 3]);

        let leading = CommentDensityHistogram::from_sparse(&[(0, 3)], 3, 30);
        assert_eq!(leading.y_axis(), &[3, 0, 0]);
    }

    #[test]
    fn gap_fill_sorts_merges_and_folds_overflow() {
        let histogram = CommentDensityHistogram::from_sparse(&[(3, 1), (1, 2), (1, 4), (9, 7)], 4, 40);
        assert_eq!(histogram.x_axis(), &[0, 1, 2, 3]);
        assert_eq!(histogram.y_axis(), &[0, 6, 0, 8]);
    }

    #[test]
    fn aggregate_groups_by_floor_of_bucket_width() {
        let stamps = [0, 5, 9, 10, 35, 40].map(Timepoint::from_secs);
        let sparse = CommentDensityHistogram::aggregate(stamps, 40, 4);
        assert_eq!(sparse, vec![(0, 3), (1, 1), (3, 2)]);
    }

    #[test]
    fn aggregate_with_zero_duration_uses_first_bucket() {
        let sparse = CommentDensityHistogram::aggregate([Timepoint::from_secs(3)], 0, 10);
        assert_eq!(sparse, vec![(0, 1)]);
    }

    #[test]
    fn record_and_repad_follow_duration() {
        let mut histogram = CommentDensityHistogram::from_sparse(&[(1, 1)], 6, 0);
        histogram.repad(600, 10);
        assert_eq!(histogram.len(), 10);
        assert_eq!(histogram.bucket_width(), 60.0);
        histogram.record(Timepoint::from_secs(125));
        histogram.record(Timepoint::from_secs(10_000));
        assert_eq!(histogram.y_axis()[2], 1);
        assert_eq!(histogram.y_axis()[9], 1);
        assert_eq!(histogram.max_count(), 1);
        assert_eq!(histogram.x_axis(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn repad_folds_surplus_buckets() {
        let mut histogram = CommentDensityHistogram::from_sparse(&[(1, 2), (3, 1), (4, 5)], 5, 50);
        histogram.repad(30, 3);
        assert_eq!(histogram.x_axis(), &[0, 1, 2]);
        assert_eq!(histogram.y_axis(), &[0, 2, 6]);
        assert_eq!(histogram.bucket_width(), 10.0);
    }
}
