//! Pooling of scalar metrics within brain regions.
//!
//! Given a label volume and a set of co-registered scalar volumes, compute the mean of each
//! scalar within each labeled region. Missing data (NaN voxels) is skipped, and regions without
//! any usable voxel produce NaN cells instead of errors.

use ndarray::{Array1, ArrayD};
use ndarray_stats::MaybeNanExt;
use tracing::{debug, warn};

use crate::error::{Result, RoiMetricsError};
use crate::table::{region_label, MetricRow, ResultTable};
use crate::volume::{check_alignment, check_shape, GridTolerance, LabelVolume, ScalarVolume};


/// An ordered set of named scalar volumes. The insertion order determines the metric column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricVolumes {
    entries: Vec<(String, ScalarVolume)>,
}

impl MetricVolumes {
    pub fn new() -> MetricVolumes {
        MetricVolumes::default()
    }

    /// Append a metric. Fails if a metric with the same name is already present.
    pub fn insert<S: Into<String>>(&mut self, name: S, volume: ScalarVolume) -> Result<()> {
        let name = name.into();
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(RoiMetricsError::DuplicateMetricName(name));
        }
        self.entries.push((name, volume));
        Ok(())
    }

    /// Builder style variant of [`MetricVolumes::insert`].
    pub fn with<S: Into<String>>(mut self, name: S, volume: ScalarVolume) -> Result<MetricVolumes> {
        self.insert(name, volume)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ScalarVolume> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarVolume)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}


/// Compute the mean of every metric within every region of the label volume.
///
/// Regions are the distinct non-zero values of `labels`, reported in ascending order with
/// region labels of the form `region_<id>`. The background value `0` is never reported.
/// Within a region, NaN voxels are ignored; a region whose voxels are all NaN for a metric
/// gets a NaN cell for that metric.
///
/// All scalar volumes must have the same shape and (within the default [`GridTolerance`]) the
/// same affine as `labels`, otherwise the call fails and no table is produced.
///
/// # Examples
///
/// ```
/// use ndarray::arr1;
/// use roimetrics::{aggregate, Affine, LabelVolume, MetricVolumes, ScalarVolume};
///
/// let labels = LabelVolume::new(arr1(&[0, 1, 1, 2]), Affine::identity());
/// let fa = ScalarVolume::new(arr1(&[9.0, 0.2, 0.4, 0.5]), Affine::identity());
/// let metrics = MetricVolumes::new().with("FA", fa).unwrap();
///
/// let table = aggregate(&labels, &metrics, "subject1").unwrap();
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.rows()[0].region, "region_1");
/// ```
pub fn aggregate(labels: &LabelVolume, metrics: &MetricVolumes, subject_id: &str) -> Result<ResultTable> {
    aggregate_with_tolerance(labels, metrics, subject_id, &GridTolerance::default())
}

/// Like [`aggregate`], with an explicit tolerance for the affine comparison.
pub fn aggregate_with_tolerance(
    labels: &LabelVolume,
    metrics: &MetricVolumes,
    subject_id: &str,
    tol: &GridTolerance,
) -> Result<ResultTable> {
    for (name, volume) in metrics.iter() {
        check_shape(labels, name, volume)?;
    }
    for (name, volume) in metrics.iter() {
        check_alignment(labels, name, volume, tol)?;
    }

    let mut table = ResultTable::new(metrics.names());
    let region_ids = labels.region_ids();
    if region_ids.is_empty() {
        warn!("Label volume for subject '{}' contains no labeled voxels.", subject_id);
        return Ok(table);
    }
    debug!(
        "Aggregating {} metrics over {} regions for subject '{}'.",
        metrics.len(),
        region_ids.len(),
        subject_id
    );

    for region in region_ids {
        let mask = labels.data.mapv(|v| v == region);
        let values = region_means(&mask, metrics);
        table.push(MetricRow {
            subject: subject_id.to_string(),
            region: region_label(region),
            region_id: Some(region),
            values,
        });
    }
    Ok(table)
}


/// Compute metric means within a list of named binary masks.
///
/// Each mask selects its voxels with a value above `0` and produces one row labeled with the
/// mask's name, in the order the masks are given. This is the natural fit for per-ROI mask files
/// named after the region they contain. An empty mask yields NaN cells.
pub fn aggregate_masks(masks: &[(String, LabelVolume)], metrics: &MetricVolumes, subject_id: &str) -> Result<ResultTable> {
    let tol = GridTolerance::default();
    for (mask_name, mask) in masks {
        for (name, volume) in metrics.iter() {
            check_shape(mask, &mask_volume_name(name, mask_name), volume)?;
        }
    }
    for (mask_name, mask) in masks {
        for (name, volume) in metrics.iter() {
            check_alignment(mask, &mask_volume_name(name, mask_name), volume, &tol)?;
        }
    }

    let mut table = ResultTable::new(metrics.names());
    for (mask_name, mask) in masks {
        let selected = mask.data.mapv(|v| v > 0);
        if !selected.iter().any(|m| *m) {
            warn!("Mask '{}' of subject '{}' selects no voxels.", mask_name, subject_id);
        }
        table.push(MetricRow {
            subject: subject_id.to_string(),
            region: mask_name.clone(),
            region_id: None,
            values: region_means(&selected, metrics),
        });
    }
    Ok(table)
}


fn mask_volume_name(metric: &str, mask: &str) -> String {
    format!("{} (mask '{}')", metric, mask)
}

fn region_means(mask: &ArrayD<bool>, metrics: &MetricVolumes) -> Vec<f64> {
    metrics
        .iter()
        .map(|(_, volume)| nan_mean(&masked_values(&volume.data, mask)))
        .collect()
}

/// Select the voxel values under a mask of the same shape, in logical iteration order.
pub fn masked_values(data: &ArrayD<f64>, mask: &ArrayD<bool>) -> Array1<f64> {
    data.iter()
        .zip(mask.iter())
        .filter(|(_, selected)| **selected)
        .map(|(v, _)| *v)
        .collect()
}

/// Arithmetic mean of the non-NaN values. NaN if there are none.
pub fn nan_mean(values: &Array1<f64>) -> f64 {
    let (sum, count) = values.fold_skipnan((0.0, 0usize), |(sum, count), v| (sum + v.raw(), count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::volume::Affine;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array3};

    fn scalar(values: &[f64]) -> ScalarVolume {
        ScalarVolume::new(arr1(values), Affine::identity())
    }

    #[test]
    fn nan_mean_skips_missing_values() {
        assert_abs_diff_eq!(nan_mean(&arr1(&[1.0, f64::NAN, 3.0])), 2.0);
        assert!(nan_mean(&arr1(&[f64::NAN, f64::NAN])).is_nan());
        assert!(nan_mean(&Array1::<f64>::zeros(0)).is_nan());
    }

    #[test]
    fn duplicate_metric_names_are_rejected() {
        let mut metrics = MetricVolumes::new();
        metrics.insert("FA", scalar(&[1.0])).unwrap();
        let res = metrics.insert("FA", scalar(&[2.0]));
        assert!(matches!(res, Err(RoiMetricsError::DuplicateMetricName(ref n)) if n == "FA"));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn metric_columns_follow_insertion_order() {
        let labels = LabelVolume::new(arr1(&[1, 1, 2]), Affine::identity());
        let metrics = MetricVolumes::new()
            .with("T1", scalar(&[1.0, 3.0, 5.0]))
            .unwrap()
            .with("FA", scalar(&[0.1, 0.3, 0.5]))
            .unwrap();
        let table = aggregate(&labels, &metrics, "sub-01").unwrap();

        assert_eq!(table.columns(), vec!["subject", "region", "T1", "FA"]);
        assert_abs_diff_eq!(table.rows()[0].values[0], 2.0);
        assert_abs_diff_eq!(table.rows()[0].values[1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(table.rows()[1].values[0], 5.0);
    }

    #[test]
    fn negative_region_ids_are_reported_in_numeric_order() {
        let labels = LabelVolume::new(arr1(&[3, -1, 0, 10]), Affine::identity());
        let metrics = MetricVolumes::new().with("x", scalar(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        let table = aggregate(&labels, &metrics, "s").unwrap();
        let regions: Vec<&str> = table.rows().iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["region_-1", "region_3", "region_10"]);
    }

    #[test]
    fn no_metrics_still_lists_regions() {
        let labels = LabelVolume::new(arr1(&[0, 4, 4]), Affine::identity());
        let table = aggregate(&labels, &MetricVolumes::new(), "s").unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.rows()[0].values.is_empty());
        assert_eq!(table.columns().len(), 2);
    }

    #[test]
    fn masks_pool_all_non_zero_voxels() {
        let shape = (2, 2, 1);
        let mask_a = LabelVolume::new(Array3::from_shape_vec(shape, vec![1, 1, 0, 0]).unwrap(), Affine::identity());
        let mask_b = LabelVolume::new(Array3::from_shape_vec(shape, vec![0, 0, 2, 5]).unwrap(), Affine::identity());
        let empty = LabelVolume::new(Array3::<i64>::zeros(shape), Affine::identity());
        let fa = ScalarVolume::new(Array3::from_shape_vec(shape, vec![0.2, 0.4, 0.6, f64::NAN]).unwrap(), Affine::identity());
        let metrics = MetricVolumes::new().with("FA", fa).unwrap();

        let masks = vec![
            (String::from("cst_left"), mask_a),
            (String::from("cst_right"), mask_b),
            (String::from("nothing"), empty),
        ];
        let table = aggregate_masks(&masks, &metrics, "sub-02").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].region, "cst_left");
        assert_eq!(table.rows()[0].region_id, None);
        assert_abs_diff_eq!(table.rows()[0].values[0], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(table.rows()[1].values[0], 0.6, epsilon = 1e-12);
        assert!(table.rows()[2].values[0].is_nan());
    }

    #[test]
    fn negative_mask_voxels_are_not_selected() {
        let mask = LabelVolume::new(arr1(&[1, -1, 0]), Affine::identity());
        let metrics = MetricVolumes::new().with("FA", scalar(&[1.0, 100.0, 5.0])).unwrap();
        let table = aggregate_masks(&[(String::from("roi"), mask)], &metrics, "s").unwrap();
        assert_abs_diff_eq!(table.rows()[0].values[0], 1.0);
    }

    #[test]
    fn shape_errors_win_over_earlier_alignment_errors() {
        let labels = LabelVolume::new(arr1(&[1, 2]), Affine::identity());
        let metrics = MetricVolumes::new()
            .with("FA", ScalarVolume::new(arr1(&[0.1, 0.2]), Affine::from_voxel_sizes([2.0, 2.0, 2.0])))
            .unwrap()
            .with("MD", scalar(&[0.1, 0.2, 0.3]))
            .unwrap();
        match aggregate(&labels, &metrics, "s") {
            Err(RoiMetricsError::Shape(name, _, _)) => assert_eq!(name, "MD"),
            other => panic!("expected a shape error, got {:?}", other),
        }

        let mask = LabelVolume::new(arr1(&[1, 1]), Affine::identity());
        let res = aggregate_masks(&[(String::from("roi"), mask)], &metrics, "s");
        assert!(matches!(res, Err(RoiMetricsError::Shape(..))));
    }

    #[test]
    fn misaligned_masks_are_rejected() {
        let mask = LabelVolume::new(arr1(&[1, 1]), Affine::from_voxel_sizes([2.0, 2.0, 2.0]));
        let metrics = MetricVolumes::new().with("FA", scalar(&[0.1, 0.2])).unwrap();
        let res = aggregate_masks(&[(String::from("roi"), mask)], &metrics, "s");
        assert!(matches!(res, Err(RoiMetricsError::Alignment(_))));
    }
}
