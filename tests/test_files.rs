use std::fs;

use approx::assert_abs_diff_eq;
use ndarray::Array3;

use roimetrics::{
    aggregate, read_label_volume, read_scalar_volume, write_scalar_volume, Affine, ColorLut, MetricVolumes,
    RunConfig, ScalarVolume,
};

fn demo_affine() -> Affine {
    Affine::from_rows([[1.5, 0.0, 0.0, -12.0], [0.0, 1.5, 0.0, -8.0], [0.0, 0.0, 1.5, 4.0]])
}

#[test]
fn metrics_can_be_extracted_from_nifti_files() {
    let dir = tempfile::tempdir().unwrap();
    let aff = demo_affine();

    let labels = Array3::from_shape_fn((3, 3, 2), |(i, _, _)| if i == 0 { 0.0 } else if i == 1 { 17.0 } else { 53.0 });
    let fa = Array3::from_shape_fn((3, 3, 2), |(i, _, k)| 0.1 * i as f64 + 0.01 * k as f64);
    let label_path = dir.path().join("aseg.nii.gz");
    let fa_path = dir.path().join("fa.nii");
    write_scalar_volume(&label_path, &ScalarVolume::new(labels, aff)).unwrap();
    write_scalar_volume(&fa_path, &ScalarVolume::new(fa, aff)).unwrap();

    let labels = read_label_volume(&label_path).unwrap();
    assert_eq!(labels.region_ids(), vec![17, 53]);
    let metrics = MetricVolumes::new().with("FA", read_scalar_volume(&fa_path).unwrap()).unwrap();

    let mut table = aggregate(&labels, &metrics, "sub-01").unwrap();
    assert_abs_diff_eq!(table.value("region_17", "FA").unwrap(), 0.105, epsilon = 1e-6);
    assert_abs_diff_eq!(table.value("region_53", "FA").unwrap(), 0.205, epsilon = 1e-6);

    let lut = ColorLut::from_reader("17 Left-Hippocampus 220 216 20 0\n".as_bytes()).unwrap();
    table.rename_regions(&lut);

    let csv_path = dir.path().join("metrics.csv");
    table.to_csv_file(&csv_path).unwrap();
    let text = fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "subject,region,FA");
    assert!(lines[1].starts_with("sub-01,Left-Hippocampus,"));
    assert!(lines[2].starts_with("sub-01,region_53,"));
}

#[test]
fn non_integer_label_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prob.nii");
    let data = Array3::from_elem((2, 2, 2), 0.5);
    write_scalar_volume(&path, &ScalarVolume::new(data, Affine::identity())).unwrap();

    let res = read_label_volume(&path);
    assert!(matches!(res, Err(roimetrics::RoiMetricsError::InvalidLabelValue(_))));
}

#[test]
fn run_configs_load_their_scalars() {
    let dir = tempfile::tempdir().unwrap();
    let fa_path = dir.path().join("fa.nii.gz");
    write_scalar_volume(&fa_path, &ScalarVolume::new(Array3::from_elem((2, 2, 2), 0.3), demo_affine())).unwrap();

    let cfg_path = dir.path().join("run.json");
    let cfg_text = serde_json::json!({
        "subject": "sub-02",
        "labels": dir.path().join("aseg.nii.gz"),
        "output": dir.path().join("out.csv"),
        "scalars": [{"name": "FA", "path": fa_path}],
    });
    fs::write(&cfg_path, cfg_text.to_string()).unwrap();

    let cfg = RunConfig::from_file(&cfg_path).unwrap();
    let metrics = cfg.load_metrics().unwrap();
    assert_eq!(metrics.names(), vec![String::from("FA")]);
    assert!(metrics.get("FA").unwrap().affine.approx_eq(&demo_affine(), &Default::default()));
}
