//! Runs the `zonestat` binary and checks exit codes and outputs

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use zonestat_core::io::write_geotiff;
use zonestat_core::{GeoTransform, Raster, CRS};

fn zonestat() -> Command {
    Command::new(env!("CARGO_BIN_EXE_zonestat"))
}

fn write_layer(path: &Path, value: f64) {
    let mut raster: Raster<f64> = Raster::filled(4, 4, value);
    raster.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
    raster.set_crs(Some(CRS::wgs84()));
    write_geotiff(&raster, path).unwrap();
}

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_layer(&dir.path().join("ohm.tif"), 2.0);
    write_layer(&dir.path().join("slope.tif"), 15.0);
    fs::create_dir_all(dir.path().join("in")).unwrap();
    fs::write(
        dir.path().join("in/plot.geojson"),
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"id": 7},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}}]}"#,
    )
    .unwrap();
    dir
}

fn base_args(dir: &Path) -> Vec<String> {
    let log_file = dir.join("logs").join("run.log");
    vec![
        "-o".into(),
        "ohm.tif".into(),
        "-s".into(),
        "slope.tif".into(),
        "-i".into(),
        "in".into(),
        "--out".into(),
        "out".into(),
        "--nodata".into(),
        "-1".into(),
        "--no-progress".into(),
        "--log-file".into(),
        log_file.display().to_string(),
    ]
}

#[test]
fn successful_run_exits_zero() {
    let dir = setup();
    let status = zonestat()
        .current_dir(dir.path())
        .args(base_args(dir.path()))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let text = fs::read_to_string(dir.path().join("out/plot_zonal_stats.geojson")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let props = &value["features"][0]["properties"];
    assert_eq!(props["id"], 7);
    assert_eq!(props["ohm_count"], 4);
    assert_eq!(props["slope_mean"], 15.0);

    assert!(dir.path().join("out/processing_summary.json").is_file());
    let log = fs::read_to_string(dir.path().join("logs/run.log")).unwrap();
    assert!(log.contains("plot.geojson"));
}

#[test]
fn failed_file_exits_one() {
    let dir = setup();
    fs::write(dir.path().join("in/broken.geojson"), "{ nope").unwrap();
    let status = zonestat()
        .current_dir(dir.path())
        .args(base_args(dir.path()))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert!(dir.path().join("out/plot_zonal_stats.geojson").is_file());
}

#[test]
fn missing_raster_exits_one() {
    let dir = setup();
    fs::remove_file(dir.path().join("ohm.tif")).unwrap();
    let status = zonestat()
        .current_dir(dir.path())
        .args(base_args(dir.path()))
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert!(!dir.path().join("out/processing_summary.json").exists());
}

#[test]
fn usage_error_exits_two() {
    let status = zonestat().arg("--ohm-raster").status().unwrap();
    assert_eq!(status.code(), Some(2));
}
