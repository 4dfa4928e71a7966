//! Vector files on disk: extension dispatch, CRS handling and rewrite

use approx::assert_relative_eq;
use geo::{Coord, CoordsIter, Geometry};
use std::fs;
use tempfile::TempDir;
use zonestat_core::io::{read_vector, write_geojson, VECTOR_EXTENSIONS};
use zonestat_core::{AttributeValue, Transformer, CRS};

const PLOTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "id": 1, "properties": {"plot": "A", "year": 2019},
     "geometry": {"type": "Point", "coordinates": [-3.0, 40.0]}},
    {"type": "Feature", "id": 2, "properties": {"plot": "B", "year": null},
     "geometry": {"type": "Polygon", "coordinates": [[[-3.1, 40.0], [-3.0, 40.0], [-3.0, 40.1], [-3.1, 40.0]]]}}
  ]
}"#;

#[test]
fn geojson_dispatch_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    for name in ["plots.geojson", "PLOTS2.GeoJSON", "plots3.json"] {
        let path = dir.path().join(name);
        fs::write(&path, PLOTS).unwrap();
        let dataset = read_vector(&path).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.crs.as_ref().and_then(CRS::epsg), Some(4326));
    }
    assert!(VECTOR_EXTENSIONS.contains(&"gpkg"));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plots.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();
    assert!(matches!(
        read_vector(&path),
        Err(zonestat_core::Error::UnsupportedFormat(_))
    ));
}

#[test]
fn reprojected_dataset_survives_rewrite() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("plots.geojson");
    fs::write(&input, PLOTS).unwrap();
    let mut dataset = read_vector(&input).unwrap();

    let utm = CRS::from_epsg(32630);
    let transformer = Transformer::new(&CRS::wgs84(), &utm).unwrap();
    for feature in &mut dataset.features {
        let moved = feature
            .geometry
            .as_ref()
            .map(|g| transformer.transform_geometry(g).unwrap());
        feature.geometry = moved;
    }
    dataset.crs = Some(utm);

    let output = dir.path().join("out").join("plots_utm.geojson");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    write_geojson(&dataset, &output).unwrap();

    let reread = read_vector(&output).unwrap();
    assert_eq!(reread.crs.as_ref().and_then(CRS::epsg), Some(32630));
    assert_eq!(reread.features[0].get_property("plot"), Some(&AttributeValue::String("A".into())));
    assert_eq!(reread.features[1].get_property("year"), Some(&AttributeValue::Null));

    // -3 degrees is the central meridian of zone 30
    match &reread.features[0].geometry {
        Some(Geometry::Point(p)) => {
            assert_relative_eq!(p.x(), 500_000.0, epsilon = 1e-3);
            assert_relative_eq!(p.y(), 4_427_757.0, epsilon = 1.0);
        }
        other => panic!("unexpected geometry {:?}", other),
    }
    let ring: Vec<Coord<f64>> = reread.features[1]
        .geometry
        .as_ref()
        .unwrap()
        .coords_iter()
        .collect();
    assert_eq!(ring.len(), 4);
    assert!(ring.iter().all(|c| c.x > 400_000.0 && c.x < 600_000.0));
}

const ESRI_UTM30N: &str = r#"PROJCS["WGS_1984_UTM_Zone_30N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",-3.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

/// Clockwise square, as shapefile outer rings are stored
fn shp_square(x0: f64, y0: f64, size: f64) -> shapefile::Polygon {
    use shapefile::{Point, PolygonRing};
    let (x1, y1) = (x0 + size, y0 + size);
    shapefile::Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y1),
        Point::new(x1, y1),
        Point::new(x1, y0),
        Point::new(x0, y0),
    ]))
}

#[test]
fn shapefile_with_sidecars() {
    use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plots.shp");
    let table = TableWriterBuilder::new()
        .add_character_field("plot".try_into().unwrap(), 10)
        .add_numeric_field("area".try_into().unwrap(), 10, 2);
    let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
    for (name, x0, area) in [("A", 500_000.0, 100.0), ("B", 500_020.0, 12.5)] {
        let mut record = Record::default();
        record.insert("plot".to_string(), FieldValue::Character(Some(name.to_string())));
        record.insert("area".to_string(), FieldValue::Numeric(Some(area)));
        writer
            .write_shape_and_record(&shp_square(x0, 4_000_000.0, 10.0), &record)
            .unwrap();
    }
    drop(writer);
    fs::write(dir.path().join("plots.prj"), ESRI_UTM30N).unwrap();

    let dataset = read_vector(&path).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.crs.as_ref().and_then(CRS::epsg), Some(32630));

    let second = &dataset.features[1];
    let keys: Vec<&str> = second.properties.keys().collect();
    assert_eq!(keys, ["plot", "area"]);
    assert_eq!(second.get_property("plot"), Some(&AttributeValue::String("B".into())));
    assert_eq!(second.get_property("area"), Some(&AttributeValue::Float(12.5)));

    let xs: Vec<f64> = second
        .geometry
        .as_ref()
        .unwrap()
        .coords_iter()
        .map(|c| c.x)
        .collect();
    assert!(xs.iter().all(|&x| (500_020.0..=500_030.0).contains(&x)));
}

#[test]
fn shapefile_without_prj_has_no_crs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bare.shp");
    let mut writer = shapefile::ShapeWriter::from_path(&path).unwrap();
    writer.write_shape(&shapefile::Point::new(1.0, 2.0)).unwrap();
    drop(writer);

    let dataset = read_vector(&path).unwrap();
    assert_eq!(dataset.len(), 1);
    assert!(dataset.crs.is_none());
    assert!(dataset.features[0].properties.is_empty());
    assert!(matches!(dataset.features[0].geometry, Some(Geometry::Point(_))));
}
