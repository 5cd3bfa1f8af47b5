use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use eccodes_metadata::{
    metadata::INTERNAL_KEYS, BoundingBox, CodesError, DynamicKeyType, FallibleIterator,
    FieldMetadata, Grid, GridShape, GridSpec, GridType, KeyRead, KeyStore, LibraryVersion,
    MemoryKeyStore, MetadataPatch, RestrictedMetadata, Resolution, StandaloneMetadata,
};
use float_cmp::assert_approx_eq;

/// 2t on a 1 degree global lat-lon grid
fn regular_ll_field() -> Result<MemoryKeyStore> {
    let mut store = MemoryKeyStore::new()
        .with_key("edition", 2)
        .with_key("shortName", "2t")
        .with_key("paramId", 167)
        .with_key("bitsPerValue", 16)
        .with_key("dataDate", 20_240_301)
        .with_key("dataTime", 1200)
        .with_key("validityDate", 20_240_302)
        .with_key("validityTime", 0)
        .with_key("step", 12)
        .with_key("gridType", "regular_ll")
        .with_key("Ni", 360)
        .with_key("Nj", 181)
        .with_key("iDirectionIncrementInDegrees", 1.0)
        .with_key("jDirectionIncrementInDegrees", 1.0)
        .with_key("DxInDegrees", 1.0)
        .with_key("DyInDegrees", 1.0)
        .with_key("latitudeOfFirstGridPointInDegrees", 90.0)
        .with_key("longitudeOfFirstGridPointInDegrees", 0.0)
        .with_key("latitudeOfLastGridPointInDegrees", -90.0)
        .with_key("longitudeOfLastGridPointInDegrees", 359.0)
        .with_key("iScansNegatively", 0)
        .with_key("jScansPositively", 0)
        .with_key("max", 315.25)
        .with_key("min", 210.5)
        .with_namespace("parameter", &["shortName", "paramId"])
        .with_namespace("statistics", &["max", "min"]);

    store.set_values(&vec![273.15; 360 * 181])?;
    Ok(store)
}

#[test]
fn regular_lat_lon_field() -> Result<()> {
    let store = regular_ll_field()?;
    let metadata = FieldMetadata::new(&store);

    let gridspec = metadata.gridspec()?;
    assert_eq!(gridspec.grid_type, GridType::RegularLl);
    assert_eq!(gridspec.grid, Grid::Increments([1.0, 1.0]));
    assert_eq!(gridspec.area, Some([90.0, 0.0, -90.0, 359.0]));

    let geography = metadata.geography()?;
    assert!(!geography.is_rotated());
    assert_eq!(geography.shape()?, GridShape::Structured(181, 360));
    assert_eq!(geography.resolution()?, Resolution::Degrees(1.0));
    assert_eq!(
        geography.bounding_box()?,
        BoundingBox {
            north: 90.0,
            west: 0.0,
            south: -90.0,
            east: 359.0
        }
    );

    let base = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .context("invalid test datetime")?;
    let valid = metadata.valid_datetime()?.context("no valid datetime")?;

    assert_eq!(metadata.base_datetime()?, Some(base));
    assert_eq!(valid - base, Duration::hours(12));
    assert_eq!(metadata.step_timedelta()?, Some(Duration::hours(12)));
    Ok(())
}

#[test]
fn override_to_octahedral_grid() -> Result<()> {
    let store = regular_ll_field()?;
    let metadata = FieldMetadata::new(&store);

    let patch = MetadataPatch::new()
        .key("shortName", "2d")
        .gridspec(GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into())));
    let new = metadata.override_with(patch)?;

    match new.get("values")? {
        Some(DynamicKeyType::FloatArray(values)) => {
            assert_eq!(values.len(), 5248);
            assert!(values.iter().all(|v| *v == 0.0));
        }
        other => panic!("Incorrect values: {other:?}"),
    }

    assert_eq!(new.require_key::<String>("shortName")?, "2d");
    assert_eq!(new.require_key::<i64>("bitsPerValue")?, 16);
    assert_eq!(new.gridspec()?.grid, Grid::Name("O32".into()));

    // nothing of the lat-lon geometry is left
    assert_eq!(new.geography()?.shape()?, GridShape::Unstructured(5248));
    assert_eq!(new.get("Ni")?, None);
    assert_eq!(new.get("iDirectionIncrementInDegrees")?, None);
    assert_eq!(new.get("latitudeOfLastGridPointInDegrees")?, None);

    // the field is untouched
    assert_eq!(metadata.require_key::<String>("shortName")?, "2t");
    assert_eq!(metadata.require_key::<String>("gridType")?, "regular_ll");
    assert_eq!(store.value_count()?, 360 * 181);
    Ok(())
}

#[test]
fn override_to_regular_gaussian_grid() -> Result<()> {
    let store = regular_ll_field()?;
    let metadata = FieldMetadata::new(&store);

    let f48 = GridSpec::new(GridType::RegularGg, Grid::Name("F48".into()));
    let new = metadata.override_with(MetadataPatch::new().gridspec(f48))?;

    assert_eq!(new.require_key::<i64>("numberOfDataPoints")?, 96 * 192);
    assert_eq!(new.geography()?.shape()?, GridShape::Structured(96, 192));
    assert_eq!(metadata.geography()?.shape()?, GridShape::Structured(181, 360));
    Ok(())
}

#[test]
fn override_without_known_size_keeps_values_empty() -> Result<()> {
    let store = regular_ll_field()?;
    let metadata = FieldMetadata::new(&store);

    let n320 = GridSpec::new(GridType::ReducedGg, Grid::Name("N320".into()));
    let new = metadata.override_with(MetadataPatch::new().gridspec(n320))?;

    // classic reduced grids have no closed form size, the value buffer is left as cloned
    assert_eq!(new.get("values")?, None);
    assert_eq!(new.require_key::<String>("gridType")?, "reduced_gg");
    Ok(())
}

#[test]
fn overrides_chain() -> Result<()> {
    let store = regular_ll_field()?;
    let metadata = FieldMetadata::new(&store);

    let first = metadata.override_with(MetadataPatch::new().key("level", 850))?;
    let second = first.override_with(MetadataPatch::new().key("typeOfLevel", "isobaricInhPa"))?;

    assert_eq!(second.require_key::<i64>("level")?, 850);
    assert_eq!(second.require_key::<String>("typeOfLevel")?, "isobaricInhPa");
    assert_eq!(first.get("typeOfLevel")?, None);
    Ok(())
}

#[test]
fn internal_keys_are_hidden() -> Result<()> {
    let mut store = MemoryKeyStore::new()
        .with_key("shortName", "2t")
        .with_key("bitsPerValue", 12);
    for (i, key) in INTERNAL_KEYS.iter().enumerate() {
        if *key != "values" {
            store.set(key, &DynamicKeyType::Int(i64::try_from(i)?))?;
        }
    }
    store.set_values(&[1.0, 2.0])?;

    let restricted = StandaloneMetadata::new(store).hide_internal_keys();

    for key in INTERNAL_KEYS {
        assert_eq!(restricted.get(key)?, None, "{key} is visible");
        assert!(!restricted.contains(key)?, "{key} is contained");
        assert!(restricted.get(&format!("grib.{key}"))?.is_some(), "{key} not escaped");
    }

    let keys = restricted.keys()?;
    assert!(keys.iter().all(|k| !INTERNAL_KEYS.contains(&k.as_str())));
    assert!(keys.contains(&"shortName".to_string()));
    assert!(keys.contains(&"bitsPerValue".to_string()));

    let items: Vec<(String, DynamicKeyType)> = restricted.items()?.collect()?;
    assert_eq!(items.len(), keys.len());
    Ok(())
}

#[test]
fn restricted_view_survives_override_and_buffer() -> Result<()> {
    let store = regular_ll_field()?;
    let restricted = StandaloneMetadata::new(store).hide_internal_keys();

    assert!(!restricted.namespaces().contains(&"statistics"));
    assert!(restricted.as_namespace(Some("statistics"))?.is_empty());
    assert_eq!(restricted.as_namespace(Some("parameter"))?.len(), 2);

    let new = restricted.override_with(MetadataPatch::new().key("shortName", "2d"))?;
    assert_eq!(new.get("max")?, None);
    assert_eq!(new.get("shortName")?, Some(DynamicKeyType::Str("2d".into())));

    let buffer = new.to_buffer()?;
    let decoded = RestrictedMetadata::<MemoryKeyStore>::from_buffer(&buffer)?;
    assert_eq!(decoded.get("max")?, None);
    assert_eq!(decoded.get("grib.max")?, Some(DynamicKeyType::Float(315.25)));
    assert_eq!(decoded.gridspec()?, restricted.gridspec()?);
    Ok(())
}

#[test]
fn borrowed_metadata_cannot_be_restricted() -> Result<()> {
    let store = regular_ll_field()?;

    assert!(matches!(
        RestrictedMetadata::try_from_metadata(FieldMetadata::new(&store)),
        Err(CodesError::NotStandalone)
    ));

    // hiding keys of a field restricts a standalone copy
    let restricted = FieldMetadata::new(&store).hide_internal_keys()?;
    assert_eq!(restricted.get("max")?, None);
    assert_eq!(restricted.get("shortName")?, Some(DynamicKeyType::Str("2t".into())));
    Ok(())
}

fn reduced_rotated_gg(version: LibraryVersion) -> MemoryKeyStore {
    MemoryKeyStore::new()
        .with_key("gridType", "reduced_rotated_gg")
        .with_key("N", 32)
        .with_key("isOctahedral", 1)
        .with_key("global", 1)
        .with_key("latitudeOfSouthernPoleInDegrees", -40.0)
        .with_key("longitudeOfSouthernPoleInDegrees", 20.0)
        .with_key("iteratorDisableUnrotate", 0)
        .with_library_version(version)
        .with_coordinates(vec![50.0], vec![20.0])
        .with_native_coordinates(vec![0.0], vec![0.0])
}

#[test]
fn reduced_rotated_gaussian_requires_recent_library() -> Result<()> {
    let old = StandaloneMetadata::new(reduced_rotated_gg(LibraryVersion::new(2, 34, 1)));
    match old.geography() {
        Err(CodesError::FeatureUnsupported { found, .. }) => assert_eq!(found, "ecCodes 2.34.1"),
        other => panic!("Incorrect result: {other:?}"),
    }

    // the GridSpec does not depend on the library version
    assert_eq!(old.gridspec()?.grid, Grid::Name("O32".into()));

    let recent = StandaloneMetadata::new(reduced_rotated_gg(LibraryVersion::new(2, 35, 0)));
    let geography = recent.geography()?;
    assert!(geography.is_rotated());
    assert!(geography.has_rotated_iterator());

    let (lats, lons) = geography.coordinates_unrotated()?;
    assert_approx_eq!(f64, lats[0], 0.0);
    assert_approx_eq!(f64, lons[0], 0.0);

    // the iterator is back in geographic mode
    assert_approx_eq!(f64, geography.latitudes()?[0], 50.0);
    assert_eq!(
        recent.get("iteratorDisableUnrotate")?,
        Some(DynamicKeyType::Int(0))
    );
    Ok(())
}
