use log::debug;

use super::{vocabulary_raw_key, Grid, GridSpec, GridType};
use crate::{
    errors::CodesError,
    key_store::{DynamicKeyType, KeyPatch},
};

/// Edition from which `lambert_azimuthal_equal_area` can be encoded.
const LAEA_MIN_EDITION: i64 = 2;

/// Writes a [`GridSpec`] back to GRIB keys.
///
/// The conversion is the inverse of [`make_gridspec()`](crate::make_gridspec): reading
/// a GridSpec from a message patched with the returned keys gives back the same
/// GridSpec.
#[derive(Copy, Clone, Debug, Default)]
pub struct GridSpecConverter;

impl GridSpecConverter {
    /// Returns the keys encoding `spec` in a message of the given GRIB `edition`,
    /// and the number of gridpoints of the new geometry when it can be computed.
    ///
    /// `gridType` is always the first key of the patch.
    ///
    /// # Errors
    ///
    /// - [`CodesError::UnsupportedEdition`] when `edition` is neither 1 nor 2
    /// - [`CodesError::FeatureUnsupported`] when the grid cannot be encoded in `edition`
    /// - [`CodesError::InvalidGridSpec`] when the `grid` form does not match the grid type,
    ///   a required field is absent or an extra key has no GRIB name
    pub fn to_metadata(
        spec: &GridSpec,
        edition: i64,
    ) -> Result<(KeyPatch, Option<usize>), CodesError> {
        if !(1..=2).contains(&edition) {
            return Err(CodesError::UnsupportedEdition(edition));
        }

        let mut patch = KeyPatch::new();
        patch.insert("gridType".into(), spec.grid_type.as_str().into());

        let point_count = match spec.grid_type {
            GridType::RegularLl | GridType::RotatedLl => lat_lon(spec, &mut patch)?,
            GridType::ReducedLl => reduced_lat_lon(spec, &mut patch)?,
            GridType::RegularGg
            | GridType::RotatedGg
            | GridType::ReducedGg
            | GridType::ReducedRotatedGg => gaussian(spec, &mut patch)?,
            GridType::Mercator => mercator(spec, &mut patch)?,
            GridType::PolarStereographic | GridType::Lambert => {
                first_point_grid(spec, &mut patch)?
            }
            GridType::LambertAzimuthalEqualArea => {
                if edition < LAEA_MIN_EDITION {
                    return Err(CodesError::FeatureUnsupported {
                        feature: format!("gridType={}", spec.grid_type),
                        required: format!("GRIB edition {LAEA_MIN_EDITION}"),
                        found: format!("edition {edition}"),
                    });
                }
                first_point_grid(spec, &mut patch)?
            }
        };

        add_rotation(spec, &mut patch)?;
        add_extra(spec, &mut patch)?;

        debug!(
            "GridSpec type={} converted to {} keys, point count {:?}",
            spec.grid_type,
            patch.len(),
            point_count
        );

        Ok((patch, point_count))
    }
}

fn invalid(spec: &GridSpec, reason: &str) -> CodesError {
    CodesError::InvalidGridSpec(format!("type={}: {reason}", spec.grid_type))
}

fn increments(spec: &GridSpec) -> Result<[f64; 2], CodesError> {
    match spec.grid {
        Grid::Increments(increments) => Ok(increments),
        _ => Err(invalid(spec, "grid must be a pair of increments")),
    }
}

/// Integer flag of the GridSpec, `0` when absent.
fn flag(spec: &GridSpec, name: &str) -> i64 {
    match spec.get(name) {
        Some(DynamicKeyType::Int(v)) => *v,
        _ => 0,
    }
}

/// Area of the GridSpec, the whole globe when absent.
fn area_or_global(spec: &GridSpec, dx: f64) -> [f64; 4] {
    spec.area.unwrap_or([90.0, 0.0, -90.0, 360.0 - dx])
}

/// Writes the first and last gridpoint coordinates of `area` in scanning order.
fn add_corners(spec: &GridSpec, area: [f64; 4], patch: &mut KeyPatch) {
    let [_, west, _, east] = area;

    let (first_lon, last_lon) = if flag(spec, "i_scans_negatively") == 0 {
        (west, east)
    } else {
        (east, west)
    };
    add_corner_keys(spec, area, first_lon, last_lon, patch);
}

/// Writes the corners of a Gaussian `area`, whose west and east are the first and
/// last longitudes whatever the i direction.
fn add_gaussian_corners(spec: &GridSpec, area: [f64; 4], patch: &mut KeyPatch) {
    let [_, west, _, east] = area;
    add_corner_keys(spec, area, west, east, patch);
}

fn add_corner_keys(
    spec: &GridSpec,
    area: [f64; 4],
    first_lon: f64,
    last_lon: f64,
    patch: &mut KeyPatch,
) {
    let [north, _, south, _] = area;
    let (first_lat, last_lat) = if flag(spec, "j_scans_positively") == 0 {
        (north, south)
    } else {
        (south, north)
    };

    patch.insert("latitudeOfFirstGridPointInDegrees".into(), first_lat.into());
    patch.insert("longitudeOfFirstGridPointInDegrees".into(), first_lon.into());
    patch.insert("latitudeOfLastGridPointInDegrees".into(), last_lat.into());
    patch.insert("longitudeOfLastGridPointInDegrees".into(), last_lon.into());
}

/// Number of points spanning `extent` with `increment` spacing, both ends included.
#[allow(clippy::cast_possible_truncation)]
fn axis_points(extent: f64, increment: f64) -> i64 {
    if increment == 0.0 {
        return 1;
    }
    (extent.abs() / increment).round() as i64 + 1
}

fn point_count(counts: &[i64]) -> Option<usize> {
    counts
        .iter()
        .try_fold(1_usize, |acc, n| acc.checked_mul(usize::try_from(*n).ok()?))
}

fn lat_lon(spec: &GridSpec, patch: &mut KeyPatch) -> Result<Option<usize>, CodesError> {
    let [dx, dy] = increments(spec)?;
    let area = area_or_global(spec, dx);
    let [north, west, south, east] = area;

    let east = if east < west { east + 360.0 } else { east };
    let ni = axis_points(east - west, dx);
    let nj = axis_points(north - south, dy);

    patch.insert("Ni".into(), ni.into());
    patch.insert("Nj".into(), nj.into());
    patch.insert("iDirectionIncrementInDegrees".into(), dx.into());
    patch.insert("jDirectionIncrementInDegrees".into(), dy.into());
    add_corners(spec, area, patch);

    Ok(point_count(&[ni, nj]))
}

fn reduced_lat_lon(spec: &GridSpec, patch: &mut KeyPatch) -> Result<Option<usize>, CodesError> {
    let Grid::Increment(dy) = spec.grid else {
        return Err(invalid(spec, "grid must be a single latitude increment"));
    };
    let area = spec
        .area
        .ok_or_else(|| invalid(spec, "area is required"))?;
    let [north, _, south, _] = area;

    patch.insert("Nj".into(), axis_points(north - south, dy).into());
    patch.insert("jDirectionIncrementInDegrees".into(), dy.into());
    add_corners(spec, area, patch);

    // row lengths are not part of the GridSpec
    Ok(None)
}

/// Row lengths of the northern half of an octahedral grid, north to south.
fn octahedral_rows(n: i64) -> impl Iterator<Item = i64> {
    (0..n).map(|i| 20 + 4 * i)
}

fn gaussian(spec: &GridSpec, patch: &mut KeyPatch) -> Result<Option<usize>, CodesError> {
    let Grid::Name(name) = &spec.grid else {
        return Err(invalid(spec, "grid must be a Gaussian grid name"));
    };

    let mut chars = name.chars();
    let label = chars.next();
    let n: i64 = chars
        .as_str()
        .parse()
        .map_err(|_| invalid(spec, &format!("cannot read Gaussian number from {name}")))?;
    if n <= 0 {
        return Err(invalid(spec, &format!("Gaussian number of {name} must be positive")));
    }

    let reduced = matches!(
        spec.grid_type,
        GridType::ReducedGg | GridType::ReducedRotatedGg
    );
    let octahedral = match (reduced, label) {
        (false, Some('F')) => false,
        (true, Some('N')) => false,
        (true, Some('O')) => true,
        _ => return Err(invalid(spec, &format!("grid={name} does not match the grid type"))),
    };

    patch.insert("N".into(), n.into());
    if reduced {
        patch.insert("isOctahedral".into(), i64::from(octahedral).into());
    }

    if let Some(area) = spec.area {
        patch.insert("global".into(), 0.into());
        add_gaussian_corners(spec, area, patch);
        return Ok(None);
    }

    patch.insert("global".into(), 1.into());
    patch.insert("Nj".into(), (2 * n).into());

    if !reduced {
        patch.insert("Ni".into(), (4 * n).into());
        return Ok(point_count(&[2 * n, 4 * n]));
    }

    if octahedral {
        let northern: Vec<i64> = octahedral_rows(n).collect();
        let pl: Vec<i64> = northern
            .iter()
            .copied()
            .chain(northern.iter().rev().copied())
            .collect();
        let total: i64 = pl.iter().sum();
        patch.insert("pl".into(), pl.into());
        return Ok(point_count(&[total]));
    }

    // classic reduced grids have no closed form for their row lengths
    Ok(None)
}

fn mercator(spec: &GridSpec, patch: &mut KeyPatch) -> Result<Option<usize>, CodesError> {
    let [dx, dy] = increments(spec)?;
    let area = spec
        .area
        .ok_or_else(|| invalid(spec, "area is required"))?;

    patch.insert("DiInMetres".into(), dx.into());
    patch.insert("DjInMetres".into(), dy.into());
    add_corners(spec, area, patch);

    Ok(extra_point_count(spec, "ni", "nj"))
}

fn first_point_grid(spec: &GridSpec, patch: &mut KeyPatch) -> Result<Option<usize>, CodesError> {
    let [dx, dy] = increments(spec)?;
    let [lat, lon] = spec
        .first_point
        .ok_or_else(|| invalid(spec, "first_point is required"))?;

    patch.insert("DxInMetres".into(), dx.into());
    patch.insert("DyInMetres".into(), dy.into());
    patch.insert("latitudeOfFirstGridPointInDegrees".into(), lat.into());
    patch.insert("longitudeOfFirstGridPointInDegrees".into(), lon.into());

    Ok(extra_point_count(spec, "nx", "ny"))
}

fn extra_point_count(spec: &GridSpec, x: &str, y: &str) -> Option<usize> {
    match (spec.get(x), spec.get(y)) {
        (Some(DynamicKeyType::Int(nx)), Some(DynamicKeyType::Int(ny))) => point_count(&[*nx, *ny]),
        _ => None,
    }
}

fn add_rotation(spec: &GridSpec, patch: &mut KeyPatch) -> Result<(), CodesError> {
    match (spec.grid_type.is_rotated(), spec.rotation) {
        (true, Some([lat, lon])) => {
            patch.insert("latitudeOfSouthernPoleInDegrees".into(), lat.into());
            patch.insert("longitudeOfSouthernPoleInDegrees".into(), lon.into());
            Ok(())
        }
        (true, None) => Err(invalid(spec, "rotation is required")),
        (false, Some(_)) => Err(invalid(spec, "rotation given for a non-rotated grid")),
        (false, None) => Ok(()),
    }
}

/// Writes the family specific keys back under their GRIB names.
fn add_extra(spec: &GridSpec, patch: &mut KeyPatch) -> Result<(), CodesError> {
    for (name, value) in &spec.extra {
        let raw = vocabulary_raw_key(name)
            .ok_or_else(|| invalid(spec, &format!("unknown key {name}")))?;
        patch.insert(raw.to_owned(), value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn octahedral_point_count() -> Result<()> {
        let spec = GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into()));
        let (patch, count) = GridSpecConverter::to_metadata(&spec, 2)?;

        assert_eq!(count, Some(5248));
        assert_eq!(patch.get_index_of("gridType"), Some(0));
        assert_eq!(patch.get("isOctahedral"), Some(&DynamicKeyType::Int(1)));

        match patch.get("pl") {
            Some(DynamicKeyType::IntArray(pl)) => {
                assert_eq!(pl.len(), 64);
                assert_eq!(pl[0], 20);
                assert_eq!(pl[31], 144);
                assert_eq!(pl[32], 144);
                assert_eq!(pl[63], 20);
            }
            other => panic!("Incorrect pl: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn regular_gaussian_point_count() -> Result<()> {
        let spec = GridSpec::new(GridType::RegularGg, Grid::Name("F48".into()));
        let (_, count) = GridSpecConverter::to_metadata(&spec, 1)?;
        assert_eq!(count, Some(8 * 48 * 48));

        let classic = GridSpec::new(GridType::ReducedGg, Grid::Name("N48".into()));
        let (_, count) = GridSpecConverter::to_metadata(&classic, 1)?;
        assert_eq!(count, None);
        Ok(())
    }

    #[test]
    fn gaussian_sub_area_follows_j_scan() -> Result<()> {
        let mut spec = GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into()));
        spec.area = Some([10.0, 0.0, -10.0, 20.0]);
        spec.extra
            .insert("j_scans_positively".into(), DynamicKeyType::Int(1));
        spec.extra
            .insert("i_scans_negatively".into(), DynamicKeyType::Int(1));

        let (patch, count) = GridSpecConverter::to_metadata(&spec, 2)?;
        assert_eq!(count, None);

        let corner = |key: &str| patch.get(key).cloned();
        assert_eq!(
            corner("latitudeOfFirstGridPointInDegrees"),
            Some(DynamicKeyType::Float(-10.0))
        );
        assert_eq!(
            corner("latitudeOfLastGridPointInDegrees"),
            Some(DynamicKeyType::Float(10.0))
        );
        // longitudes of Gaussian areas are first/last, not west/east
        assert_eq!(
            corner("longitudeOfFirstGridPointInDegrees"),
            Some(DynamicKeyType::Float(0.0))
        );
        assert_eq!(
            corner("longitudeOfLastGridPointInDegrees"),
            Some(DynamicKeyType::Float(20.0))
        );
        assert_eq!(corner("jScansPositively"), Some(DynamicKeyType::Int(1)));
        Ok(())
    }

    #[test]
    fn global_gaussian_dimensions() -> Result<()> {
        let f48 = GridSpec::new(GridType::RegularGg, Grid::Name("F48".into()));
        let (patch, _) = GridSpecConverter::to_metadata(&f48, 2)?;
        assert_eq!(patch.get("Ni"), Some(&DynamicKeyType::Int(192)));
        assert_eq!(patch.get("Nj"), Some(&DynamicKeyType::Int(96)));

        let o32 = GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into()));
        let (patch, _) = GridSpecConverter::to_metadata(&o32, 2)?;
        assert_eq!(patch.get("Ni"), None);
        assert_eq!(patch.get("Nj"), Some(&DynamicKeyType::Int(64)));
        Ok(())
    }

    #[test]
    fn gaussian_label_must_match_type() {
        let spec = GridSpec::new(GridType::RegularGg, Grid::Name("O48".into()));
        assert!(matches!(
            GridSpecConverter::to_metadata(&spec, 2),
            Err(CodesError::InvalidGridSpec(_))
        ));

        let spec = GridSpec::new(GridType::ReducedGg, Grid::Increments([1.0, 1.0]));
        assert!(matches!(
            GridSpecConverter::to_metadata(&spec, 2),
            Err(CodesError::InvalidGridSpec(_))
        ));
    }

    #[test]
    fn lat_lon_point_count_from_area() -> Result<()> {
        let mut spec = GridSpec::new(GridType::RegularLl, Grid::Increments([10.0, 10.0]));
        spec.area = Some([0.0, 0.0, -10.0, 10.0]);
        let (patch, count) = GridSpecConverter::to_metadata(&spec, 2)?;

        assert_eq!(count, Some(4));
        assert_eq!(patch.get("Ni"), Some(&DynamicKeyType::Int(2)));
        assert_eq!(
            patch.get("latitudeOfLastGridPointInDegrees"),
            Some(&DynamicKeyType::Float(-10.0))
        );

        let global = GridSpec::new(GridType::RegularLl, Grid::Increments([1.0, 1.0]));
        let (_, count) = GridSpecConverter::to_metadata(&global, 2)?;
        assert_eq!(count, Some(360 * 181));
        Ok(())
    }

    #[test]
    fn editions() {
        let spec = GridSpec::new(GridType::RegularGg, Grid::Name("F48".into()));
        assert!(matches!(
            GridSpecConverter::to_metadata(&spec, 3),
            Err(CodesError::UnsupportedEdition(3))
        ));

        let mut laea = GridSpec::new(
            GridType::LambertAzimuthalEqualArea,
            Grid::Increments([5000.0, 5000.0]),
        );
        laea.first_point = Some([67.0, -35.0]);
        assert!(matches!(
            GridSpecConverter::to_metadata(&laea, 1),
            Err(CodesError::FeatureUnsupported { .. })
        ));
        assert!(GridSpecConverter::to_metadata(&laea, 2).is_ok());
    }

    #[test]
    fn rotation_must_match_type() {
        let spec = GridSpec::new(GridType::RotatedGg, Grid::Name("F48".into()));
        assert!(matches!(
            GridSpecConverter::to_metadata(&spec, 2),
            Err(CodesError::InvalidGridSpec(_))
        ));

        let mut spec = GridSpec::new(GridType::RegularGg, Grid::Name("F48".into()));
        spec.rotation = Some([-40.0, 20.0]);
        assert!(matches!(
            GridSpecConverter::to_metadata(&spec, 2),
            Err(CodesError::InvalidGridSpec(_))
        ));
    }
}
