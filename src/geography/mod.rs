//! Definition of `Geography`, the accessor of the grid geometry of a message:
//! coordinates, shape, bounding box, projection and resolution

mod projection;
mod rotate;

pub use projection::Projection;
pub use rotate::unrotate;

#[cfg(feature = "message_ndarray")]
use ndarray::{Array, ArrayD, IxDyn};
use log::warn;
use serde::{Deserialize, Serialize};

#[cfg(feature = "message_ndarray")]
use crate::errors::MessageNdarrayError;
use crate::{
    errors::CodesError,
    gridspec::{make_gridspec, GridSpec},
    key_store::{missing_is_none, DynamicKeyType, KeyRead, KeyStore, LibraryVersion, TemporaryKey},
    metadata::{GribMetadata, HandleAccess},
};

/// Oldest ecCodes able to compute the coordinates of `reduced_rotated_gg` grids.
pub const MIN_VERSION_REDUCED_ROTATED_GG: LibraryVersion = LibraryVersion::new(2, 35, 0);

/// Key switching the coordinate iterator to the rotated frame.
const DISABLE_UNROTATE_KEY: &str = "iteratorDisableUnrotate";

/// Grid types whose native x/y coordinates are longitudes and latitudes.
const GEOGRAPHIC_GRID_TYPES: [&str; 3] = ["regular_ll", "reduced_gg", "regular_gg"];

/// Bounding box of a grid, in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

/// Number of gridpoints along each axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridShape {
    /// `(Nj, Ni)`: points in the j and i directions
    Structured(usize, usize),
    /// Total number of points of a grid without rows of equal length.
    Unstructured(usize),
}

impl GridShape {
    pub fn dims(&self) -> Vec<usize> {
        match *self {
            GridShape::Structured(nj, ni) => vec![nj, ni],
            GridShape::Unstructured(n) => vec![n],
        }
    }

    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolution of a grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolution {
    /// Increment of lat-lon grids.
    Degrees(f64),
    /// Gaussian grid name or kilometre label such as `2p5km`.
    Name(String),
}

/// Grid in the form of a MARS request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarsGrid {
    Increments([Option<f64>; 2]),
    Name(Option<String>),
}

/// Southern pole and angle of rotation of a rotated grid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub south_pole_lat: Option<f64>,
    pub south_pole_lon: Option<f64>,
    pub angle: Option<f64>,
}

/// Label of a metric increment in kilometres, eg. `2500.0` to `2p5km`.
fn km_label(metres: f64) -> String {
    format!("{:?}", metres / 1000.0).replace('.', "p") + "km"
}

/// Rounds to six decimal places.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Read-only accessor of the grid geometry of a message.
///
/// Whether the grid is rotated and whether the coordinate iterator can return
/// coordinates in the rotated frame are determined once, on construction.
///
/// The accessor reads coordinates in the rotated frame by switching
/// `iteratorDisableUnrotate` for the duration of the read, so it must not be used
/// from several threads on the same message.
#[derive(Debug)]
pub struct Geography<'a, H: HandleAccess> {
    metadata: &'a GribMetadata<H>,
    grid_type: Option<String>,
    rotated: bool,
    rotated_iterator: bool,
}

impl<'a, H: HandleAccess> Geography<'a, H> {
    /// # Errors
    ///
    /// Returns [`CodesError::FeatureUnsupported`] for a `reduced_rotated_gg` grid when the
    /// library is older than [`MIN_VERSION_REDUCED_ROTATED_GG`].
    pub(crate) fn new(metadata: &'a GribMetadata<H>) -> Result<Self, CodesError> {
        let grid_type: Option<String> = metadata.read_key("gridType")?;
        let rotated = grid_type
            .as_deref()
            .is_some_and(|grid_type| grid_type.contains("rotated"));
        let rotated_iterator = metadata.contains(DISABLE_UNROTATE_KEY)?;

        let geography = Self {
            metadata,
            grid_type,
            rotated,
            rotated_iterator,
        };
        geography.check_rotated_support()?;
        Ok(geography)
    }

    fn check_rotated_support(&self) -> Result<(), CodesError> {
        if self.rotated && self.grid_type.as_deref() == Some("reduced_rotated_gg") {
            let found = self.metadata.store().library_version();
            if found < MIN_VERSION_REDUCED_ROTATED_GG {
                return Err(CodesError::FeatureUnsupported {
                    feature: "gridType=reduced_rotated_gg".to_owned(),
                    required: format!("ecCodes >= {MIN_VERSION_REDUCED_ROTATED_GG}"),
                    found: format!("ecCodes {found}"),
                });
            }
        }
        Ok(())
    }

    pub fn grid_type(&self) -> Option<&str> {
        self.grid_type.as_deref()
    }

    pub fn is_rotated(&self) -> bool {
        self.rotated
    }

    /// Whether the coordinate iterator can return coordinates in the rotated frame.
    pub fn has_rotated_iterator(&self) -> bool {
        self.rotated_iterator
    }

    /// Latitudes of the gridpoints as returned by the coordinate iterator.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinates cannot be computed.
    pub fn latitudes(&self) -> Result<Vec<f64>, CodesError> {
        self.metadata.store().latitudes()
    }

    /// Longitudes of the gridpoints as returned by the coordinate iterator.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinates cannot be computed.
    pub fn longitudes(&self) -> Result<Vec<f64>, CodesError> {
        self.metadata.store().longitudes()
    }

    fn is_geographic(&self) -> bool {
        self.grid_type
            .as_deref()
            .is_some_and(|grid_type| GEOGRAPHIC_GRID_TYPES.contains(&grid_type))
    }

    /// x coordinates in the native projection, only defined for grids in geographic coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinates cannot be computed.
    pub fn x(&self) -> Result<Option<Vec<f64>>, CodesError> {
        if self.is_geographic() {
            self.longitudes().map(Some)
        } else {
            Ok(None)
        }
    }

    /// y coordinates in the native projection, only defined for grids in geographic coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinates cannot be computed.
    pub fn y(&self) -> Result<Option<Vec<f64>>, CodesError> {
        if self.is_geographic() {
            self.latitudes().map(Some)
        } else {
            Ok(None)
        }
    }

    /// `(Nj, Ni)` for structured grids, the number of data points otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::MissingKey`] when the grid is not structured and
    /// `numberOfDataPoints` is absent.
    pub fn shape(&self) -> Result<GridShape, CodesError> {
        let nj = missing_is_none(self.metadata.read_key::<i64>("Nj")?);
        let ni = missing_is_none(self.metadata.read_key::<i64>("Ni")?);

        let to_usize = |key: &str, value: i64| {
            usize::try_from(value).map_err(|_| CodesError::WrongRequestedKeyType {
                key: key.to_owned(),
                requested: "usize",
            })
        };

        if let (Some(nj), Some(ni)) = (nj, ni) {
            return Ok(GridShape::Structured(to_usize("Nj", nj)?, to_usize("Ni", ni)?));
        }

        let n: i64 = self.metadata.require_key("numberOfDataPoints")?;
        Ok(GridShape::Unstructured(to_usize("numberOfDataPoints", n)?))
    }

    /// Digest identifying the grid.
    ///
    /// # Errors
    ///
    /// Returns an error when the key cannot be read.
    pub fn unique_grid_id(&self) -> Result<Option<String>, CodesError> {
        self.metadata.read_key("md5GridSection")
    }

    /// Projection parsed from `projTargetString`, `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the projection string cannot be parsed.
    pub fn projection(&self) -> Result<Option<Projection>, CodesError> {
        self.metadata
            .read_key::<String>("projTargetString")?
            .map(|text| Projection::from_proj_string(&text))
            .transpose()
    }

    /// Bounding box from the first and last gridpoints.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::MissingKey`] when a corner key is absent.
    pub fn bounding_box(&self) -> Result<BoundingBox, CodesError> {
        Ok(BoundingBox {
            north: self.metadata.require_key("latitudeOfFirstGridPointInDegrees")?,
            west: self.metadata.require_key("longitudeOfFirstGridPointInDegrees")?,
            south: self.metadata.require_key("latitudeOfLastGridPointInDegrees")?,
            east: self.metadata.require_key("longitudeOfLastGridPointInDegrees")?,
        })
    }

    /// # Errors
    ///
    /// Same as [`make_gridspec()`].
    pub fn gridspec(&self) -> Result<GridSpec, CodesError> {
        make_gridspec(self.metadata)
    }

    /// Resolution of the grid.
    ///
    /// - reduced Gaussian grids: the grid name, eg. `O640`
    /// - lat-lon grids: the increment in degrees, rounded to six decimal places
    /// - Lambert grids: the increment in kilometres, eg. `2p5km`
    ///
    /// # Errors
    ///
    /// - [`CodesError::InconsistentGeometry`] when the x and y increments differ
    /// - [`CodesError::UnsupportedGridType`] for other grid types
    pub fn resolution(&self) -> Result<Resolution, CodesError> {
        match self.grid_type.as_deref() {
            Some("reduced_gg" | "reduced_rotated_gg") => {
                Ok(Resolution::Name(self.metadata.require_key("gridName")?))
            }
            Some("regular_ll" | "rotated_ll") => {
                let x = round6(self.metadata.require_key("DxInDegrees")?);
                let y = round6(self.metadata.require_key("DyInDegrees")?);
                Self::check_equal("DxInDegrees", x, "DyInDegrees", y)?;
                Ok(Resolution::Degrees(x))
            }
            Some("lambert" | "lambert_azimuthal_equal_area") => {
                let x = self.metadata.require_key("DxInMetres")?;
                let y = self.metadata.require_key("DyInMetres")?;
                Self::check_equal("DxInMetres", x, "DyInMetres", y)?;
                Ok(Resolution::Name(km_label(x)))
            }
            other => Err(CodesError::UnsupportedGridType(
                other.unwrap_or("None").to_owned(),
            )),
        }
    }

    #[allow(clippy::float_cmp)]
    fn check_equal(first_key: &str, first: f64, second_key: &str, second: f64) -> Result<(), CodesError> {
        if first == second {
            Ok(())
        } else {
            Err(CodesError::InconsistentGeometry {
                first_key: first_key.to_owned(),
                first,
                second_key: second_key.to_owned(),
                second,
            })
        }
    }

    /// Increments of structured grids, the grid name otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error when the shape cannot be determined.
    pub fn mars_grid(&self) -> Result<MarsGrid, CodesError> {
        match self.shape()? {
            GridShape::Structured(..) => Ok(MarsGrid::Increments([
                self.metadata.read_key("iDirectionIncrementInDegrees")?,
                self.metadata.read_key("jDirectionIncrementInDegrees")?,
            ])),
            GridShape::Unstructured(_) => Ok(MarsGrid::Name(self.metadata.read_key("gridName")?)),
        }
    }

    /// `[north, west, south, east]` as in a MARS request.
    ///
    /// # Errors
    ///
    /// Returns [`CodesError::MissingKey`] when a corner key is absent.
    pub fn mars_area(&self) -> Result<[f64; 4], CodesError> {
        let bbox = self.bounding_box()?;
        Ok([bbox.north, bbox.west, bbox.south, bbox.east])
    }

    /// # Errors
    ///
    /// Returns an error when a rotation key cannot be read.
    pub fn rotation(&self) -> Result<Rotation, CodesError> {
        Ok(Rotation {
            south_pole_lat: self.metadata.read_key("latitudeOfSouthernPoleInDegrees")?,
            south_pole_lon: self.metadata.read_key("longitudeOfSouthernPoleInDegrees")?,
            angle: self.metadata.read_key("angleOfRotationInDegrees")?,
        })
    }

    /// Latitudes of [`coordinates_unrotated()`](Geography::coordinates_unrotated), see there for their frame.
    ///
    /// # Errors
    ///
    /// Same as [`coordinates_unrotated()`](Geography::coordinates_unrotated).
    pub fn latitudes_unrotated(&self) -> Result<Vec<f64>, CodesError> {
        Ok(self.coordinates_unrotated()?.0)
    }

    /// Longitudes of [`coordinates_unrotated()`](Geography::coordinates_unrotated), see there for their frame.
    ///
    /// # Errors
    ///
    /// Same as [`coordinates_unrotated()`](Geography::coordinates_unrotated).
    pub fn longitudes_unrotated(&self) -> Result<Vec<f64>, CodesError> {
        Ok(self.coordinates_unrotated()?.1)
    }

    /// Latitudes and longitudes with the grid rotation taken into account.
    ///
    /// - Grids that are not rotated: the iterator coordinates, which are geographic.
    /// - Rotated grids whose iterator has the `iteratorDisableUnrotate` switch: coordinates
    ///   in the rotated frame, read with the switch temporarily set to `1`.
    /// - Rotated grids without the switch (ecCodes too old for the grid type): the iterator
    ///   coordinates passed through [`unrotate()`], which maps rotated frame coordinates
    ///   to geographic ones. The result is not in the rotated frame, and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns an error when the coordinates cannot be computed or the switch cannot be set.
    pub fn coordinates_unrotated(&self) -> Result<(Vec<f64>, Vec<f64>), CodesError> {
        if !self.rotated {
            return Ok((self.latitudes()?, self.longitudes()?));
        }

        if !self.rotated_iterator {
            warn!(
                "ecCodes does not support rotated iterator for {}",
                self.grid_type.as_deref().unwrap_or("None")
            );

            let rotation = self.rotation()?;
            let south_pole_lat = rotation
                .south_pole_lat
                .ok_or_else(|| CodesError::MissingKey("latitudeOfSouthernPoleInDegrees".into()))?;
            let south_pole_lon = rotation
                .south_pole_lon
                .ok_or_else(|| CodesError::MissingKey("longitudeOfSouthernPoleInDegrees".into()))?;

            return Ok(unrotate(
                &self.latitudes()?,
                &self.longitudes()?,
                south_pole_lat,
                south_pole_lon,
            ));
        }

        let _guard = TemporaryKey::set(
            self.metadata.store(),
            DISABLE_UNROTATE_KEY,
            DynamicKeyType::Int(1),
            DynamicKeyType::Int(0),
        )?;
        Ok((self.latitudes()?, self.longitudes()?))
    }

    /// Latitudes and longitudes reshaped to [`shape()`](Geography::shape).
    ///
    /// # Errors
    ///
    /// - When the coordinates or the shape cannot be read
    /// - When the number of coordinates does not match the shape
    #[cfg(feature = "message_ndarray")]
    #[cfg_attr(docsrs, doc(cfg(feature = "message_ndarray")))]
    pub fn coordinates_ndarray(&self) -> Result<(ArrayD<f64>, ArrayD<f64>), CodesError> {
        let dims = self.shape()?.dims();
        let expected: usize = dims.iter().product();

        let reshape = |values: Vec<f64>| -> Result<ArrayD<f64>, CodesError> {
            if values.len() != expected {
                return Err(MessageNdarrayError::UnexpectedValuesLength(values.len(), expected).into());
            }
            Ok(Array::from_shape_vec(IxDyn(&dims), values).map_err(MessageNdarrayError::from)?)
        };

        Ok((reshape(self.latitudes()?)?, reshape(self.longitudes()?)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_store::MemoryKeyStore;
    use crate::metadata::{FieldMetadata, StandaloneMetadata};
    use anyhow::Result;
    use float_cmp::assert_approx_eq;

    fn lat_lon() -> MemoryKeyStore {
        MemoryKeyStore::new()
            .with_key("gridType", "regular_ll")
            .with_key("Ni", 3)
            .with_key("Nj", 2)
            .with_key("numberOfDataPoints", 6)
            .with_key("DxInDegrees", 5.000_000_1)
            .with_key("DyInDegrees", 5.0)
            .with_key("iDirectionIncrementInDegrees", 5.0)
            .with_key("jDirectionIncrementInDegrees", 5.0)
            .with_key("latitudeOfFirstGridPointInDegrees", 5.0)
            .with_key("longitudeOfFirstGridPointInDegrees", 0.0)
            .with_key("latitudeOfLastGridPointInDegrees", 0.0)
            .with_key("longitudeOfLastGridPointInDegrees", 10.0)
            .with_coordinates(
                vec![5.0, 5.0, 5.0, 0.0, 0.0, 0.0],
                vec![0.0, 5.0, 10.0, 0.0, 5.0, 10.0],
            )
    }

    #[test]
    fn structured_shape_and_box() -> Result<()> {
        let store = lat_lon();
        let md = FieldMetadata::new(&store);
        let geo = md.geography()?;

        assert!(!geo.is_rotated());
        assert_eq!(geo.shape()?, GridShape::Structured(2, 3));
        assert_eq!(
            geo.bounding_box()?,
            BoundingBox {
                north: 5.0,
                west: 0.0,
                south: 0.0,
                east: 10.0
            }
        );
        assert_eq!(geo.mars_grid()?, MarsGrid::Increments([Some(5.0), Some(5.0)]));
        assert_eq!(geo.mars_area()?, [5.0, 0.0, 0.0, 10.0]);
        assert_eq!(geo.x()?, Some(store.longitudes()?));
        Ok(())
    }

    #[test]
    fn missing_counts_give_unstructured_shape() -> Result<()> {
        let store = lat_lon().with_key("Ni", crate::key_store::MISSING_VALUE);
        let md = FieldMetadata::new(&store);

        assert_eq!(md.geography()?.shape()?, GridShape::Unstructured(6));
        Ok(())
    }

    #[test]
    fn resolutions() -> Result<()> {
        let store = lat_lon();
        let md = FieldMetadata::new(&store);
        assert_eq!(md.geography()?.resolution()?, Resolution::Degrees(5.0));

        let store = lat_lon().with_key("DyInDegrees", 2.5);
        let md = FieldMetadata::new(&store);
        assert!(matches!(
            md.geography()?.resolution(),
            Err(CodesError::InconsistentGeometry { .. })
        ));

        let store = MemoryKeyStore::new()
            .with_key("gridType", "lambert")
            .with_key("DxInMetres", 2500.0)
            .with_key("DyInMetres", 2500.0);
        let md = FieldMetadata::new(&store);
        assert_eq!(md.geography()?.resolution()?, Resolution::Name("2p5km".into()));

        let store = MemoryKeyStore::new()
            .with_key("gridType", "reduced_gg")
            .with_key("gridName", "O640");
        let md = FieldMetadata::new(&store);
        assert_eq!(md.geography()?.resolution()?, Resolution::Name("O640".into()));

        let store = MemoryKeyStore::new().with_key("gridType", "mercator");
        let md = FieldMetadata::new(&store);
        assert!(matches!(
            md.geography()?.resolution(),
            Err(CodesError::UnsupportedGridType(_))
        ));
        Ok(())
    }

    #[test]
    fn km_labels() {
        assert_eq!(km_label(2500.0), "2p5km");
        assert_eq!(km_label(5000.0), "5p0km");
    }

    #[test]
    fn rotated_iterator_switch() -> Result<()> {
        let store = MemoryKeyStore::new()
            .with_key("gridType", "rotated_ll")
            .with_key(DISABLE_UNROTATE_KEY, 0)
            .with_coordinates(vec![50.0], vec![20.0])
            .with_native_coordinates(vec![0.0], vec![0.0]);
        let md = StandaloneMetadata::new(store);
        let geo = md.geography()?;

        assert!(geo.is_rotated());
        assert!(geo.has_rotated_iterator());
        assert_eq!(geo.coordinates_unrotated()?, (vec![0.0], vec![0.0]));
        assert_eq!(geo.latitudes()?, vec![50.0]);
        assert_eq!(md.get(DISABLE_UNROTATE_KEY)?, Some(DynamicKeyType::Int(0)));
        Ok(())
    }

    #[test]
    fn rotation_fallback_warns() -> Result<()> {
        testing_logger::setup();

        let store = MemoryKeyStore::new()
            .with_key("gridType", "rotated_gg")
            .with_key("latitudeOfSouthernPoleInDegrees", -40.0)
            .with_key("longitudeOfSouthernPoleInDegrees", 20.0)
            .with_coordinates(vec![0.0], vec![0.0]);
        let md = StandaloneMetadata::new(store);
        let (lats, lons) = md.geography()?.coordinates_unrotated()?;

        assert_approx_eq!(f64, lats[0], 50.0, epsilon = 1e-9);
        assert_approx_eq!(f64, lons[0], 20.0, epsilon = 1e-9);
        assert!(!md.contains(DISABLE_UNROTATE_KEY)?);

        testing_logger::validate(|logs| {
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].level, log::Level::Warn);
            assert_eq!(
                logs[0].body,
                "ecCodes does not support rotated iterator for rotated_gg"
            );
        });
        Ok(())
    }

    #[test]
    fn reduced_rotated_gaussian_version_gate() -> Result<()> {
        let store = MemoryKeyStore::new()
            .with_key("gridType", "reduced_rotated_gg")
            .with_library_version(LibraryVersion::new(2, 34, 1));
        let md = FieldMetadata::new(&store);

        match md.geography() {
            Err(CodesError::FeatureUnsupported { required, found, .. }) => {
                assert_eq!(required, "ecCodes >= 2.35.0");
                assert_eq!(found, "ecCodes 2.34.1");
            }
            other => panic!("Incorrect result: {other:?}"),
        }

        let store = store.with_library_version(MIN_VERSION_REDUCED_ROTATED_GG);
        let md = FieldMetadata::new(&store);
        assert!(md.geography().is_ok());
        Ok(())
    }

    #[test]
    fn projection_from_key() -> Result<()> {
        let store = lat_lon().with_key("projTargetString", "+proj=eqc +ellps=WGS84 +no_defs");
        let md = FieldMetadata::new(&store);
        let projection = md.geography()?.projection()?;

        assert_eq!(projection.as_ref().and_then(Projection::name), Some("eqc"));
        Ok(())
    }

    #[cfg(feature = "message_ndarray")]
    #[test]
    fn ndarray_coordinates() -> Result<()> {
        let store = lat_lon();
        let md = FieldMetadata::new(&store);
        let (lats, lons) = md.geography()?.coordinates_ndarray()?;

        assert_eq!(lats.shape(), &[2, 3]);
        assert_approx_eq!(f64, lats[IxDyn(&[1, 0])], 0.0);
        assert_approx_eq!(f64, lons[IxDyn(&[0, 2])], 10.0);
        Ok(())
    }
}
