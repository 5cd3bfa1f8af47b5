//! Definition of `GridSpec`, the canonical description of a GRIB grid geometry,
//! and of its derivation from and reconstitution to GRIB keys

mod converter;
mod maker;

pub use converter::GridSpecConverter;

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{
    errors::CodesError,
    key_store::{DynamicKeyType, KeyRead},
};

/// GRIB keys and their names in a [`GridSpec`].
///
/// Two raw keys may share a GridSpec name; the first one listed is used when
/// writing the GridSpec back to GRIB keys.
pub(crate) const VOCABULARY: [(&str, &str); 25] = [
    ("Nx", "nx"),
    ("Ny", "ny"),
    ("Ni", "ni"),
    ("Nj", "nj"),
    ("DxInMetres", "dx_in_metres"),
    ("DyInMetres", "dy_in_metres"),
    ("xDirectionGridLengthInMetres", "dx_in_metres"),
    ("yDirectionGridLengthInMetres", "dy_in_metres"),
    ("LaDInDegrees", "lad"),
    ("LoVInDegrees", "lov"),
    ("Latin1InDegrees", "latin1"),
    ("Latin2InDegrees", "latin2"),
    ("latitudeOfSouthernPoleInDegrees", "lat_south_pole"),
    ("longitudeOfSouthernPoleInDegrees", "lon_south_pole"),
    ("orientationOfTheGridInDegrees", "orientation"),
    ("jPointsAreConsecutive", "j_points_consecutive"),
    ("iScansNegatively", "i_scans_negatively"),
    ("jScansPositively", "j_scans_positively"),
    ("angleOfRotationInDegrees", "angle_of_rotation"),
    ("standardParallelInDegrees", "standard_parallel"),
    ("centralLongitudeInDegrees", "central_longitude"),
    ("shapeOfTheEarth", "shape_of_the_earth"),
    ("radius", "radius"),
    ("earthMajorAxis", "earth_major_axis"),
    ("earthMinorAxis", "earth_minor_axis"),
];

pub(crate) const SCAN_MODE_KEYS: [&str; 3] =
    ["jPointsAreConsecutive", "iScansNegatively", "jScansPositively"];

pub(crate) const EARTH_KEYS: [&str; 4] =
    ["shapeOfTheEarth", "radius", "earthMajorAxis", "earthMinorAxis"];

/// GridSpec name of a raw GRIB key.
pub(crate) fn vocabulary_name(raw_key: &str) -> Result<&'static str, CodesError> {
    VOCABULARY
        .iter()
        .find(|(raw, _)| *raw == raw_key)
        .map(|(_, name)| *name)
        .ok_or_else(|| CodesError::NotInVocabulary(raw_key.to_owned()))
}

/// Raw GRIB key of a GridSpec name.
pub(crate) fn vocabulary_raw_key(name: &str) -> Option<&'static str> {
    VOCABULARY
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(raw, _)| *raw)
}

/// Closed set of grid families a [`GridSpec`] can describe.
///
/// The serialized form is the ecCodes `gridType` tag.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    RegularLl,
    ReducedLl,
    RotatedLl,
    RegularGg,
    ReducedGg,
    RotatedGg,
    ReducedRotatedGg,
    Mercator,
    PolarStereographic,
    Lambert,
    LambertAzimuthalEqualArea,
}

impl GridType {
    pub const ALL: [GridType; 11] = [
        GridType::RegularLl,
        GridType::ReducedLl,
        GridType::RotatedLl,
        GridType::RegularGg,
        GridType::ReducedGg,
        GridType::RotatedGg,
        GridType::ReducedRotatedGg,
        GridType::Mercator,
        GridType::PolarStereographic,
        GridType::Lambert,
        GridType::LambertAzimuthalEqualArea,
    ];

    /// The ecCodes `gridType` tag.
    pub const fn as_str(self) -> &'static str {
        match self {
            GridType::RegularLl => "regular_ll",
            GridType::ReducedLl => "reduced_ll",
            GridType::RotatedLl => "rotated_ll",
            GridType::RegularGg => "regular_gg",
            GridType::ReducedGg => "reduced_gg",
            GridType::RotatedGg => "rotated_gg",
            GridType::ReducedRotatedGg => "reduced_rotated_gg",
            GridType::Mercator => "mercator",
            GridType::PolarStereographic => "polar_stereographic",
            GridType::Lambert => "lambert",
            GridType::LambertAzimuthalEqualArea => "lambert_azimuthal_equal_area",
        }
    }

    /// Whether the grid is defined in a rotated coordinate system.
    pub const fn is_rotated(self) -> bool {
        matches!(
            self,
            GridType::RotatedLl | GridType::RotatedGg | GridType::ReducedRotatedGg
        )
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridType {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GridType::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| CodesError::UnsupportedGridType(s.to_owned()))
    }
}

/// Grid resolution of a [`GridSpec`]. Its form is determined by the grid type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grid {
    /// Latitude increment of a reduced lat-lon grid.
    Increment(f64),
    /// `[dx, dy]` in degrees or, for projected grids, in metres.
    Increments([f64; 2]),
    /// Gaussian grid name: `F`, `N` or `O` followed by the Gaussian number.
    Name(String),
}

/// Canonical, serializable description of a grid geometry.
///
/// A `GridSpec` is built from a message with [`make_gridspec()`] and written back to
/// GRIB keys with [`GridSpecConverter`]. It is never mutated in place: a geometry
/// change produces a new `GridSpec` and, through override, new metadata.
///
/// ```
/// # use eccodes_metadata::{make_gridspec, MemoryKeyStore, StandaloneMetadata};
/// # fn main() -> anyhow::Result<()> {
/// let store = MemoryKeyStore::new()
///     .with_key("gridType", "regular_ll")
///     .with_key("Ni", 2)
///     .with_key("Nj", 2)
///     .with_key("longitudeOfFirstGridPointInDegrees", 0.0)
///     .with_key("longitudeOfLastGridPointInDegrees", 10.0)
///     .with_key("latitudeOfFirstGridPointInDegrees", 0.0)
///     .with_key("latitudeOfLastGridPointInDegrees", -10.0)
///     .with_key("iScansNegatively", 0);
/// let metadata = StandaloneMetadata::new(store);
///
/// let gridspec = make_gridspec(&metadata)?;
/// assert_eq!(
///     gridspec.to_json()?,
///     r#"{"type":"regular_ll","grid":[10.0,10.0],"area":[0.0,0.0,-10.0,10.0],"i_scans_negatively":0}"#
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    #[serde(rename = "type")]
    pub grid_type: GridType,
    pub grid: Grid,
    /// `[north, west, south, east]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<[f64; 4]>,
    /// `[latitude, longitude]` of the first gridpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_point: Option<[f64; 2]>,
    /// `[latitude, longitude]` of the southern pole of a rotated grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 2]>,
    /// Family specific keys, scan mode and earth shape, named by the vocabulary.
    #[serde(flatten)]
    pub extra: BTreeMap<String, DynamicKeyType>,
}

impl GridSpec {
    /// Starts a `GridSpec` with no optional fields.
    pub fn new(grid_type: GridType, grid: Grid) -> Self {
        Self {
            grid_type,
            grid,
            area: None,
            first_point: None,
            rotation: None,
            extra: BTreeMap::new(),
        }
    }

    /// Value of a family specific key by its GridSpec name, eg. `"nx"`.
    pub fn get(&self, name: &str) -> Option<&DynamicKeyType> {
        self.extra.get(name)
    }

    /// # Errors
    ///
    /// Returns [`CodesError::Serialization`] when the GridSpec cannot be encoded.
    pub fn to_json(&self) -> Result<String, CodesError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns [`CodesError::Serialization`] when the text is not a GridSpec,
    /// including an unknown `type`.
    pub fn from_json(text: &str) -> Result<Self, CodesError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Builds the [`GridSpec`] of the message described by `metadata`.
///
/// The maker is selected by the `gridType` key.
///
/// # Errors
///
/// Returns [`CodesError::UnsupportedGridType`] when `gridType` is absent or not one of
/// the registered [`GridType`]s, and the errors of the selected maker otherwise.
pub fn make_gridspec<M: KeyRead + ?Sized>(metadata: &M) -> Result<GridSpec, CodesError> {
    let tag: Option<String> = metadata.read_key("gridType")?;
    let grid_type: GridType = tag.as_deref().unwrap_or("None").parse()?;

    maker::GridSpecMaker::new(metadata, grid_type).make()
}
