use super::{
    vocabulary_name, Grid, GridSpec, GridType, EARTH_KEYS, SCAN_MODE_KEYS,
};
use crate::{
    errors::CodesError,
    key_store::{missing_is_none, DynamicKeyType, KeyRead, MISSING_VALUE},
};

/// Direction in which the i index runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ScanDirection {
    Positive,
    Negative,
}

/// Reads the i-direction scan sign from `iScansNegatively`, falling back to
/// `iScansPositively`.
pub(crate) fn x_scan_direction<M: KeyRead + ?Sized>(md: &M) -> Result<ScanDirection, CodesError> {
    if let Some(negatively) = md.read_key::<i64>("iScansNegatively")? {
        return Ok(if negatively == 0 {
            ScanDirection::Positive
        } else {
            ScanDirection::Negative
        });
    }

    if let Some(positively) = md.read_key::<i64>("iScansPositively")? {
        return Ok(if positively == 1 {
            ScanDirection::Positive
        } else {
            ScanDirection::Negative
        });
    }

    Err(CodesError::ScanDirection(vec![
        "iScansNegatively".to_owned(),
        "iScansPositively".to_owned(),
    ]))
}

/// Builds a [`GridSpec`] from the keys of one message.
///
/// One maker serves all grid families; the family specific parts are selected by
/// an exhaustive match on the [`GridType`].
pub(super) struct GridSpecMaker<'m, M: KeyRead + ?Sized> {
    md: &'m M,
    grid_type: GridType,
}

impl<'m, M: KeyRead + ?Sized> GridSpecMaker<'m, M> {
    pub(super) fn new(md: &'m M, grid_type: GridType) -> Self {
        Self { md, grid_type }
    }

    pub(super) fn make(&self) -> Result<GridSpec, CodesError> {
        let mut spec = match self.grid_type {
            GridType::RegularLl | GridType::RotatedLl => self.lat_lon()?,
            GridType::ReducedLl => self.reduced_lat_lon()?,
            GridType::RegularGg | GridType::RotatedGg => self.gaussian('F')?,
            GridType::ReducedGg | GridType::ReducedRotatedGg => {
                let octahedral = self.md.read_key_or::<i64>("isOctahedral", 0)? == 1;
                self.gaussian(if octahedral { 'O' } else { 'N' })?
            }
            GridType::Mercator => self.mercator()?,
            GridType::PolarStereographic => self.first_point_grid(
                self.metric_increments("DxInMetres", "DyInMetres")?,
                &["Nx", "Ny", "LaDInDegrees", "orientationOfTheGridInDegrees"],
            )?,
            GridType::Lambert => self.first_point_grid(
                self.metric_increments("DxInMetres", "DyInMetres")?,
                &[
                    "Nx",
                    "Ny",
                    "LaDInDegrees",
                    "LoVInDegrees",
                    "Latin1InDegrees",
                    "Latin2InDegrees",
                ],
            )?,
            GridType::LambertAzimuthalEqualArea => {
                let dx = self.first_valid(
                    &["DxInMetres", "xDirectionGridLengthInMetres"],
                    "x grid increment in metres",
                )?;
                let dy = self.first_valid(
                    &["DyInMetres", "yDirectionGridLengthInMetres"],
                    "y grid increment in metres",
                )?;
                self.first_point_grid(
                    [dx.abs(), dy.abs()],
                    &[
                        "Nx",
                        "Ny",
                        "standardParallelInDegrees",
                        "centralLongitudeInDegrees",
                    ],
                )?
            }
        };

        self.add_rotation(&mut spec)?;
        self.add(&SCAN_MODE_KEYS, &mut spec)?;
        Ok(spec)
    }

    fn first_lon(&self) -> Result<f64, CodesError> {
        self.md.require_key("longitudeOfFirstGridPointInDegrees")
    }

    fn last_lon(&self) -> Result<f64, CodesError> {
        self.md.require_key("longitudeOfLastGridPointInDegrees")
    }

    fn first_lat(&self) -> Result<f64, CodesError> {
        self.md.require_key("latitudeOfFirstGridPointInDegrees")
    }

    fn last_lat(&self) -> Result<f64, CodesError> {
        self.md.require_key("latitudeOfLastGridPointInDegrees")
    }

    fn north(&self) -> Result<f64, CodesError> {
        Ok(self.first_lat()?.max(self.last_lat()?))
    }

    fn south(&self) -> Result<f64, CodesError> {
        Ok(self.first_lat()?.min(self.last_lat()?))
    }

    fn west(&self) -> Result<f64, CodesError> {
        match x_scan_direction(self.md)? {
            ScanDirection::Positive => self.first_lon(),
            ScanDirection::Negative => self.last_lon(),
        }
    }

    fn east(&self) -> Result<f64, CodesError> {
        match x_scan_direction(self.md)? {
            ScanDirection::Positive => self.last_lon(),
            ScanDirection::Negative => self.first_lon(),
        }
    }

    /// `[north, west, south, east]`
    fn area(&self) -> Result<[f64; 4], CodesError> {
        Ok([self.north()?, self.west()?, self.south()?, self.east()?])
    }

    /// Value of the first key that is present.
    fn first_valid(&self, keys: &[&str], desc: &str) -> Result<f64, CodesError> {
        for key in keys {
            if let Some(value) = self.md.read_key::<f64>(key)? {
                return Ok(value);
            }
        }

        Err(CodesError::MissingKeys {
            desc: desc.to_owned(),
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
        })
    }

    /// Value of the first point count key that is present and not missing.
    fn first_valid_count(&self, keys: &[&str], desc: &str) -> Result<i64, CodesError> {
        for key in keys {
            if let Some(count) = missing_is_none(self.md.read_key::<i64>(key)?) {
                return Ok(count);
            }
        }

        Err(CodesError::MissingKeys {
            desc: desc.to_owned(),
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
        })
    }

    /// Increment along one axis, derived from the point count and coordinate range
    /// when the increment key is absent.
    #[allow(clippy::cast_precision_loss)]
    fn increment(
        &self,
        increment_key: &str,
        count_keys: &[&str],
        desc: &str,
        first: f64,
        last: f64,
    ) -> Result<f64, CodesError> {
        if let Some(increment) = self.md.read_key::<f64>(increment_key)? {
            return Ok(increment);
        }

        let count = self.first_valid_count(count_keys, desc)?;
        if count == 1 {
            return Ok(1.0);
        }

        Ok((last - first) / (count as f64 - 1.0))
    }

    fn dx_degrees(&self) -> Result<f64, CodesError> {
        self.increment(
            "iDirectionIncrementInDegrees",
            &["numberOfPointsAlongAParallel", "Ni"],
            "number of points in longitude",
            self.first_lon()?,
            self.last_lon()?,
        )
    }

    fn dy_degrees(&self) -> Result<f64, CodesError> {
        self.increment(
            "jDirectionIncrementInDegrees",
            &["numberOfPointsAlongAMeridian", "Nj"],
            "number of points in latitude",
            self.first_lat()?,
            self.last_lat()?,
        )
    }

    fn metric_increments(&self, x_key: &str, y_key: &str) -> Result<[f64; 2], CodesError> {
        let dx: f64 = self.md.require_key(x_key)?;
        let dy: f64 = self.md.require_key(y_key)?;
        Ok([dx.abs(), dy.abs()])
    }

    fn lat_lon(&self) -> Result<GridSpec, CodesError> {
        let grid = Grid::Increments([self.dx_degrees()?.abs(), self.dy_degrees()?.abs()]);
        let mut spec = GridSpec::new(self.grid_type, grid);
        spec.area = Some(self.area()?);
        Ok(spec)
    }

    fn reduced_lat_lon(&self) -> Result<GridSpec, CodesError> {
        let grid = Grid::Increment(self.dy_degrees()?.abs());
        let mut spec = GridSpec::new(self.grid_type, grid);
        spec.area = Some(self.area()?);
        Ok(spec)
    }

    fn gaussian(&self, label: char) -> Result<GridSpec, CodesError> {
        let n: i64 = self.md.require_key("N")?;
        let global = self.md.read_key_or::<i64>("global", 0)? == 1;

        let mut spec = GridSpec::new(self.grid_type, Grid::Name(format!("{label}{n}")));
        if !global {
            // first and last longitude regardless of the scan direction
            spec.area = Some([
                self.north()?,
                self.first_lon()?,
                self.south()?,
                self.last_lon()?,
            ]);
        }
        Ok(spec)
    }

    fn mercator(&self) -> Result<GridSpec, CodesError> {
        let grid = Grid::Increments(self.metric_increments("DiInMetres", "DjInMetres")?);
        let mut spec = GridSpec::new(self.grid_type, grid);
        spec.area = Some(self.area()?);

        self.add(
            &["Ni", "Nj", "LaDInDegrees", "orientationOfTheGridInDegrees"],
            &mut spec,
        )?;
        self.add(&EARTH_KEYS, &mut spec)?;
        Ok(spec)
    }

    fn first_point_grid(&self, increments: [f64; 2], keys: &[&str]) -> Result<GridSpec, CodesError> {
        let mut spec = GridSpec::new(self.grid_type, Grid::Increments(increments));
        spec.first_point = Some([self.first_lat()?, self.first_lon()?]);

        self.add(keys, &mut spec)?;
        self.add(&EARTH_KEYS, &mut spec)?;
        Ok(spec)
    }

    fn add_rotation(&self, spec: &mut GridSpec) -> Result<(), CodesError> {
        if !self.grid_type.is_rotated() {
            return Ok(());
        }

        spec.rotation = Some([
            self.md.require_key("latitudeOfSouthernPoleInDegrees")?,
            self.md.require_key("longitudeOfSouthernPoleInDegrees")?,
        ]);
        self.add(&["angleOfRotationInDegrees"], spec)
    }

    /// Copies the present, non-missing keys into the GridSpec under their vocabulary names.
    fn add(&self, keys: &[&str], spec: &mut GridSpec) -> Result<(), CodesError> {
        for key in keys {
            let name = vocabulary_name(key)?;

            match self.md.read_key_dynamic(key)? {
                None | Some(DynamicKeyType::Int(MISSING_VALUE)) => {}
                Some(value) => {
                    spec.extra.insert(name.to_owned(), value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridspec::make_gridspec;
    use crate::key_store::MemoryKeyStore;
    use crate::metadata::StandaloneMetadata;
    use anyhow::Result;
    use float_cmp::assert_approx_eq;

    fn lat_lon_store() -> MemoryKeyStore {
        MemoryKeyStore::new()
            .with_key("gridType", "regular_ll")
            .with_key("Ni", 2)
            .with_key("Nj", 2)
            .with_key("longitudeOfFirstGridPointInDegrees", 0.0)
            .with_key("longitudeOfLastGridPointInDegrees", 10.0)
            .with_key("latitudeOfFirstGridPointInDegrees", 0.0)
            .with_key("latitudeOfLastGridPointInDegrees", -10.0)
    }

    #[test]
    fn regular_lat_lon_from_point_counts() -> Result<()> {
        let md = StandaloneMetadata::new(lat_lon_store().with_key("iScansNegatively", 0));
        let spec = make_gridspec(&md)?;

        assert_eq!(spec.grid_type, GridType::RegularLl);
        assert_eq!(spec.grid, Grid::Increments([10.0, 10.0]));
        assert_eq!(spec.area, Some([0.0, 0.0, -10.0, 10.0]));
        assert_eq!(spec.rotation, None);
        Ok(())
    }

    #[test]
    fn scan_direction_precedence() -> Result<()> {
        let negative = StandaloneMetadata::new(lat_lon_store().with_key("iScansNegatively", 1));
        assert_eq!(x_scan_direction(&negative)?, ScanDirection::Negative);
        assert_eq!(make_gridspec(&negative)?.area, Some([0.0, 10.0, -10.0, 0.0]));

        let positive = StandaloneMetadata::new(lat_lon_store().with_key("iScansPositively", 1));
        assert_eq!(x_scan_direction(&positive)?, ScanDirection::Positive);

        let both = StandaloneMetadata::new(
            lat_lon_store()
                .with_key("iScansNegatively", 0)
                .with_key("iScansPositively", 1),
        );
        assert_eq!(x_scan_direction(&both)?, ScanDirection::Positive);

        let neither = StandaloneMetadata::new(lat_lon_store());
        assert!(matches!(
            make_gridspec(&neither),
            Err(CodesError::ScanDirection(_))
        ));
        Ok(())
    }

    #[test]
    fn single_point_axis() -> Result<()> {
        let md = StandaloneMetadata::new(
            lat_lon_store()
                .with_key("Ni", 1)
                .with_key("longitudeOfLastGridPointInDegrees", 0.0)
                .with_key("iScansNegatively", 0),
        );
        let spec = make_gridspec(&md)?;

        assert_eq!(spec.grid, Grid::Increments([1.0, 10.0]));
        Ok(())
    }

    #[test]
    fn missing_point_count_falls_through() -> Result<()> {
        let md = StandaloneMetadata::new(
            lat_lon_store()
                .with_key("numberOfPointsAlongAParallel", MISSING_VALUE)
                .with_key("Ni", 3)
                .with_key("iScansNegatively", 0),
        );
        let spec = make_gridspec(&md)?;
        assert_eq!(spec.grid, Grid::Increments([5.0, 10.0]));

        let md = StandaloneMetadata::new(
            lat_lon_store()
                .with_key("Ni", MISSING_VALUE)
                .with_key("iScansNegatively", 0),
        );
        match make_gridspec(&md) {
            Err(CodesError::MissingKeys { keys, .. }) => {
                assert_eq!(keys, vec!["numberOfPointsAlongAParallel", "Ni"]);
            }
            other => panic!("Incorrect result: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn explicit_increments_are_magnitudes() -> Result<()> {
        let md = StandaloneMetadata::new(
            lat_lon_store()
                .with_key("gridType", "rotated_ll")
                .with_key("iDirectionIncrementInDegrees", 0.25)
                .with_key("jDirectionIncrementInDegrees", -0.25)
                .with_key("latitudeOfSouthernPoleInDegrees", -40.0)
                .with_key("longitudeOfSouthernPoleInDegrees", 20.0)
                .with_key("angleOfRotationInDegrees", 0.0)
                .with_key("iScansNegatively", 0),
        );
        let spec = make_gridspec(&md)?;

        assert_eq!(spec.grid, Grid::Increments([0.25, 0.25]));
        assert_eq!(spec.rotation, Some([-40.0, 20.0]));
        assert_eq!(
            spec.get("angle_of_rotation"),
            Some(&DynamicKeyType::Float(0.0))
        );
        Ok(())
    }

    #[test]
    fn gaussian_labels() -> Result<()> {
        let store = MemoryKeyStore::new()
            .with_key("gridType", "reduced_gg")
            .with_key("N", 320)
            .with_key("global", 1)
            .with_key("iScansNegatively", 0)
            .with_key("jScansPositively", 0);

        let classic = make_gridspec(&StandaloneMetadata::new(store.clone()))?;
        assert_eq!(classic.grid, Grid::Name("N320".into()));
        assert_eq!(classic.area, None);

        let octahedral =
            make_gridspec(&StandaloneMetadata::new(store.clone().with_key("isOctahedral", 1)))?;
        assert_eq!(octahedral.grid, Grid::Name("O320".into()));

        let regular = make_gridspec(&StandaloneMetadata::new(
            store.with_key("gridType", "regular_gg"),
        ))?;
        assert_eq!(regular.grid, Grid::Name("F320".into()));
        Ok(())
    }

    #[test]
    fn lambert_azimuthal_increment_fallback() -> Result<()> {
        let md = StandaloneMetadata::new(
            MemoryKeyStore::new()
                .with_key("gridType", "lambert_azimuthal_equal_area")
                .with_key("xDirectionGridLengthInMetres", 5000.0)
                .with_key("DyInMetres", 2500.0)
                .with_key("latitudeOfFirstGridPointInDegrees", 67.0)
                .with_key("longitudeOfFirstGridPointInDegrees", -35.0)
                .with_key("Nx", 100)
                .with_key("Ny", 50)
                .with_key("standardParallelInDegrees", 52.0)
                .with_key("centralLongitudeInDegrees", 10.0)
                .with_key("shapeOfTheEarth", 5),
        );
        let spec = make_gridspec(&md)?;

        match spec.grid {
            Grid::Increments([dx, dy]) => {
                assert_approx_eq!(f64, dx, 5000.0);
                assert_approx_eq!(f64, dy, 2500.0);
            }
            other => panic!("Incorrect grid: {other:?}"),
        }
        assert_eq!(spec.first_point, Some([67.0, -35.0]));
        assert_eq!(spec.get("central_longitude"), Some(&DynamicKeyType::Float(10.0)));
        assert_eq!(spec.get("shape_of_the_earth"), Some(&DynamicKeyType::Int(5)));
        assert_eq!(spec.area, None);
        Ok(())
    }
}
