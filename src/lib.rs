#![cfg_attr(docsrs, feature(doc_cfg))]
//!# GRIB field metadata on top of ecCodes key-value handles
//!
//!This crate provides a metadata facade for single GRIB messages (fields).
//!It does not decode GRIB itself: every key is read from and written to
//!a per-message key-value handle described by the [`KeyStore`] trait.
//!With the `eccodes` feature the handle is an ecCodes `codes_handle`
//!wrapped in `CodesKeyStore`, otherwise [`MemoryKeyStore`] can be used.
//!
//!On top of the raw keys the crate adds:
//!
//!- Derivation of a [`GridSpec`] (a compact, JSON-serializable description of the grid geometry)
//!from the keys of the message with [`make_gridspec()`], and the reverse conversion of a
//!`GridSpec` to GRIB keys with [`GridSpecConverter`].
//!
//!- Immutable override: [`override_with()`](GribMetadata::override_with) clones the handle,
//!applies a [`MetadataPatch`] and returns new [`StandaloneMetadata`], resizing the value buffer
//!when the grid changes.
//!
//!- [`RestrictedMetadata`], a view hiding the keys that describe the binary encoding of the message.
//!
//!- [`Geography`], access to gridpoint coordinates, grid shape, projection and bounding box,
//!including rotated grids.
//!
//![ecCodes](https://confluence.ecmwf.int/display/ECC/ecCodes+Home) is an open-source library
//!for reading and writing GRIB and BUFR files developed by [European Centre for Medium-Range Weather Forecasts](https://www.ecmwf.int/).
//!
//!## Usage
//!
//!### Accessing metadata
//!
//!Metadata comes in two ownership modes:
//!
//!- [`FieldMetadata`] borrows the handle of a field, and has its lifetime tied to it.
//!
//!- [`StandaloneMetadata`] owns its handle, which makes it independent of any field.
//!It is returned by [`override_with()`](GribMetadata::override_with) and
//![`from_buffer()`](StandaloneMetadata::from_buffer).
//!
//!Keys are read with [`get()`](GribMetadata::get) as [`DynamicKeyType`] or with the typed
//!methods of [`KeyRead`].
//!
//!### Example
//!
//!```
//!# use eccodes_metadata::{
//!#     DynamicKeyType, FieldMetadata, Grid, GridSpec, GridType, KeyRead, MemoryKeyStore, MetadataPatch,
//!# };
//!# fn main() -> anyhow::Result<()> {
//!let store = MemoryKeyStore::new()
//!    .with_key("edition", 2)
//!    .with_key("shortName", "2t")
//!    .with_key("gridType", "regular_ll")
//!    .with_key("iDirectionIncrementInDegrees", 1.0)
//!    .with_key("jDirectionIncrementInDegrees", 1.0)
//!    .with_key("latitudeOfFirstGridPointInDegrees", 90.0)
//!    .with_key("longitudeOfFirstGridPointInDegrees", 0.0)
//!    .with_key("latitudeOfLastGridPointInDegrees", -90.0)
//!    .with_key("longitudeOfLastGridPointInDegrees", 359.0)
//!    .with_key("iScansNegatively", 0);
//!
//!let metadata = FieldMetadata::new(&store);
//!
//!let gridspec = metadata.gridspec()?;
//!assert_eq!(gridspec.grid, Grid::Increments([1.0, 1.0]));
//!
//!// Change the grid to O32 and the short name, the field is not modified
//!let patch = MetadataPatch::new()
//!    .key("shortName", "2d")
//!    .gridspec(GridSpec::new(GridType::ReducedGg, Grid::Name("O32".into())));
//!let new_metadata = metadata.override_with(patch)?;
//!
//!assert_eq!(new_metadata.require_key::<String>("shortName")?, "2d");
//!assert_eq!(metadata.require_key::<String>("shortName")?, "2t");
//!assert_eq!(new_metadata.get("gridType")?, Some(DynamicKeyType::Str("reduced_gg".into())));
//!# Ok(())
//!# }
//!```
//!
//!### ecCodes installation
//!
//!With the `eccodes` feature this crate uses [eccodes-sys](https://crates.io/crates/eccodes-sys)
//!with default options to link ecCodes.
//!Check `eccodes-sys` website for more details on how it links the library.
//!
//!The reccomended way to install ecCodes on your computer is using your package manager.
//!For example, on Ubuntu you can use `apt-get`:
//!
//!```bash
//!$ sudo apt-get install libeccodes-dev
//!```
//!
//!Geography of reduced rotated Gaussian grids requires ecCodes 2.35.0 or newer.
//!
//!### Features
//!
//!- `eccodes` - enables `CodesKeyStore`, the [`KeyStore`] backed by the ecCodes library.
//!
//!- `message_ndarray` - enables returning gridpoint coordinates as [`ndarray`](https://docs.rs/ndarray)
//!arrays shaped like the grid. Enabled by default.
//!
//!- `docs` - builds the crate without linking ecCodes, particularly useful when building the documentation
//!on [docs.rs](https://docs.rs/). For more details check documentation of [eccodes-sys](https://crates.io/crates/eccodes-sys).
//!

pub mod errors;
pub mod geography;
pub mod gridspec;
#[cfg(feature = "eccodes")]
mod intermediate_bindings;
pub mod key_store;
pub mod metadata;
#[cfg(feature = "eccodes")]
mod pointer_guard;

pub use errors::CodesError;
pub use fallible_iterator::{FallibleIterator, IntoFallibleIterator};
pub use geography::{
    unrotate, BoundingBox, Geography, GridShape, MarsGrid, Projection, Resolution, Rotation,
};
pub use gridspec::{make_gridspec, Grid, GridSpec, GridSpecConverter, GridType};
#[cfg(feature = "eccodes")]
#[cfg_attr(docsrs, doc(cfg(feature = "eccodes")))]
pub use key_store::CodesKeyStore;
pub use key_store::{
    DynamicKeyType, FromKeyValue, KeyPatch, KeyRead, KeyStore, LibraryVersion, MemoryKeyStore,
    TemporaryKey, MISSING_VALUE,
};
pub use metadata::{
    CustomKey, CustomValue, DumpSelection, FieldMetadata, GribMetadata, MetadataPatch,
    NamespaceDump, OverrideOptions, RestrictedMetadata, StandaloneMetadata,
};
