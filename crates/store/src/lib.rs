//! The multi-resolution image store: a typed, tagged, dated container
//! governing raster lifetimes, sharing and cropping for the duration of one
//! fusion job.

use std::collections::HashMap;

use inf::{Context, Error, Result};
use raster::{AnyRaster, RasterSize};

/// Key identifying one raster in the store: a resolution tag ("high",
/// "low", ...) and a calendar date, represented as an opaque integer
/// ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub tag: String,
    pub date: i64,
}

impl ImageKey {
    pub fn new(tag: impl Into<String>, date: i64) -> Self {
        ImageKey { tag: tag.into(), date }
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.tag, self.date)
    }
}

/// Mapping from `(tag, date)` to `Raster`, owning the rasters for the
/// duration of one fusion job. All rasters inserted into one store must
/// agree on `{width, height, channels}`; the first insertion fixes that
/// shape for the lifetime of the store.
#[derive(Debug, Default)]
pub struct ImageStore {
    rasters: HashMap<ImageKey, AnyRaster>,
    shape: Option<(RasterSize, usize)>,
}

impl ImageStore {
    pub fn new() -> Self {
        ImageStore::default()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Inserts or replaces the raster at `(tag, date)`. Fails with
    /// `size_mismatch` if its shape disagrees with rasters already in the
    /// store.
    pub fn set(&mut self, tag: impl Into<String>, date: i64, raster: AnyRaster) -> Result<()> {
        let key = ImageKey::new(tag, date);
        let shape = (raster.size(), raster.channels());
        match self.shape {
            None => self.shape = Some(shape),
            Some(expected) if expected != shape => {
                return Err(Error::size_mismatch(format!(
                    "raster {key} has shape {:?}x{} channels, store expects {:?}x{} channels",
                    shape.0, shape.1, expected.0, expected.1
                )))
                .context_tag(key.tag);
            }
            Some(_) => {}
        }

        log::debug!("store: inserting {key}");
        self.rasters.insert(key, raster);
        Ok(())
    }

    pub fn has(&self, tag: &str, date: i64) -> bool {
        self.rasters.contains_key(&ImageKey::new(tag, date))
    }

    pub fn get(&self, tag: &str, date: i64) -> Result<&AnyRaster> {
        self.rasters
            .get(&ImageKey::new(tag, date))
            .ok_or_else(|| Error::not_found(format!("({tag}, {date})")))
            .context_tag(tag)
            .context_date(date)
    }

    pub fn remove(&mut self, tag: &str, date: i64) -> Result<AnyRaster> {
        let key = ImageKey::new(tag, date);
        let removed = self
            .rasters
            .remove(&key)
            .ok_or_else(|| Error::not_found(format!("{key}")))?;
        log::debug!("store: evicted {key}");
        Ok(removed)
    }

    /// Returns an arbitrary raster from the store, used by probes that only
    /// need to inspect the common shape.
    pub fn get_any(&self) -> Result<&AnyRaster> {
        self.rasters
            .values()
            .next()
            .ok_or_else(|| Error::not_found("store is empty"))
    }

    pub fn keys(&self) -> impl Iterator<Item = &ImageKey> {
        self.rasters.keys()
    }
}

#[cfg(test)]
mod tests {
    use raster::{Raster, RasterSize};

    use super::*;

    fn sample(size: RasterSize) -> AnyRaster {
        Raster::<u8>::new(size, 1).unwrap().into()
    }

    #[test]
    fn insert_query_and_remove_round_trip() {
        let mut store = ImageStore::new();
        store.set("high", 1, sample(RasterSize::with_rows_cols(4, 4))).unwrap();
        assert!(store.has("high", 1));
        assert!(store.get("high", 1).is_ok());

        store.remove("high", 1).unwrap();
        assert!(!store.has("high", 1));
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = ImageStore::new();
        let err = store.get("high", 1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn disagreeing_shape_is_rejected() {
        let mut store = ImageStore::new();
        store.set("high", 1, sample(RasterSize::with_rows_cols(4, 4))).unwrap();
        let err = store.set("low", 1, sample(RasterSize::with_rows_cols(2, 2))).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::SizeMismatch(_)));
    }
}
