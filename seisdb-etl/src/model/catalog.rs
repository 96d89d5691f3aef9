//! Catalog association
//!
//! Every evaluation consumed one observed-seismicity catalog. The catalog
//! is not referenced by the evaluation artifact itself; it is recovered
//! from the date-scoped observation directory by reading each metadata
//! side-file, keeping only canonical catalog entries, and matching the
//! evaluation's creation date against theirs. Without an exact match the
//! earliest retained catalog stands in, so an evaluation that never ran
//! still points at the catalog it would have consumed.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use seisdb_common::status::CatalogStatus;
use seisdb_common::{time, Result};

use crate::locate::{Sidecar, META_SUFFIX};
use crate::model::classify_required;

/// Declared type marking a canonical catalog metadata entry
pub const CATALOG_TYPE: &str = "catalog.nodecl.dat";

/// The catalog associated with one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub result_filepath: Option<PathBuf>,
    pub status: CatalogStatus,
    pub creation_date: Option<String>,
}

/// Resolves catalogs for one forecast's evaluations
#[derive(Debug, Clone, Copy)]
pub struct CatalogResolver<'a> {
    observation_dir: Option<&'a Path>,
    waiting_period: Option<i64>,
    evaluation_day_offset: i64,
}

impl<'a> CatalogResolver<'a> {
    pub fn new(
        observation_dir: Option<&'a Path>,
        waiting_period: Option<i64>,
        evaluation_day_offset: i64,
    ) -> Self {
        Self {
            observation_dir,
            waiting_period,
            evaluation_day_offset,
        }
    }

    /// Resolve the catalog for an evaluation expected on `date`
    ///
    /// `evaluation_creation` is the evaluation's own creation date when
    /// known; an exact match against a retained catalog's creation date
    /// wins, the earliest retained catalog is the fallback.
    pub fn resolve(
        &self,
        date: NaiveDateTime,
        evaluation_creation: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Catalog> {
        let retained = self.retained_catalogs(date)?;

        let selected = evaluation_creation
            .and_then(|creation| retained.get_key_value(creation))
            .or_else(|| retained.iter().next());

        let (result_filepath, creation_date, found) = match selected {
            Some((creation, meta_path)) => {
                let result_path = meta_path.with_extension("");
                let found = result_path.is_file();
                let creation = (!creation.is_empty()).then(|| creation.clone());
                (Some(result_path), creation, found)
            }
            None => (None, None, false),
        };

        let subject = format!("catalog expected {}", time::date_to_text(date));
        let status = classify_required(
            found,
            date,
            self.waiting_period,
            now,
            self.evaluation_day_offset,
            &subject,
        )?
        .into();

        Ok(Catalog {
            result_filepath,
            status,
            creation_date,
        })
    }

    /// Canonical catalog metadata entries in the day directory, keyed by
    /// creation date (an entry without one keys on the empty string)
    fn retained_catalogs(&self, date: NaiveDateTime) -> Result<BTreeMap<String, PathBuf>> {
        let mut retained = BTreeMap::new();
        let Some(dir) = self.observation_dir else {
            return Ok(retained);
        };
        let day_dir = dir.join(time::date_to_text(date));
        let entries = match std::fs::read_dir(&day_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(retained),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let meta_path = entry?.path();
            if !meta_path
                .to_string_lossy()
                .ends_with(META_SUFFIX)
            {
                continue;
            }
            let text = match std::fs::read_to_string(&meta_path) {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if declared_type(&text) != CATALOG_TYPE {
                continue;
            }
            let creation = Sidecar::parse(text).creation_date().unwrap_or_default();
            retained.insert(creation, meta_path);
        }
        Ok(retained)
    }
}

/// Declared type of a metadata file: its first line, leading `#` stripped
fn declared_type(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    first_line
        .strip_prefix('#')
        .unwrap_or(first_line)
        .trim()
        .to_string()
}
