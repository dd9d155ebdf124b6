//! Album aliases: short names mapped to Sonos favorite ids.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;

use crate::auth::storage::{write_atomically, StorageError};

const FIELD_PREFIX: &str = "aliases[";

/// Alias → favorite id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap(BTreeMap<String, String>);

impl AliasMap {
    pub fn favorite_for(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).map(String::as_str)
    }

    pub fn alias_for(&self, favorite_id: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, id)| id.as_str() == favorite_id)
            .map(|(alias, _)| alias.as_str())
    }

    pub fn insert(&mut self, alias: &str, favorite_id: &str) {
        self.0.insert(alias.to_owned(), favorite_id.to_owned());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the map from submitted `aliases[<favorite id>]=<alias>` fields.
    /// Aliases are trimmed; empty ones are skipped.
    pub fn from_form<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = AliasMap::default();

        for (key, value) in fields {
            let favorite_id = match key
                .strip_prefix(FIELD_PREFIX)
                .and_then(|rest| rest.strip_suffix(']'))
            {
                Some(id) => id,
                None => continue,
            };

            let alias = value.trim();
            if !alias.is_empty() {
                map.insert(alias, favorite_id);
            }
        }

        map
    }

    /// Drops aliases pointing at favorites that no longer exist.
    /// Returns whether anything was removed.
    pub fn prune<'a, I>(&mut self, valid_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let valid: Vec<&str> = valid_ids.into_iter().collect();
        let before = self.0.len();

        self.0.retain(|_, id| valid.contains(&id.as_str()));

        self.0.len() != before
    }
}

#[derive(Debug)]
pub struct AliasStore {
    filename: PathBuf,
}

impl AliasStore {
    pub fn new(filename: PathBuf) -> Self {
        Self { filename }
    }

    /// A missing or unreadable file is an empty map.
    pub fn load(&self) -> AliasMap {
        let file = match File::open(&self.filename) {
            Ok(file) => file,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    log::warn!("failed to open {:?}: {}", self.filename, err);
                }
                return AliasMap::default();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(map) => AliasMap(map),
            Err(err) => {
                log::warn!("ignoring unreadable alias map {:?}: {}", self.filename, err);
                AliasMap::default()
            }
        }
    }

    pub fn save(&self, map: &AliasMap) -> Result<(), StorageError> {
        log::debug!("saving {} aliases to {:?}", map.len(), self.filename);

        write_atomically(&self.filename, |writer| {
            serde_json::to_writer_pretty(writer, &map.0).map_err(StorageError::from)
        })
    }
}
