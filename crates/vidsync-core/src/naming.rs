//! Collection file names look like `B2004203_mo01_AmazingVideo.mov`:
//! an alphanumeric identifier, a four character type code (`m` for master,
//! `a` for access) and the title.

use crate::error::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9]+)_([ma][a-z]\d\d)_(.+)$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionName {
    pub identifier: String,
    pub filetype: String,
    pub title: String,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn parse_collection_file_path(path: &Path) -> Result<CollectionName, Error> {
    let stem = file_stem(path);
    let caps = FILE_REGEX.captures(&stem).ok_or_else(|| {
        Error::Naming(format!(
            "Can't find identifier, type and title in '{}'.",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ))
    })?;

    Ok(CollectionName {
        identifier: caps[1].to_string(),
        filetype: caps[2].to_string(),
        title: caps[3].to_string(),
    })
}

impl CollectionName {
    /// Name for a preservation master. With `flexible`, names outside the
    /// convention fall back to the bare file stem as the title.
    pub fn for_master(path: &Path, flexible: bool) -> Result<Self, Error> {
        match parse_collection_file_path(path) {
            Ok(name) if name.filetype.starts_with('m') => Ok(name),
            _ if flexible => Ok(CollectionName {
                identifier: String::new(),
                filetype: "m".to_string(),
                title: file_stem(path),
            }),
            _ => Err(Error::Naming(format!(
                "{} is not named like a collections preservation master file. Consider enabling flexible naming.",
                path.display()
            ))),
        }
    }
}
