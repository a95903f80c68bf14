//! Channel list loading.

use crate::error::{AppResult, ProfileError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::Path;

/// Ordered channel names, loaded once and never modified.
///
/// Names are kept exactly as they appear in the file apart from the line
/// terminator. Duplicates and blank lines in the middle of the file are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList(Vec<String>);

impl ChannelList {
    /// Read a newline-delimited channel file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let channel_list_err = |source| ProfileError::ChannelList {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(channel_list_err)?;
        let names = BufReader::new(file)
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .map_err(channel_list_err)?;
        Ok(Self(names))
    }

    /// The first `n` channels, or all of them if fewer are loaded.
    pub fn prefix(&self, n: usize) -> &[String] {
        &self.0[..n.min(self.0.len())]
    }
}

impl From<Vec<String>> for ChannelList {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl Deref for ChannelList {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
