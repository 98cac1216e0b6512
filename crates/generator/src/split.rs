//! Volumes of a (possibly split) package set.
//!
//! The configuration is never rewritten per volume; each volume derives the
//! base URL its locations are published under.

use repodata_config::RunConfig;
use std::path::PathBuf;

/// One package directory, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub index: usize,
    pub directory: PathBuf,
}

impl Volume {
    /// Every volume of the run. Without split media there is exactly one.
    pub fn all(config: &RunConfig) -> Vec<Self> {
        let directories = match config.split {
            true => config.directories.as_slice(),
            false => &config.directories[..config.directories.len().min(1)],
        };
        directories
            .iter()
            .enumerate()
            .map(|(offset, directory)| Self { index: offset + 1, directory: directory.clone() })
            .collect()
    }

    /// The `xml:base` of packages on this volume.
    pub fn base_url(&self, config: &RunConfig) -> Option<String> {
        let base = config.base_url.as_deref().filter(|url| !url.is_empty())?;
        Some(match config.split {
            true => with_fragment(base, self.index),
            false => base.to_string(),
        })
    }
}

/// The `xml:base` of manifest locations: always that of the first volume.
pub fn manifest_base_url(config: &RunConfig) -> Option<String> {
    Volume { index: 1, directory: PathBuf::new() }.base_url(config)
}

/// `url` with its fragment identifier set to `index`.
pub fn with_fragment(url: &str, index: usize) -> String {
    let base = url.split_once('#').map_or(url, |(base, _)| base);
    format!("{base}#{index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn split(base_url: Option<&str>) -> RunConfig {
        RunConfig {
            split: true,
            base_url: base_url.map(str::to_string),
            directories: vec!["cd1".into(), "cd2".into(), "cd3".into()],
            ..RunConfig::default()
        }
    }

    #[rstest]
    #[case("media://1234", 2, "media://1234#2")]
    #[case("media://1234#1", 3, "media://1234#3")]
    #[case("media://1234#", 1, "media://1234#1")]
    fn test_with_fragment(#[case] url: &str, #[case] index: usize, #[case] expected: &str) {
        assert_eq!(with_fragment(url, index), expected);
    }

    #[test]
    fn test_volumes_are_numbered_from_one() {
        let volumes = Volume::all(&split(None));
        assert_eq!(volumes.iter().map(|v| v.index).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(volumes[2].directory, PathBuf::from("cd3"));
    }

    #[test]
    fn test_per_volume_base_url() {
        let config = split(Some("media://1234#9"));
        let volumes = Volume::all(&config);
        assert_eq!(volumes[1].base_url(&config).as_deref(), Some("media://1234#2"));
        assert_eq!(manifest_base_url(&config).as_deref(), Some("media://1234#1"));
        // The configuration itself is untouched.
        assert_eq!(config.base_url.as_deref(), Some("media://1234#9"));
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn test_unset_base_url_stays_unset(#[case] base_url: Option<&str>) {
        let config = split(base_url);
        assert!(Volume::all(&config).iter().all(|volume| volume.base_url(&config).is_none()));
        assert_eq!(manifest_base_url(&config), None);
    }

    #[test]
    fn test_without_split_media() {
        let config = RunConfig {
            base_url: Some("http://mirror.example/os#frag".to_string()),
            directories: vec!["os".into()],
            ..RunConfig::default()
        };
        let volumes = Volume::all(&config);
        assert_eq!(volumes, [Volume { index: 1, directory: "os".into() }]);
        assert_eq!(volumes[0].base_url(&config).as_deref(), Some("http://mirror.example/os#frag"));
    }
}
