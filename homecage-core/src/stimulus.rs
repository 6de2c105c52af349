use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One curriculum step. Both plates show the reward image; the non-reward image is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusSet {
    /// 1-based identity taken from the file name.
    pub index: u32,
    pub reward_image: Option<PathBuf>,
    pub non_reward_image: Option<PathBuf>,
}

impl StimulusSet {
    pub fn placeholder(index: u32) -> Self {
        Self {
            index,
            reward_image: None,
            non_reward_image: None,
        }
    }

    pub fn label(&self) -> String {
        format!("stim_{:02}", self.index)
    }

    pub fn left_image(&self) -> Option<&Path> {
        self.reward_image.as_deref()
    }

    pub fn right_image(&self) -> Option<&Path> {
        self.reward_image.as_deref()
    }

    pub fn has_images(&self) -> bool {
        self.reward_image.is_some()
    }
}

/// File name of an optional image path, empty when absent.
pub fn image_name(path: Option<&Path>) -> String {
    path.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusSource {
    /// Scan a directory for `stim_<N>_r.png` / `stim_<N>_nr.png`.
    Directory { path: PathBuf, dummy_sets: u32 },
    /// No images; plates only.
    Placeholder { count: u32 },
}

impl Default for StimulusSource {
    fn default() -> Self {
        StimulusSource::Placeholder { count: 1 }
    }
}

#[derive(Debug, Error)]
pub enum StimulusError {
    #[error("stimulus directory {path} not found")]
    Missing { path: PathBuf },
    #[error("failed to read stimulus directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a directory source fell back to placeholder sets.
#[derive(Debug)]
pub enum FallbackReason {
    Unreadable(StimulusError),
    NoImages(PathBuf),
}

/// Ordered stimulus sets for a run.
#[derive(Debug)]
pub struct Curriculum {
    pub sets: Vec<StimulusSet>,
    pub fallback: Option<FallbackReason>,
}

impl Curriculum {
    pub fn load(source: &StimulusSource) -> Self {
        match source {
            StimulusSource::Placeholder { count } => Self {
                sets: placeholders(*count),
                fallback: None,
            },
            StimulusSource::Directory { path, dummy_sets } => match discover(path) {
                Ok(sets) if !sets.is_empty() => Self {
                    sets,
                    fallback: None,
                },
                Ok(_) => Self {
                    sets: placeholders(*dummy_sets),
                    fallback: Some(FallbackReason::NoImages(path.clone())),
                },
                Err(err) => Self {
                    sets: placeholders(*dummy_sets),
                    fallback: Some(FallbackReason::Unreadable(err)),
                },
            },
        }
    }
}

fn placeholders(count: u32) -> Vec<StimulusSet> {
    (1..=count.max(1)).map(StimulusSet::placeholder).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageRole {
    Reward,
    NonReward,
}

/// Parses `stim_<N>_r.png` / `stim_<N>_nr.png`, case-insensitively.
fn parse_name(name: &str) -> Option<(u32, ImageRole)> {
    let lower = name.to_ascii_lowercase();
    let rest = lower.strip_prefix("stim_")?.strip_suffix(".png")?;
    let (digits, role) = if let Some(d) = rest.strip_suffix("_nr") {
        (d, ImageRole::NonReward)
    } else {
        (rest.strip_suffix("_r")?, ImageRole::Reward)
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // set indices are 1-based
    digits.parse::<u32>().ok().filter(|&n| n > 0).map(|n| (n, role))
}

/// Lists stimulus sets in `dir`, ordered by index.
///
/// Indices with both images win; if none are paired, every index with a reward image is used.
pub fn discover(dir: &Path) -> Result<Vec<StimulusSet>, StimulusError> {
    if !dir.is_dir() {
        return Err(StimulusError::Missing {
            path: dir.to_path_buf(),
        });
    }
    let read_err = |source| StimulusError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut reward = BTreeMap::new();
    let mut non_reward = BTreeMap::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name();
        let Some((index, role)) = parse_name(&name.to_string_lossy()) else {
            continue;
        };
        match role {
            ImageRole::Reward => reward.insert(index, entry.path()),
            ImageRole::NonReward => non_reward.insert(index, entry.path()),
        };
    }

    let paired: Vec<StimulusSet> = reward
        .iter()
        .filter_map(|(index, r)| {
            non_reward.get(index).map(|nr| StimulusSet {
                index: *index,
                reward_image: Some(r.clone()),
                non_reward_image: Some(nr.clone()),
            })
        })
        .collect();
    if !paired.is_empty() {
        return Ok(paired);
    }

    Ok(reward
        .into_iter()
        .map(|(index, r)| StimulusSet {
            index,
            reward_image: Some(r),
            non_reward_image: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn parses_stimulus_names() {
        assert_eq!(parse_name("stim_01_r.png"), Some((1, ImageRole::Reward)));
        assert_eq!(parse_name("STIM_12_NR.PNG"), Some((12, ImageRole::NonReward)));
        assert_eq!(parse_name("stim__r.png"), None);
        assert_eq!(parse_name("stim_1_x.png"), None);
        assert_eq!(parse_name("stim_1_r.jpg"), None);
        assert_eq!(parse_name("stim_00_r.png"), None);
        assert_eq!(parse_name("stim_0_nr.png"), None);
    }

    #[test]
    fn pairs_take_priority() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "stim_03_r.png");
        touch(dir.path(), "stim_03_nr.png");
        touch(dir.path(), "stim_01_r.png");
        touch(dir.path(), "stim_02_r.png");
        touch(dir.path(), "stim_02_nr.png");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "stim_00_r.png");
        touch(dir.path(), "stim_00_nr.png");

        let sets = discover(dir.path()).unwrap();
        let indices: Vec<u32> = sets.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(sets[0].label(), "stim_02");
        assert_eq!(image_name(sets[0].left_image()), "stim_02_r.png");
    }

    #[test]
    fn reward_only_sets_when_unpaired() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "stim_10_r.png");
        touch(dir.path(), "stim_2_r.png");
        let sets = discover(dir.path()).unwrap();
        assert_eq!(sets.iter().map(|s| s.index).collect::<Vec<_>>(), vec![2, 10]);
        assert!(sets.iter().all(|s| s.non_reward_image.is_none()));
    }

    #[test]
    fn empty_or_missing_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Curriculum::load(&StimulusSource::Directory {
            path: dir.path().to_path_buf(),
            dummy_sets: 3,
        });
        assert_eq!(empty.sets.len(), 3);
        assert!(matches!(empty.fallback, Some(FallbackReason::NoImages(_))));

        let missing = Curriculum::load(&StimulusSource::Directory {
            path: dir.path().join("nope"),
            dummy_sets: 2,
        });
        assert_eq!(missing.sets.len(), 2);
        assert!(matches!(
            missing.fallback,
            Some(FallbackReason::Unreadable(StimulusError::Missing { .. }))
        ));
        assert!(!missing.sets[0].has_images());
    }
}
