//! Board revision detection from the identification file

use std::path::Path;

use crate::fs::Filesystem;

/// Board hardware generation
pub type Revision = u8;

/// Revision used when detection fails
pub const DEFAULT_REVISION: Revision = 3;

/// Board identification file
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Known revision codes, grouped by the mapping revision they select
const REVISION_CODES: &[(Revision, &[&str])] = &[
    (0, &["0011", "0014"]),
    (1, &["0002", "0003"]),
    (
        2,
        &[
            "0004", "0005", "0006", "0007", "0008", "0009", "000d", "000e", "000f",
        ],
    ),
    (3, &["0010", "0012", "0013"]),
];

/// Extract the token following the first `Revision :` label
pub fn revision_code(text: &str) -> Option<&str> {
    text.lines().find_map(|line| {
        let (label, value) = line.split_once(':')?;
        let value = value.trim();
        (label.trim() == "Revision" && !value.is_empty()).then_some(value)
    })
}

/// Look up the mapping revision whose bucket contains `code`
pub fn revision_for_code(code: &str) -> Option<Revision> {
    REVISION_CODES
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(revision, _)| *revision)
}

/// Parse identification file contents into a mapping revision
pub fn revision_from_cpuinfo(text: &str) -> Option<Revision> {
    revision_code(text).and_then(revision_for_code)
}

/// Determine the board revision from the identification file at `path`
///
/// Never fails: a missing, unreadable or unrecognized file yields `default`.
pub async fn resolve_revision<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    default: Revision,
) -> Revision {
    if !fs.exists(path) {
        log::warn!(
            "{} not found, using default revision {}",
            path.display(),
            default
        );
        return default;
    }

    let text = match fs.read_text(path).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!(
                "Cannot read {}: {}, using default revision {}",
                path.display(),
                e,
                default
            );
            return default;
        }
    };

    match revision_code(&text) {
        Some(code) => match revision_for_code(code) {
            Some(revision) => {
                log::debug!("Board revision code {} maps to revision {}", code, revision);
                revision
            }
            None => {
                log::warn!(
                    "Unknown board revision code {}, using default revision {}",
                    code,
                    default
                );
                default
            }
        },
        None => {
            log::warn!(
                "No revision found in {}, using default revision {}",
                path.display(),
                default
            );
            default
        }
    }
}
