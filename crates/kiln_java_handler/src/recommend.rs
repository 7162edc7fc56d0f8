//! Which Java a game version wants, for when its
//! version JSON doesn't say (`javaVersion` was added in 1.17
//! and back-filled unevenly).

/// Releases, newest first: `(minor, patch)` from which `major` is needed.
const RELEASE_TABLE: &[((u32, u32), u32)] = &[((20, 5), 21), ((18, 0), 17), ((17, 0), 16)];

/// Snapshots (`24w14a`), newest first: `(year, week)` from which `major` is needed.
const SNAPSHOT_TABLE: &[((u32, u32), u32)] = &[((24, 14), 21), ((21, 37), 17), ((20, 45), 16)];

/// Newest runtime, used for versions this table doesn't know about yet.
pub const NEWEST_MAJOR: u32 = 21;
pub const LEGACY_MAJOR: u32 = 8;

/// Recommended Java major version for a game version id.
///
/// ```
/// use kiln_java_handler::recommend;
/// assert_eq!(recommend("1.20.1"), 17);
/// assert_eq!(recommend("1.12.2"), 8);
/// ```
#[must_use]
pub fn recommend(game_version: &str) -> u32 {
    // `1.20.5-pre1`, `1.18-rc3`
    let base = game_version
        .split_once(['-', ' '])
        .map_or(game_version, |(base, _)| base);

    if let Some((minor, patch)) = parse_release(base) {
        return lookup(RELEASE_TABLE, (minor, patch));
    }
    if let Some((year, week)) = parse_snapshot(base) {
        return lookup(SNAPSHOT_TABLE, (year, week));
    }
    if is_ancient(base) {
        return LEGACY_MAJOR;
    }
    NEWEST_MAJOR
}

fn lookup(table: &[((u32, u32), u32)], key: (u32, u32)) -> u32 {
    table
        .iter()
        .find(|(from, _)| key >= *from)
        .map_or(LEGACY_MAJOR, |(_, major)| *major)
}

/// `1.20.1` -> `(20, 1)`, `1.18` -> `(18, 0)`
fn parse_release(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.split('.');
    if parts.next()? != "1" {
        return None;
    }
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(patch) => patch.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((minor, patch))
}

/// `23w45a` -> `(23, 45)`
fn parse_snapshot(version: &str) -> Option<(u32, u32)> {
    let (year, rest) = version.split_once('w')?;
    if year.len() != 2 || rest.len() < 3 {
        return None;
    }
    let week = rest.get(0..2)?;
    Some((year.parse().ok()?, week.parse().ok()?))
}

/// Alpha, beta, classic, indev and infdev ids
/// (`b1.7.3`, `a1.2.6`, `c0.30_01c`, `rd-132211`, `inf-20100618`).
fn is_ancient(version: &str) -> bool {
    ["a1.", "b1.", "c0.", "rd", "inf", "in-"]
        .iter()
        .any(|prefix| version.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases() {
        assert_eq!(recommend("1.21"), 21);
        assert_eq!(recommend("1.20.6"), 21);
        assert_eq!(recommend("1.20.5"), 21);
        assert_eq!(recommend("1.20.4"), 17);
        assert_eq!(recommend("1.18"), 17);
        assert_eq!(recommend("1.17.1"), 16);
        assert_eq!(recommend("1.16.5"), 8);
        assert_eq!(recommend("1.8.9"), 8);
    }

    #[test]
    fn prereleases_use_their_base() {
        assert_eq!(recommend("1.20.5-pre1"), 21);
        assert_eq!(recommend("1.18-rc3"), 17);
        assert_eq!(recommend("1.14 Pre-Release 2"), 8);
    }

    #[test]
    fn snapshots() {
        assert_eq!(recommend("24w14a"), 21);
        assert_eq!(recommend("23w45a"), 17);
        assert_eq!(recommend("21w19a"), 16);
        assert_eq!(recommend("19w14a"), 8);
    }

    #[test]
    fn old_and_unknown() {
        assert_eq!(recommend("b1.7.3"), 8);
        assert_eq!(recommend("rd-132211"), 8);
        assert_eq!(recommend("c0.30_01c"), 8);
        assert_eq!(recommend("some-future-id"), NEWEST_MAJOR);
    }
}
