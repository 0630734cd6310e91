//! Lenient SDK version parsing.

use semver::Version;

/// Parses SDK-style version strings into a [`Version`].
///
/// Accepts one, two or three numeric components (`8`, `8.0`, `8.0.100`) and an
/// optional pre-release suffix (`0.1.0-preview`). A fourth numeric component is
/// dropped. Returns `None` for anything else.
pub fn parse_version(input: &str) -> Option<Version> {
    let input = input.trim().trim_start_matches('v');
    if input.is_empty() {
        return None;
    }

    let (numbers, pre) = match input.split_once('-') {
        Some((numbers, pre)) => (numbers, Some(pre)),
        None => (input, None),
    };

    let mut parts = numbers
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    parts.resize(3, 0);

    let normalized = match pre {
        Some(pre) => format!("{}.{}.{}-{}", parts[0], parts[1], parts[2], pre),
        None => format!("{}.{}.{}", parts[0], parts[1], parts[2]),
    };
    Version::parse(&normalized).ok()
}

/// Returns true if `version` lies within `[min, max]`, inclusive.
pub fn version_in_range(version: &Version, min: &Version, max: &Version) -> bool {
    version >= min && version <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_forms() {
        assert_eq!(parse_version("8").unwrap(), Version::new(8, 0, 0));
        assert_eq!(parse_version("8.0").unwrap(), Version::new(8, 0, 0));
        assert_eq!(parse_version("8.0.100").unwrap(), Version::new(8, 0, 100));
        assert_eq!(parse_version(" v3.1.2 ").unwrap(), Version::new(3, 1, 2));
        assert_eq!(parse_version("1.2.3.4").unwrap(), Version::new(1, 2, 3));
        assert_eq!(
            parse_version("0.1.0-preview").unwrap().pre.as_str(),
            "preview"
        );
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(parse_version("").is_none());
        assert!(parse_version("latest").is_none());
        assert!(parse_version("1..2").is_none());
        assert!(parse_version("1.2.3.4.5").is_none());
    }

    #[test]
    fn test_version_in_range_is_inclusive() {
        let min = Version::new(0, 1, 0);
        let max = Version::new(0, 2, 0);
        assert!(version_in_range(&Version::new(0, 1, 0), &min, &max));
        assert!(version_in_range(&Version::new(0, 2, 0), &min, &max));
        assert!(!version_in_range(&Version::new(0, 2, 1), &min, &max));
        assert!(!version_in_range(&Version::new(0, 0, 9), &min, &max));
    }
}
