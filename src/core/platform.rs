//! Platform name normalization
//!
//! Requests, registry keys and outcome keys all use the same normalized form.

/// Suffix tokens stripped from platform names before lookup
const KNOWN_SUFFIXES: &[&str] = &["strategy", "adapter", "plugin"];

/// Separators left behind once a suffix token is removed
const SEPARATORS: &[char] = &['-', '_', '.', ' '];

/// Normalize a platform name for registry lookup
///
/// Case-folds the name and strips known suffix tokens, so that
/// `"InstagramStrategy"`, `"tiktok-adapter"` and `"YouTube"` resolve to
/// `"instagram"`, `"tiktok"` and `"youtube"`.
///
/// # Examples
///
/// ```
/// use video_publisher::core::normalize_platform_name;
///
/// assert_eq!(normalize_platform_name("InstagramStrategy"), "instagram");
/// assert_eq!(normalize_platform_name(" TikTok_Plugin "), "tiktok");
/// ```
pub fn normalize_platform_name(name: &str) -> String {
    let mut normalized = name.trim().to_lowercase();

    loop {
        let stripped = KNOWN_SUFFIXES.iter().find_map(|suffix| {
            normalized
                .strip_suffix(*suffix)
                .map(|rest| rest.trim_end_matches(SEPARATORS))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
        });

        match stripped {
            Some(rest) => normalized = rest,
            None => return normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_platform_name() {
        assert_eq!(normalize_platform_name("instagram"), "instagram");
        assert_eq!(normalize_platform_name("InStAgRaM"), "instagram");
        assert_eq!(normalize_platform_name("InstagramStrategy"), "instagram");
        assert_eq!(normalize_platform_name("tiktok-adapter"), "tiktok");
        assert_eq!(normalize_platform_name("YouTube Plugin"), "youtube");
        assert_eq!(normalize_platform_name("  TikTok  "), "tiktok");
    }

    #[test]
    fn test_normalize_keeps_bare_suffix_token() {
        assert_eq!(normalize_platform_name("Plugin"), "plugin");
        assert_eq!(normalize_platform_name(""), "");
    }
}
