//! Name parsing for library directories and files.

use std::sync::OnceLock;

use regex::Regex;

fn movie_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\s*\((\d{4})\)\s*$").expect("valid regex"))
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn episode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)s(\d+)\s*e(\d+)").expect("valid regex"))
}

/// Split `Title (Year)` into a title and year. Dots in the title become
/// spaces. Without a trailing year the whole name is the title.
pub fn parse_movie_name(name: &str) -> (String, Option<u16>) {
    if let Some(caps) = movie_re().captures(name) {
        let title = clean_title(&caps[1]);
        if !title.is_empty() {
            return (title, caps[2].parse().ok());
        }
    }
    (clean_title(name), None)
}

fn clean_title(raw: &str) -> String {
    raw.replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a directory under a show is a season directory.
pub fn is_season_dir(name: &str) -> bool {
    name.to_lowercase().starts_with("season")
}

/// First run of digits in a season directory name.
///
/// ```
/// use codex::scanner::parse::season_number;
///
/// assert_eq!(season_number("Season 02"), Some(2));
/// assert_eq!(season_number("Season Specials"), None);
/// ```
pub fn season_number(name: &str) -> Option<u32> {
    digits_re().find(name).and_then(|m| m.as_str().parse().ok())
}

/// Episode number from an `SxxEyy` marker and the display name after ` - `.
pub fn parse_episode(stem: &str) -> (Option<u32>, String) {
    let number = episode_re()
        .captures(stem)
        .and_then(|caps| caps[2].parse().ok());

    let name = stem
        .split_once(" - ")
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !rest.is_empty())
        .unwrap_or(stem)
        .to_string();

    (number, name)
}
