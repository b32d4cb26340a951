//! Per-platform native-meeting-id validation and best-effort meeting-URL
//! construction, grounded in `shared_models/schemas.py`'s validators —
//! the regexes below are carried over exactly.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Error;
use crate::model::Platform;

fn google_meet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{3}-[a-z]{4}-[a-z]{3}$").unwrap())
}

fn zoom_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{9,11})(?:\?pwd=(.+))?$").unwrap())
}

/// Validate `native_meeting_id` for the given platform.
pub fn validate_native_id(platform: Platform, native_meeting_id: &str) -> crate::error::Result<()> {
    let ok = match platform {
        Platform::GoogleMeet => google_meet_re().is_match(native_meeting_id),
        Platform::Zoom => zoom_re().is_match(native_meeting_id),
        Platform::Teams => !native_meeting_id.trim().is_empty(),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid native_meeting_id {native_meeting_id:?} for platform {}",
            platform.as_str()
        )))
    }
}

/// All three platform prefixes, in the fixed order the original tried them.
const PREFIXES: [(&str, Platform); 3] = [
    ("google_meet_", Platform::GoogleMeet),
    ("zoom_", Platform::Zoom),
    ("teams_", Platform::Teams),
];

/// Strips a leading `"<platform>_"` prefix from a `session_uid` found in the
/// segment cache, if present. `spec.md` §4.6/§9 calls this out as a known
/// quirk of the original (`api/endpoints.py`'s `_get_full_transcript_segments`)
/// that must be reproduced, not redesigned: some producers prefix the
/// `session_uid` they emit with their platform name, and the assembler has
/// to undo that before it can match the id against `MeetingSession` rows.
pub fn strip_platform_prefix(session_uid: &str) -> &str {
    for (prefix, _) in PREFIXES {
        if let Some(stripped) = session_uid.strip_prefix(prefix) {
            return stripped;
        }
    }
    session_uid
}

/// Best-effort construction of a joinable meeting URL. Teams cannot be
/// constructed from the native id alone — the bot must resolve it
/// externally, so this returns `None` for Teams, matching `spec.md` §4.3.1.
pub fn construct_meeting_url(platform: Platform, native_meeting_id: &str) -> Option<String> {
    match platform {
        Platform::GoogleMeet => {
            if google_meet_re().is_match(native_meeting_id) {
                Some(format!("https://meet.google.com/{native_meeting_id}"))
            } else {
                None
            }
        }
        Platform::Zoom => {
            let caps = zoom_re().captures(native_meeting_id)?;
            let id = &caps[1];
            match caps.get(2) {
                Some(pwd) => Some(format!("https://zoom.us/j/{id}?pwd={}", pwd.as_str())),
                None => Some(format!("https://zoom.us/j/{id}")),
            }
        }
        Platform::Teams => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_meet_valid_id_constructs_url() {
        assert!(validate_native_id(Platform::GoogleMeet, "abc-defg-hij").is_ok());
        assert_eq!(
            construct_meeting_url(Platform::GoogleMeet, "abc-defg-hij"),
            Some("https://meet.google.com/abc-defg-hij".to_string())
        );
    }

    #[test]
    fn google_meet_invalid_id_rejected() {
        assert!(validate_native_id(Platform::GoogleMeet, "ABC-DEFG-HIJ").is_err());
        assert!(validate_native_id(Platform::GoogleMeet, "abcdefghij").is_err());
    }

    #[test]
    fn zoom_numeric_id_constructs_url() {
        assert!(validate_native_id(Platform::Zoom, "123456789").is_ok());
        assert_eq!(
            construct_meeting_url(Platform::Zoom, "123456789"),
            Some("https://zoom.us/j/123456789".to_string())
        );
    }

    #[test]
    fn zoom_id_with_password_constructs_url_with_pwd() {
        assert!(validate_native_id(Platform::Zoom, "123456789?pwd=abc123").is_ok());
        assert_eq!(
            construct_meeting_url(Platform::Zoom, "123456789?pwd=abc123"),
            Some("https://zoom.us/j/123456789?pwd=abc123".to_string())
        );
    }

    #[test]
    fn zoom_id_too_short_rejected() {
        assert!(validate_native_id(Platform::Zoom, "12345").is_err());
    }

    #[test]
    fn teams_never_constructs_url() {
        assert!(validate_native_id(Platform::Teams, "19:meeting_abc@thread.v2").is_ok());
        assert_eq!(
            construct_meeting_url(Platform::Teams, "19:meeting_abc@thread.v2"),
            None
        );
    }

    #[test]
    fn teams_empty_id_rejected() {
        assert!(validate_native_id(Platform::Teams, "  ").is_err());
    }

    #[test]
    fn strips_known_platform_prefix() {
        assert_eq!(strip_platform_prefix("google_meet_abc123"), "abc123");
        assert_eq!(strip_platform_prefix("zoom_abc123"), "abc123");
        assert_eq!(strip_platform_prefix("teams_abc123"), "abc123");
    }

    #[test]
    fn leaves_unprefixed_uid_unchanged() {
        assert_eq!(strip_platform_prefix("abc123"), "abc123");
    }
}
