use chrono::{DateTime, Utc};

use discursis_core::models::Project;

/// Default maximum length for utterance excerpts
pub const DEFAULT_TRUNCATE_CHARS: usize = 150;

/// Truncate a string to a maximum length in characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// One line of the project listing
pub fn format_project_row(project: &Project) -> String {
    format!(
        "{:>5}  {:<8}  {:<10}  {}",
        project.id,
        project.status.to_string(),
        project.language_display(),
        truncate_string(&project.name, 60)
    )
}

/// Describe a token expiry relative to `now`
pub fn format_expiry(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match expiry {
        None => "unknown (token payload not readable)".to_string(),
        Some(exp) if exp <= now => format!("expired at {}", exp.format("%Y-%m-%d %H:%M UTC")),
        Some(exp) => {
            let minutes = (exp - now).num_minutes();
            if minutes < 60 {
                format!("expires in {}m", minutes)
            } else {
                format!("expires in {}h {}m", minutes / 60, minutes % 60)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use discursis_core::models::ProjectStatus;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("café au lait", 7), "café...");
    }

    #[test]
    fn test_format_project_row() {
        let project = Project {
            id: 12,
            name: "Town hall".to_string(),
            language: None,
            status: ProjectStatus::Pending,
        };
        assert_eq!(format_project_row(&project), "   12  Pending   -           Town hall");
    }

    #[test]
    fn test_format_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_expiry(Some(now + Duration::minutes(45)), now), "expires in 45m");
        assert_eq!(format_expiry(Some(now + Duration::minutes(300)), now), "expires in 5h 0m");
        assert_eq!(format_expiry(Some(now), now), "expired at 2024-05-01 12:00 UTC");
        assert!(format_expiry(None, now).starts_with("unknown"));
    }
}
