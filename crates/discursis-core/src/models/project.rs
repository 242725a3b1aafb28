use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing state reported by the server for a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    Pending,
    Running,
    Ready,
    Error,
    #[serde(other)]
    Unknown,
}

impl ProjectStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProjectStatus::Ready)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Pending => "Pending",
            ProjectStatus::Running => "Running",
            ProjectStatus::Ready => "Ready",
            ProjectStatus::Error => "Error",
            ProjectStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    pub status: ProjectStatus,
}

impl Project {
    pub fn language_display(&self) -> &str {
        self.language.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_project_list() {
        let json = r#"[
            {"id": 1, "language": "english", "name": "Debates", "status": "Ready"},
            {"id": 2, "language": null, "name": "Interviews", "status": "Running"},
            {"id": 3, "language": "french", "name": "Broken", "status": "Archived"}
        ]"#;
        let projects: Vec<Project> = serde_json::from_str(json).unwrap();

        assert_eq!(projects.len(), 3);
        assert_eq!(projects[0].name, "Debates");
        assert!(projects[0].status.is_ready());
        assert_eq!(projects[1].language_display(), "-");
        assert_eq!(projects[1].status, ProjectStatus::Running);
        assert_eq!(projects[2].status, ProjectStatus::Unknown);
    }
}
