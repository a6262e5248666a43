//! Profile record schema
//!
//! The structured document every portfolio chunk is generated from.
//! All sections are optional so partially filled records still load.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{FolioError, Result};

/// Accepts a string, number, or null and yields its text form
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// String or list of strings, as used by interest categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl TextOrList {
    pub fn joined(&self) -> String {
        match self {
            TextOrList::Text(s) => s.clone(),
            TextOrList::List(items) => items.join(", "),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub name: String,
    pub full_name: String,
    pub tagline: String,
    pub summary: String,
    pub location: String,
    #[serde(deserialize_with = "scalar_string")]
    pub years_of_experience: String,
    pub linkedin: String,
    pub github: String,
    pub portfolio_url: String,
    pub email: String,
}

impl Identity {
    /// Full name, falling back to the short name
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.name
        } else {
            &self.full_name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub architecture: String,
    pub challenges: String,
    pub scalability: String,
    pub future: String,
    pub demo_url: String,
    pub github_url: String,
    pub github_repo: String,
}

impl Project {
    /// Explicit slug, or the name lowercased with spaces as dashes
    pub fn effective_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            self.name.to_lowercase().replace(' ', "-")
        } else {
            self.slug.clone()
        }
    }

    /// `owner/name` of the backing repository, if one is known
    pub fn repo_identifier(&self) -> Option<String> {
        let explicit = self.github_repo.trim().trim_matches('/');
        if !explicit.is_empty() {
            return Some(explicit.to_string());
        }

        let url = self.github_url.trim();
        let rest = url
            .strip_prefix("https://github.com/")
            .or_else(|| url.strip_prefix("http://github.com/"))
            .or_else(|| url.strip_prefix("github.com/"))?;
        let mut parts = rest.trim_end_matches(".git").split('/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                Some(format!("{owner}/{repo}"))
            }
            _ => None,
        }
    }

    /// Matches either the explicit slug or the derived one
    pub fn matches_slug(&self, slug: &str) -> bool {
        let wanted = slug.to_lowercase();
        (!self.slug.is_empty() && self.slug.to_lowercase() == wanted)
            || self.name.to_lowercase().replace(' ', "-") == wanted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certification {
    pub name: String,
    pub issuer: String,
    #[serde(deserialize_with = "scalar_string")]
    pub year: String,
    pub credential_id: String,
    #[serde(deserialize_with = "scalar_string")]
    pub skills_gained: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "scalar_string")]
    pub year: String,
    pub organization: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub duration: String,
    pub description: String,
    pub tech: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    #[serde(deserialize_with = "scalar_string")]
    pub year: String,
    #[serde(deserialize_with = "scalar_string")]
    pub cgpa: String,
    pub relevant_courses: Vec<String>,
}

impl Education {
    pub fn is_empty(&self) -> bool {
        self.degree.is_empty() && self.institution.is_empty()
    }
}

/// The full profile record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Portfolio {
    pub identity: Identity,
    pub skills: BTreeMap<String, Vec<String>>,
    pub strengths: Vec<String>,
    pub projects: Vec<Project>,
    pub certifications: Vec<Certification>,
    pub achievements: Vec<Achievement>,
    pub experience: Vec<Experience>,
    pub education: Option<Education>,
    pub interests: BTreeMap<String, TextOrList>,
    pub personality_traits: Vec<String>,
}

impl Portfolio {
    /// Read a profile record from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                FolioError::NotFound(format!("profile record {}", path.display()))
            }
            _ => FolioError::Io(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn find_project(&self, slug: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.matches_slug(slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_record_parses() {
        let portfolio: Portfolio = serde_json::from_str(
            r#"{
                "identity": {"name": "Ava", "years_of_experience": 6},
                "projects": [{"name": "Folio Bot", "description": "chat"}],
                "education": {"degree": "BSc", "year": 2019, "cgpa": 8.7},
                "interests": {"career": ["ml", "infra"], "hobby": "climbing"}
            }"#,
        )
        .unwrap();

        assert_eq!(portfolio.identity.years_of_experience, "6");
        assert_eq!(portfolio.identity.display_name(), "Ava");
        assert_eq!(portfolio.education.as_ref().unwrap().year, "2019");
        assert_eq!(portfolio.interests["career"].joined(), "ml, infra");
        assert_eq!(portfolio.interests["hobby"].joined(), "climbing");
        assert!(portfolio.certifications.is_empty());
    }

    #[test]
    fn test_effective_slug() {
        let project = Project {
            name: "Folio Bot".to_string(),
            ..Default::default()
        };
        assert_eq!(project.effective_slug(), "folio-bot");
        assert!(project.matches_slug("FOLIO-BOT"));
    }

    #[test]
    fn test_repo_identifier_sources() {
        let explicit = Project {
            github_repo: "ava/folio".to_string(),
            github_url: "https://github.com/other/thing".to_string(),
            ..Default::default()
        };
        assert_eq!(explicit.repo_identifier().as_deref(), Some("ava/folio"));

        let from_url = Project {
            github_url: "https://github.com/ava/folio-bot.git".to_string(),
            ..Default::default()
        };
        assert_eq!(from_url.repo_identifier().as_deref(), Some("ava/folio-bot"));

        let none = Project {
            github_url: "https://gitlab.com/ava/x".to_string(),
            ..Default::default()
        };
        assert_eq!(none.repo_identifier(), None);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let err = Portfolio::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, FolioError::NotFound(_)));
    }
}
