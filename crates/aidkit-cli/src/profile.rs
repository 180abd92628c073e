use aidkit_core::FamilyMember;
use aidkit_core::prompt::family_context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const PROFILE_TEMPLATE: &str = r#"# Household profile read by `aidkit prep`.
# family_count defaults to the number of members listed below.
# notes = "we go camping often"

# [[members]]
# name = "Dana"
# sex = "female"        # male | female | unspecified
# age = 38
# conditions = ["Asthma"]
# notes = ""
"#;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile io error: {0}")]
    Io(#[from] io::Error),
    #[error("profile parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Household description kept on disk between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyProfile {
    pub family_count: Option<u32>,
    pub notes: String,
    pub members: Vec<FamilyMember>,
}

impl FamilyProfile {
    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ProfileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(toml::from_str(&content)?))
    }

    pub fn family_count(&self, fallback: u32) -> u32 {
        match self.family_count {
            Some(count) if count > 0 => count,
            _ if !self.members.is_empty() => self.members.len() as u32,
            _ => fallback.max(1),
        }
    }

    /// Context sent with a preparedness request; `extra` is appended to the notes.
    pub fn context(&self, family_count: u32, extra: &str) -> String {
        let notes = [self.notes.trim(), extra.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        family_context(family_count, &self.members, &notes)
    }
}

#[cfg(test)]
mod tests {
    use super::{FamilyProfile, PROFILE_TEMPLATE};
    use aidkit_core::Sex;
    use std::fs;

    #[test]
    fn missing_profile_is_none() {
        let temp = tempfile::tempdir().unwrap();
        assert!(FamilyProfile::load(&temp.path().join("profile.toml")).unwrap().is_none());
    }

    #[test]
    fn template_parses_as_empty_profile() {
        let profile: FamilyProfile = toml::from_str(PROFILE_TEMPLATE).unwrap();
        assert!(profile.members.is_empty());
        assert_eq!(profile.family_count(3), 3);
    }

    #[test]
    fn loads_members_and_builds_context() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("profile.toml");
        fs::write(
            &path,
            r#"notes = "rural area"

[[members]]
name = "Dana"
sex = "female"
age = 38
conditions = ["Asthma"]

[[members]]
name = "Kit"
age = 2
notes = "toddler"
"#,
        )
        .unwrap();

        let profile = FamilyProfile::load(&path).unwrap().unwrap();
        assert_eq!(profile.members.len(), 2);
        assert_eq!(profile.members[1].sex, Sex::Unspecified);
        assert_eq!(profile.family_count(1), 2);

        let context = profile.context(2, "pool in backyard");
        assert!(context.starts_with("Family size: 2 | User: Dana, Female, 38 years, Conditions: Asthma"));
        assert!(context.contains("Family 1: Kit, Unspecified, 2 years, Conditions: None, Notes: toddler"));
        assert!(context.ends_with(" | rural area pool in backyard"));
    }

    #[test]
    fn explicit_family_count_wins() {
        let profile = FamilyProfile {
            family_count: Some(5),
            ..FamilyProfile::default()
        };
        assert_eq!(profile.family_count(1), 5);
    }
}
