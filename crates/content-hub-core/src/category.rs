//! Content categories
//!
//! Every remote listing and every local download folder is partitioned by one
//! of five categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Agents,
    Instructions,
    Plugins,
    Prompts,
    Skills,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Agents,
        Category::Instructions,
        Category::Plugins,
        Category::Prompts,
        Category::Skills,
    ];

    /// Folder name, both the default remote path and the local folder.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::Instructions => "instructions",
            Self::Plugins => "plugins",
            Self::Prompts => "prompts",
            Self::Skills => "skills",
        }
    }

    /// Whether entries are whole directories rather than single files
    pub fn is_bundle(&self) -> bool {
        matches!(self, Self::Plugins | Self::Skills)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Category {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name() == lower || c.dir_name().trim_end_matches('s') == lower)
            .ok_or_else(|| HubError::UnknownCategory {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plural_and_singular() {
        assert_eq!("agents".parse::<Category>().unwrap(), Category::Agents);
        assert_eq!("Skill".parse::<Category>().unwrap(), Category::Skills);
        assert_eq!("prompt".parse::<Category>().unwrap(), Category::Prompts);
        assert!("themes".parse::<Category>().is_err());
    }

    #[test]
    fn bundle_categories() {
        assert!(Category::Plugins.is_bundle());
        assert!(Category::Skills.is_bundle());
        assert!(!Category::Agents.is_bundle());
    }
}
