use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::Error;

/// Stems the splitter front end lets a user pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stem {
    Vocals,
    Drums,
    Bass,
}

impl Stem {
    /// Name used on the wire and as the key of per-stem URL maps
    pub fn id(&self) -> &'static str {
        match self {
            Self::Vocals => "vocals",
            Self::Drums => "drums",
            Self::Bass => "bass",
        }
    }

    /// Name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vocals => "Vocals",
            Self::Drums => "Drums",
            Self::Bass => "Bass",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Vocals => "🎤",
            Self::Drums => "🥁",
            Self::Bass => "🎸",
        }
    }

    /// All selectable stems
    pub fn all() -> [Stem; 3] {
        [Self::Vocals, Self::Drums, Self::Bass]
    }
}

impl Default for Stem {
    fn default() -> Self {
        Self::Vocals
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Stem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|stem| stem.id() == wanted)
            .ok_or_else(|| Error::UnknownStem(s.to_string()))
    }
}
