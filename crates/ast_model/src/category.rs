//! Block categories derived from opcode prefixes

/// Palette category of a block, encoded as the opcode prefix before the
/// first underscore (`event_whenprogramstarts` → `Event`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCategory {
    Control,
    Custom,
    Event,
    Looks,
    Motion,
    Operators,
    Sensing,
    Sound,
    Variables,
    Unknown,
}

impl BlockCategory {
    /// Derive the category from an opcode.
    ///
    /// Opcodes without an underscore, and unknown prefixes, map to `Unknown`.
    pub fn from_opcode(opcode: &str) -> Self {
        let Some((prefix, _)) = opcode.split_once('_') else {
            return Self::Unknown;
        };
        match prefix {
            "control" => Self::Control,
            "custom" => Self::Custom,
            "event" => Self::Event,
            "looks" => Self::Looks,
            "motion" => Self::Motion,
            "operator" => Self::Operators,
            "sensing" => Self::Sensing,
            "sound" => Self::Sound,
            "data" => Self::Variables,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Custom => "custom",
            Self::Event => "event",
            Self::Looks => "looks",
            Self::Motion => "motion",
            Self::Operators => "operator",
            Self::Sensing => "sensing",
            Self::Sound => "sound",
            Self::Variables => "data",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
