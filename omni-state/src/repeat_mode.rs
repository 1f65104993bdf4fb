use serde::{Deserialize, Serialize};

/// What happens when the current track ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Play through the queue once.
    #[default]
    Off,
    /// Repeat the current track.
    Track,
    /// Wrap around to the start of the queue.
    Queue,
}

impl RepeatMode {
    /// Returns the name used on the wire and in commands.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(RepeatMode::Off),
            "track" => Ok(RepeatMode::Track),
            "queue" => Ok(RepeatMode::Queue),
            other => Err(format!("unknown repeat mode: {other}")),
        }
    }
}
