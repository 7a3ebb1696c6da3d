//! Characters, dialogues and intonation tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery style of a dialogue. Display only, no ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intonation {
    Calm,
    #[default]
    Normal,
    Whispered,
    Shouted,
}

impl Intonation {
    pub const ALL: [Intonation; 4] = [
        Intonation::Calm,
        Intonation::Normal,
        Intonation::Whispered,
        Intonation::Shouted,
    ];

    /// Tag used in configuration and on the command line.
    pub fn tag(&self) -> &'static str {
        match self {
            Intonation::Calm => "calm",
            Intonation::Normal => "normal",
            Intonation::Whispered => "whispered",
            Intonation::Shouted => "shouted",
        }
    }

    /// Label shown on the dialogue badge.
    pub fn display_name(&self) -> &'static str {
        match self {
            Intonation::Calm => "calme",
            Intonation::Normal => "normal",
            Intonation::Whispered => "chuchoté",
            Intonation::Shouted => "crié",
        }
    }
}

impl fmt::Display for Intonation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Intonation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Intonation::ALL
            .into_iter()
            .find(|i| i.tag() == wanted || i.display_name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown intonation '{}', expected one of: {}",
                    s.trim(),
                    Intonation::ALL.map(|i| i.tag()).join(", ")
                )
            })
    }
}

/// Opaque reference to playable audio (a URL or a handle).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AudioRef(String);

impl AudioRef {
    pub fn new(src: impl Into<String>) -> Self {
        Self(src.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single voice line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dialogue {
    /// Unique within the owning character, increasing by creation order.
    pub id: u64,
    pub text: String,
    pub audio_src: AudioRef,
    pub intonation: Intonation,
}

/// A persona and its voice lines, most recent first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub description: String,
    pub avatar_url: String,
    #[serde(default)]
    pub dialogues: Vec<Dialogue>,
}

impl Character {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            avatar_url: avatar_url.into(),
            dialogues: Vec::new(),
        }
    }

    pub fn with_dialogue(mut self, dialogue: Dialogue) -> Self {
        self.dialogues.push(dialogue);
        self
    }

    /// Largest dialogue id currently held, 0 when empty.
    pub fn max_dialogue_id(&self) -> u64 {
        self.dialogues.iter().map(|d| d.id).max().unwrap_or(0)
    }
}
