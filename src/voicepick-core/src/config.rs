//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::PickerError;
use crate::model::{AudioRef, Character, Dialogue, Intonation};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub suggestion: SuggestionConfig,
    /// Seed catalog, loaded once at startup.
    #[serde(default)]
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Page transition timing.
#[derive(Debug, Clone, Deserialize)]
pub struct NavigationConfig {
    pub transition_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { transition_ms: 300 }
    }
}

impl NavigationConfig {
    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// How long a stop-all waits for the audio output to confirm a pause.
    pub stop_ack_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stop_ack_timeout_ms: 250,
        }
    }
}

impl PlaybackConfig {
    pub fn stop_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_ack_timeout_ms)
    }
}

/// Dialogue suggestion settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub prompt_template: String,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 60,
            prompt_template: DEFAULT_SUGGESTION_PROMPT.to_string(),
        }
    }
}

impl SuggestionConfig {
    /// Build the prompt for a character, with placeholders replaced.
    pub fn prompt(&self, name: &str, description: &str) -> String {
        self.prompt_template
            .replace("{name}", name)
            .replace("{description}", description)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PickerError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PickerError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    ///
    /// A file without `[[characters]]` keeps the built-in catalog.
    pub fn from_str(content: &str) -> Result<Self, PickerError> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| PickerError::ConfigError(format!("Failed to parse config: {}", e)))?;

        if config.characters.is_empty() {
            config.characters = default_characters();
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        admin: AdminConfig::default(),
        navigation: NavigationConfig::default(),
        playback: PlaybackConfig::default(),
        suggestion: SuggestionConfig::default(),
        characters: default_characters(),
    }
}

const PLACEHOLDER_AUDIO_URL: &str =
    "https://ssl.gstatic.com/dictionary/static/sounds/20200429/click_1--_3-1.mp3";

fn seed_character(
    id: &str,
    name: &str,
    description: &str,
    lines: &[(&str, Intonation)],
) -> Character {
    let mut character = Character::new(
        id,
        name,
        description,
        format!("https://picsum.photos/seed/{}/400/400", id),
    );
    for (i, (text, intonation)) in lines.iter().enumerate() {
        character = character.with_dialogue(Dialogue {
            id: i as u64 + 1,
            text: text.to_string(),
            audio_src: AudioRef::new(PLACEHOLDER_AUDIO_URL),
            intonation: *intonation,
        });
    }
    character
}

/// The built-in catalog.
pub fn default_characters() -> Vec<Character> {
    use Intonation::*;

    vec![
        seed_character(
            "etienne",
            "Étienne",
            "Connu pour son franc-parler et ses répliques cultes. Chaque phrase est une pépite.",
            &[
                ("C'est pas bon.", Normal),
                ("Ah, la fatigue...", Normal),
                ("On n'est pas sortis de l'auberge.", Normal),
                ("Franchement, c'est une masterclass.", Shouted),
                ("J'ai besoin d'un café, là.", Whispered),
            ],
        ),
        seed_character(
            "charles",
            "Charles",
            "Le boute-en-train du groupe. Ses phrases sont souvent pleines d'humour et de légèreté.",
            &[
                ("Alors ça, c'est exceptionnel !", Shouted),
                ("Qui veut une part de gâteau ?", Normal),
                ("C'est une blague ? J'espère.", Whispered),
                ("Laissez-moi deviner...", Calm),
                ("On va bien s'amuser.", Normal),
            ],
        ),
        seed_character(
            "leane",
            "Léane",
            "La voix de la raison. Ses dialogues sont posés, réfléchis, mais parfois teintés d'ironie.",
            &[
                ("Est-ce qu'on a vraiment réfléchi à ça ?", Calm),
                ("Je ne suis pas convaincue.", Normal),
                ("C'est une idée intéressante, explorons-la.", Normal),
                ("D'accord, mais avec des réserves.", Whispered),
                ("Je vous l'avais bien dit.", Normal),
            ],
        ),
    ]
}

const DEFAULT_SUGGESTION_PROMPT: &str = r#"Génère une ligne de dialogue courte et percutante (moins de 15 mots) pour le personnage "{name}".
Description du personnage : "{description}".
La phrase doit correspondre à sa personnalité. Ne retourne que la phrase, sans guillemets, sans mise en forme et sans préfixe comme "Phrase :"."#;
