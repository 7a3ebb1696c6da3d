//! In-memory catalog of characters and their dialogues.

use std::collections::{HashMap, HashSet};

use crate::error::PickerError;
use crate::model::{AudioRef, Character, Dialogue, Intonation};

/// Owns every character and hands out dialogue ids.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    characters: Vec<Character>,
    /// Next dialogue id per character id.
    next_ids: HashMap<String, u64>,
}

impl CatalogStore {
    /// Build the store from the startup seed. Character ids must be unique
    /// and every dialogue needs a unique id and some text.
    pub fn from_seed(characters: Vec<Character>) -> Result<Self, PickerError> {
        let mut seen = HashSet::new();
        for character in &characters {
            if !seen.insert(character.id.as_str()) {
                return Err(PickerError::ConfigError(format!(
                    "Duplicate character id '{}'",
                    character.id
                )));
            }
            let mut ids = HashSet::new();
            if let Some(dup) = character.dialogues.iter().find(|d| !ids.insert(d.id)) {
                return Err(PickerError::ConfigError(format!(
                    "Duplicate dialogue id {} for character '{}'",
                    dup.id, character.id
                )));
            }
            if let Some(blank) = character.dialogues.iter().find(|d| d.text.trim().is_empty()) {
                return Err(PickerError::ConfigError(format!(
                    "Empty text for dialogue {} of character '{}'",
                    blank.id, character.id
                )));
            }
        }

        let next_ids = characters
            .iter()
            .map(|c| (c.id.clone(), c.max_dialogue_id() + 1))
            .collect();

        Ok(Self {
            characters,
            next_ids,
        })
    }

    pub fn list_characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn find_character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_character(id).is_some()
    }

    pub fn dialogue_count(&self, id: &str) -> Option<usize> {
        self.find_character(id).map(|c| c.dialogues.len())
    }

    /// Prepend a new dialogue to a character and return it.
    ///
    /// Unknown characters leave the catalog untouched.
    pub fn append_dialogue(
        &mut self,
        character_id: &str,
        text: impl Into<String>,
        audio_ref: AudioRef,
        intonation: Intonation,
    ) -> Result<Dialogue, PickerError> {
        let Some(character) = self.characters.iter_mut().find(|c| c.id == character_id) else {
            tracing::warn!(character_id = %character_id, "Dialogue append rejected: unknown character");
            return Err(PickerError::Mutation(character_id.to_string()));
        };

        let next_id = self
            .next_ids
            .entry(character.id.clone())
            .or_insert_with(|| character.max_dialogue_id() + 1);
        let id = *next_id;
        *next_id += 1;

        let dialogue = Dialogue {
            id,
            text: text.into(),
            audio_src: audio_ref,
            intonation,
        };
        character.dialogues.insert(0, dialogue.clone());

        tracing::info!(
            character_id = %character_id,
            dialogue_id = id,
            count = character.dialogues.len(),
            "Dialogue added"
        );
        Ok(dialogue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_characters;
    use crate::filter::filter;

    fn seeded() -> CatalogStore {
        CatalogStore::from_seed(default_characters()).unwrap()
    }

    #[test]
    fn test_append_prepends_and_counts() {
        let mut catalog = seeded();
        let before_charles = catalog.find_character("charles").unwrap().clone();

        let added = catalog
            .append_dialogue(
                "etienne",
                "Nouvelle phrase",
                AudioRef::new("blob:1"),
                Intonation::Normal,
            )
            .unwrap();

        let etienne = catalog.find_character("etienne").unwrap();
        assert_eq!(etienne.dialogues.len(), 6);
        assert_eq!(etienne.dialogues[0], added);
        assert_eq!(etienne.dialogues[0].text, "Nouvelle phrase");
        assert_eq!(etienne.dialogues[0].intonation, Intonation::Normal);
        assert_eq!(catalog.find_character("charles").unwrap(), &before_charles);
        assert_eq!(catalog.dialogue_count("leane"), Some(5));

        let found = filter(&etienne.dialogues, "nouvelle");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, added.id);
    }

    #[test]
    fn test_append_unknown_character_leaves_catalog_unchanged() {
        let mut catalog = seeded();
        let before = catalog.list_characters().to_vec();

        let result =
            catalog.append_dialogue("nobody", "Bonjour", AudioRef::new("x"), Intonation::Calm);

        assert!(matches!(result, Err(PickerError::Mutation(id)) if id == "nobody"));
        assert_eq!(catalog.list_characters(), before.as_slice());
    }

    #[test]
    fn test_ids_strictly_increase_in_a_burst() {
        let mut catalog = seeded();
        let ids: Vec<u64> = (0..50)
            .map(|i| {
                catalog
                    .append_dialogue("leane", format!("ligne {i}"), AudioRef::new("x"), Intonation::Calm)
                    .unwrap()
                    .id
            })
            .collect();

        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(ids[0] > 5);
        let leane = catalog.find_character("leane").unwrap();
        let unique: HashSet<u64> = leane.dialogues.iter().map(|d| d.id).collect();
        assert_eq!(unique.len(), leane.dialogues.len());
    }

    #[test]
    fn test_from_seed_rejects_duplicate_character() {
        let mut seed = default_characters();
        seed.push(seed[0].clone());
        assert!(matches!(
            CatalogStore::from_seed(seed),
            Err(PickerError::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_seed_rejects_blank_dialogue_text() {
        let mut seed = default_characters();
        seed[1].dialogues[2].text = "   ".to_string();
        let result = CatalogStore::from_seed(seed);
        assert!(matches!(result, Err(PickerError::ConfigError(msg)) if msg.contains("charles")));
    }

    #[test]
    fn test_find_character_absent() {
        let catalog = seeded();
        assert!(catalog.find_character("ghost").is_none());
        assert_eq!(catalog.dialogue_count("ghost"), None);
        assert!(catalog.contains("etienne"));
    }
}
