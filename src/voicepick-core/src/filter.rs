//! Search over a character's dialogues.

use crate::model::Dialogue;

/// Keep the dialogues whose text contains `term`, ignoring case.
///
/// A blank term keeps everything. Relative order is preserved.
pub fn filter<'a, I>(dialogues: I, term: &str) -> Vec<&'a Dialogue>
where
    I: IntoIterator<Item = &'a Dialogue>,
{
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return dialogues.into_iter().collect();
    }

    dialogues
        .into_iter()
        .filter(|d| d.text.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioRef, Intonation};

    fn dialogues(texts: &[&str]) -> Vec<Dialogue> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Dialogue {
                id: i as u64 + 1,
                text: t.to_string(),
                audio_src: AudioRef::new("a.mp3"),
                intonation: Intonation::Normal,
            })
            .collect()
    }

    fn ids(found: &[&Dialogue]) -> Vec<u64> {
        found.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_blank_term_is_identity() {
        let all = dialogues(&["C'est pas bon.", "Ah, la fatigue...", "Café ?"]);
        assert_eq!(ids(&filter(&all, "")), vec![1, 2, 3]);
        assert_eq!(ids(&filter(&all, "   ")), vec![1, 2, 3]);
    }

    #[test]
    fn test_case_insensitive_substring_keeps_order() {
        let all = dialogues(&[
            "C'est pas bon.",
            "On n'est pas sortis de l'auberge.",
            "Franchement, c'est une masterclass.",
            "PAS maintenant",
        ]);
        let found = filter(&all, "pas");
        assert_eq!(ids(&found), vec![1, 2, 4]);
        assert!(found.iter().all(|d| d.text.to_lowercase().contains("pas")));
    }

    #[test]
    fn test_accented_uppercase_matches() {
        let all = dialogues(&["Étienne arrive", "etienne part"]);
        assert_eq!(ids(&filter(&all, "étienne")), vec![1]);
    }

    #[test]
    fn test_idempotent() {
        let all = dialogues(&["un café", "deux cafés", "thé"]);
        let once = filter(&all, "CAF");
        let twice = filter(once.iter().copied(), "CAF");
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn test_no_match() {
        let all = dialogues(&["un", "deux"]);
        assert!(filter(&all, "trois").is_empty());
    }
}
