//! Keyword scan of captions and markdown rendering of the result.
//!
//! Object "detection" here is a word match against a fixed vocabulary, not
//! vision. A caption that never names a thing yields nothing for it.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::Analysis;

/// Nouns looked for in captions.
pub const COMMON_OBJECTS: &[&str] = &[
    "person", "people", "man", "woman", "child", "car", "tree", "building", "house", "sky",
    "cloud", "water", "grass", "flower", "animal", "dog", "cat", "bird", "table", "chair", "book",
    "phone", "computer", "food", "plate", "cup", "bottle", "bag", "road", "street", "window",
    "door", "light", "sign", "bike", "bicycle", "bus", "train", "boat", "airplane", "traffic",
    "fire", "stop",
];

/// Shown instead of the object list when nothing matched.
pub const NO_ELEMENTS_NOTE: &str = "**Note:** No elements detected from the known vocabulary.";

/// A compiled set of `\b<word>s?\b` patterns.
#[derive(Debug)]
pub struct ObjectVocabulary {
    patterns: Vec<(String, Regex)>,
}

impl ObjectVocabulary {
    /// Compile patterns for the given words.
    pub fn new<I, S>(words: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = words
            .into_iter()
            .map(|word| {
                let word = word.as_ref().to_lowercase();
                let re = Regex::new(&format!(r"\b{}s?\b", regex::escape(&word)))?;
                Ok((word, re))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { patterns })
    }

    /// The shared vocabulary of [`COMMON_OBJECTS`], compiled once.
    pub fn common() -> &'static ObjectVocabulary {
        static VOCABULARY: OnceLock<ObjectVocabulary> = OnceLock::new();
        VOCABULARY.get_or_init(|| {
            ObjectVocabulary::new(COMMON_OBJECTS.iter().copied()).expect("vocabulary regex is valid")
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Capitalized vocabulary words found in `caption`. Unordered.
    pub fn detect(&self, caption: &str) -> HashSet<String> {
        let haystack = caption.to_lowercase();
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(&haystack))
            .map(|(word, _)| capitalize(word))
            .collect()
    }
}

/// Build the elements block and summary for a caption.
pub fn format_analysis(caption: &str, vocabulary: &ObjectVocabulary) -> Analysis {
    let objects = vocabulary.detect(caption);

    let mut elements_markdown = format!("**AI Description:**\n{caption}\n\n");
    if objects.is_empty() {
        elements_markdown.push_str(NO_ELEMENTS_NOTE);
    } else {
        let bullets: Vec<String> = objects.iter().map(|obj| format!("• {obj}")).collect();
        elements_markdown.push_str("**Detected Objects:**\n");
        elements_markdown.push_str(&bullets.join("\n"));
    }

    Analysis {
        summary: caption.to_string(),
        elements_markdown,
        objects,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_common_vocabulary_size() {
        assert_eq!(ObjectVocabulary::common().len(), COMMON_OBJECTS.len());
    }

    #[test]
    fn test_singular_and_plural_detected_once() {
        let found = ObjectVocabulary::common().detect("A dog chasing two dogs near a tree");
        assert_eq!(found.iter().filter(|o| o.as_str() == "Dog").count(), 1);
        // Set equality, not sequence equality: ordering is unspecified.
        assert_eq!(found, set(&["Dog", "Tree"]));
    }

    #[test]
    fn test_word_boundaries() {
        // "cattle" must not count as "cat", "carpet" not as "car".
        let found = ObjectVocabulary::common().detect("cattle on a carpet");
        assert!(found.is_empty(), "unexpected: {found:?}");
    }

    #[test]
    fn test_case_insensitive() {
        let found = ObjectVocabulary::common().detect("BUSES and a Stop Sign");
        // "buses" is not "bus" + "s", so only stop and sign match.
        assert_eq!(found, set(&["Stop", "Sign"]));
    }

    #[test]
    fn test_overlapping_words() {
        let found = ObjectVocabulary::common().detect("a man riding a bicycle past traffic lights");
        assert_eq!(found, set(&["Man", "Bicycle", "Traffic", "Light"]));
    }

    #[test]
    fn test_no_objects_placeholder() {
        let analysis = format_analysis("an abstract swirl of colors", ObjectVocabulary::common());
        assert!(analysis.objects.is_empty());
        assert!(analysis.elements_markdown.ends_with(NO_ELEMENTS_NOTE));
        assert!(analysis.elements_markdown.contains("No elements detected"));
        assert_eq!(analysis.summary, "an abstract swirl of colors");
    }

    #[test]
    fn test_markdown_lists_each_object() {
        let analysis = format_analysis("two cats on a chair", ObjectVocabulary::common());
        assert!(analysis
            .elements_markdown
            .starts_with("**AI Description:**\ntwo cats on a chair\n\n**Detected Objects:**\n"));
        let bullets: HashSet<&str> = analysis
            .elements_markdown
            .lines()
            .filter_map(|l| l.strip_prefix("• "))
            .collect();
        assert_eq!(bullets, ["Cat", "Chair"].into_iter().collect());
    }

    #[test]
    fn test_custom_vocabulary_escapes_words() {
        let vocab = ObjectVocabulary::new(["c++", "Robot"]).unwrap();
        assert_eq!(vocab.detect("two robots"), set(&["Robot"]));
    }
}
