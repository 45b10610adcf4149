//! Canned quick questions grouped by topic
//!
//! Topic sets come from configuration. The session's topic filter selects a
//! single set; without a filter every question of every set is shown.

use serde::{Deserialize, Serialize};

/// Named group of canned questions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSet {
    /// Topic name, matched case-insensitively
    pub name: String,
    /// Questions in display order
    #[serde(default)]
    pub questions: Vec<String>,
}

impl TopicSet {
    /// Create a topic set
    pub fn new<S: Into<String>>(name: impl Into<String>, questions: Vec<S>) -> Self {
        Self {
            name: name.into(),
            questions: questions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Topic sets used when the configuration does not define any
pub fn default_topic_sets() -> Vec<TopicSet> {
    vec![TopicSet::new(
        "business",
        vec![
            "What is my most popular product?",
            "Which product has the best customer reviews?",
            "Show me my recent sales summary",
            "What feedback have customers given?",
            "What are my top-selling services?",
            "How is my business performing?",
            "Which products need more inventory?",
            "What are customers saying about my branch?",
        ],
    )]
}

/// Look up a topic set by name, ignoring case
pub fn find_topic<'a>(sets: &'a [TopicSet], name: &str) -> Option<&'a TopicSet> {
    sets.iter().find(|set| set.name.eq_ignore_ascii_case(name))
}

/// Questions visible under the given topic filter
///
/// An unknown topic yields no questions.
///
/// # Examples
///
/// ```
/// use chatdesk::topics::{visible_questions, TopicSet};
///
/// let sets = vec![
///     TopicSet::new("sales", vec!["Top product?"]),
///     TopicSet::new("reviews", vec!["Best rated?", "Worst rated?"]),
/// ];
/// assert_eq!(visible_questions(&sets, None).len(), 3);
/// assert_eq!(visible_questions(&sets, Some("Reviews")), vec!["Best rated?", "Worst rated?"]);
/// assert!(visible_questions(&sets, Some("other")).is_empty());
/// ```
pub fn visible_questions<'a>(sets: &'a [TopicSet], filter: Option<&str>) -> Vec<&'a str> {
    match filter {
        Some(name) => find_topic(sets, name)
            .map(|set| set.questions.iter().map(String::as_str).collect())
            .unwrap_or_default(),
        None => sets
            .iter()
            .flat_map(|set| set.questions.iter().map(String::as_str))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topic_sets_not_empty() {
        let sets = default_topic_sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].questions.len(), 8);
        assert_eq!(sets[0].questions[0], "What is my most popular product?");
    }

    #[test]
    fn test_find_topic_is_case_insensitive() {
        let sets = default_topic_sets();
        assert!(find_topic(&sets, "BUSINESS").is_some());
        assert!(find_topic(&sets, "weather").is_none());
    }

    #[test]
    fn test_visible_questions_keeps_order_across_sets() {
        let sets = vec![
            TopicSet::new("a", vec!["1", "2"]),
            TopicSet::new("b", vec!["3"]),
        ];
        assert_eq!(visible_questions(&sets, None), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_topic_set_deserializes_without_questions() {
        let set: TopicSet = serde_yaml::from_str("name: empty").unwrap();
        assert!(set.questions.is_empty());
    }
}
