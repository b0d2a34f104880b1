//! Story-quality gate for chapter text.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Minimum chapter length, in characters.
pub const MIN_STORY_CHARS: usize = 5000;

// Elision markers: parenthesised (ASCII or full-width) 省略 / 略写 / 待续,
// plus a few stock phrases.
static PLACEHOLDER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\(.*?省略.*?\)",
        r"（.*?省略.*?）",
        r"\(.*?略写.*?\)",
        r"（.*?略写.*?）",
        r"\(.*?待续.*?\)",
        r"（.*?待续.*?）",
        r"省略后续",
        r"后续细节",
        r"字细节",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// One reason a chapter fails the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryIssue {
    /// Text that stands in for prose that was never written.
    Placeholder(String),
    TooShort { chars: usize, minimum: usize },
}

impl fmt::Display for StoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder(text) => write!(
                f,
                "placeholder or elision found: '{text}'; write the scene out in full"
            ),
            Self::TooShort { chars, minimum } => write!(
                f,
                "chapter is {chars} characters, below the {minimum}-character minimum"
            ),
        }
    }
}

/// Outcome of [`check_story_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryCheck {
    pub chars: usize,
    pub issues: Vec<StoryIssue>,
}

impl StoryCheck {
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check chapter text for elision placeholders and minimum length.
pub fn check_story_content(content: &str) -> StoryCheck {
    let mut issues: Vec<StoryIssue> = PLACEHOLDER_RES
        .iter()
        .filter_map(|re| re.find(content))
        .map(|m| StoryIssue::Placeholder(m.as_str().to_owned()))
        .collect();

    let chars = content.chars().count();
    if chars < MIN_STORY_CHARS {
        issues.push(StoryIssue::TooShort {
            chars,
            minimum: MIN_STORY_CHARS,
        });
    }
    StoryCheck { chars, issues }
}
