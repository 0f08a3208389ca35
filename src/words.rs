use anyhow::Result;

use crate::datetime_utils::{format_date_only, parse_twitter_timestamp};
use crate::twitter::Tweet;

/// English stopwords excluded from frequency analysis
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now",
];

// Adapted from http://www.textfixer.com/resources/english-contractions-list.txt
const CONTRACTIONS: &[&str] = &[
    "ain't", "aren't", "can't", "could've", "couldn't", "didn't", "doesn't", "don't", "hasn't",
    "he'd", "he'll", "he's", "here's", "how'd", "how'll", "how's", "i'd", "i'll", "i'm", "i've",
    "isn't", "it's", "might've", "mightn't", "must've", "mustn't", "shan't", "she'd", "she'll",
    "she's", "should've", "shouldn't", "that'll", "that's", "there's", "they'd", "they'll",
    "they're", "they've", "wasn't", "we'd", "we'll", "we're", "weren't", "what'd", "what's",
    "when", "when'd", "when'll", "when's", "where'd", "where'll", "where's", "who'd", "who'll",
    "who's", "why'd", "why'll", "why's", "won't", "would've", "wouldn't", "y'all", "you'd",
    "you'll", "you're", "you've",
];

/// Twitter-specific noise: retweet markers, separators, glyphs
const TWITTER_STOPWORDS: &[&str] = &[
    "rt", "ff", "&", "+", "w", "re", "cc", "et", "al", "\u{2026}", "u", "via", "a.m.", "p.m.",
    "@", "-", "\u{2013}", "\u{2014}", "|", "\u{0166}",
];

/// Words that end in a dot on purpose and must never be trimmed
const TRAILING_EXCEPTIONS: &[&str] = &["a.m.", "p.m.", "u.s."];

const LEADING_PUNCTUATION: &[char] = &['"', '\'', '\\', '/', '\u{201C}'];
const LEADING_BRACKETS: &[char] = &['(', '[', '{', '<', '\u{00AB}'];
const TRAILING_PUNCTUATION: &[char] = &[
    '?', '!', '.', ',', ':', ';', '-', '"', '\'', '/', '\\', '\u{201D}',
];
const TRAILING_BRACKETS: &[char] = &[')', ']', '}', '>', '\u{00BB}'];

/// Reduces a word to its canonical, comparison-ready form: lowercase,
/// HTML entities decoded, and sentence punctuation trimmed from both ends.
pub fn normalize_word(word: &str) -> String {
    let word = word.to_lowercase();

    // Replace single right quotation mark with apostrophe
    let word = word.replace('\u{2019}', "'");

    let mut word = html_escape::decode_html_entities(&word).into_owned();

    // Short words are probably emoticons, leave their brackets alone
    let strip_brackets = word.chars().count() > 3;

    let is_leading = |c: char| {
        LEADING_PUNCTUATION.contains(&c) || (strip_brackets && LEADING_BRACKETS.contains(&c))
    };
    let is_trailing = |c: char| {
        TRAILING_PUNCTUATION.contains(&c) || (strip_brackets && TRAILING_BRACKETS.contains(&c))
    };

    while let Some(c) = word.chars().next() {
        if !is_leading(c) {
            break;
        }
        word.remove(0);
    }

    if !TRAILING_EXCEPTIONS.contains(&word.as_str()) {
        while let Some(c) = word.chars().next_back() {
            if !is_trailing(c) {
                break;
            }
            word.pop();
        }
    }

    word
}

fn is_number(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit())
}

/// Whether a normalized word carries signal: not a number and not on any
/// of the stopword lists
pub fn useful_word(word: &str) -> bool {
    !is_number(word)
        && !STOPWORDS.contains(&word)
        && !CONTRACTIONS.contains(&word)
        && !TWITTER_STOPWORDS.contains(&word)
}

/// All whitespace-separated words from a timeline, duplicates retained,
/// in tweet order then word order. Words that normalize to the empty
/// string are dropped regardless of `useful_only`.
pub fn words_from_timeline(timeline: &[Tweet], normalize: bool, useful_only: bool) -> Vec<String> {
    let mut words: Vec<String> = timeline
        .iter()
        .flat_map(|tweet| tweet.text.split_whitespace().map(str::to_string))
        .collect();

    if normalize {
        for word in &mut words {
            *word = normalize_word(word);
        }
    }

    words.retain(|word| !word.is_empty());

    if useful_only {
        words.retain(|word| useful_word(word));
    }

    words
}

/// `YYYY-MM-DD` date strings for every tweet in the timeline, in timeline
/// order
pub fn tweet_dates(timeline: &[Tweet]) -> Result<Vec<String>> {
    timeline
        .iter()
        .map(|tweet| {
            let parsed = parse_twitter_timestamp(&tweet.created_at)?;
            Ok(format_date_only(&parsed))
        })
        .collect()
}
