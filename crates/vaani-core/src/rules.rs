//! Grammar rule engine: an ordered, immutable catalog of pattern rules for
//! spoken Indian English, evaluated first-match-wins.
//!
//! Rules are pure data compiled once at startup. Ordering encodes priority:
//! when two patterns overlap, the first-declared rule wins, so broad
//! high-frequency mistakes (subject-verb agreement, tense markers) sit ahead
//! of stylistic catches. Detection is synchronous and sub-millisecond; this is
//! the fast path the interruption latency budget relies on.

use once_cell::sync::Lazy;
use regex::Regex;

/// One grammar rule: a case-insensitive match pattern plus a rewrite applied
/// to the whole input (not just the matched span), so surrounding context is
/// preserved in the correction.
pub struct GrammarRule {
    pub id: &'static str,
    pub error_type: &'static str,
    /// Human explanation in English. Also the key into the native-language
    /// phrase dictionary, so keep wording stable.
    pub explanation: &'static str,
    pattern: Regex,
    rewrite: Option<(Regex, &'static str)>,
}

impl GrammarRule {
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Apply the rule's correction to the full original text. Rules without a
    /// safe mechanical rewrite (e.g. excessive fillers) return it unchanged.
    pub fn correct(&self, text: &str) -> String {
        match &self.rewrite {
            Some((re, with)) => re.replace_all(text, *with).into_owned(),
            None => text.to_string(),
        }
    }
}

/// Rule whose rewrite reuses the match pattern.
fn rule(
    id: &'static str,
    error_type: &'static str,
    explanation: &'static str,
    pattern: &str,
    with: &'static str,
) -> GrammarRule {
    let compiled = compile(id, pattern);
    GrammarRule {
        id,
        error_type,
        explanation,
        rewrite: Some((compiled.clone(), with)),
        pattern: compiled,
    }
}

/// Rule that matches on one pattern but rewrites a narrower sub-pattern
/// (e.g. match "yesterday … go", rewrite only "go").
fn rule_rewriting(
    id: &'static str,
    error_type: &'static str,
    explanation: &'static str,
    pattern: &str,
    rewrite_pattern: &str,
    with: &'static str,
) -> GrammarRule {
    GrammarRule {
        id,
        error_type,
        explanation,
        pattern: compile(id, pattern),
        rewrite: Some((compile(id, rewrite_pattern), with)),
    }
}

/// Rule that flags but has no mechanical correction.
fn advisory(
    id: &'static str,
    error_type: &'static str,
    explanation: &'static str,
    pattern: &str,
) -> GrammarRule {
    GrammarRule {
        id,
        error_type,
        explanation,
        pattern: compile(id, pattern),
        rewrite: None,
    }
}

fn compile(id: &str, pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("rule {id} has invalid pattern: {e}"))
}

static RULES: Lazy<Vec<GrammarRule>> = Lazy::new(|| {
    vec![
        // Subject-verb agreement
        rule(
            "I_HAS",
            "Subject-Verb Agreement",
            "Use 'have' with 'I', not 'has'",
            r"(?i)\bI has\b",
            "I have",
        ),
        rule(
            "HE_HAVE",
            "Subject-Verb Agreement",
            "Use 'has' with 'he/she/it', not 'have'",
            r"(?i)\b(he|she|it) have\b",
            "$1 has",
        ),
        rule(
            "THEY_IS",
            "Subject-Verb Agreement",
            "Use 'are' with 'they', not 'is'",
            r"(?i)\bthey is\b",
            "they are",
        ),
        rule(
            "WE_WAS",
            "Subject-Verb Agreement",
            "Use 'were' with 'we', not 'was'",
            r"(?i)\bwe was\b",
            "we were",
        ),
        // Tense errors
        rule_rewriting(
            "YESTERDAY_GO",
            "Tense Error",
            "Use past tense 'went' with 'yesterday'",
            r"(?i)\byesterday\b.*\bgo\b",
            r"(?i)\bgo\b",
            "went",
        ),
        rule_rewriting(
            "LAST_WEEK_DO",
            "Tense Error",
            "Use past tense 'did' with past time markers",
            r"(?i)\blast (week|month|year)\b.*\bdo\b",
            r"(?i)\bdo\b",
            "did",
        ),
        rule_rewriting(
            "TOMORROW_WENT",
            "Tense Error",
            "Use future tense with 'tomorrow'",
            r"(?i)\btomorrow\b.*\bwent\b",
            r"(?i)\bwent\b",
            "will go",
        ),
        // Indianisms
        rule(
            "DO_THE_NEEDFUL",
            "Indianism",
            "Replace with 'please take necessary action' or 'please do what is needed'",
            r"(?i)\bdo the needful\b",
            "please take necessary action",
        ),
        rule(
            "PREPONE",
            "Indianism",
            "Use 'reschedule earlier' or 'move forward' instead",
            r"(?i)\bprepone\b",
            "reschedule earlier",
        ),
        rule(
            "REVERT_BACK",
            "Redundancy",
            "'Revert' already means 'back', use just 'revert' or 'reply'",
            r"(?i)\brevert back\b",
            "reply",
        ),
        rule(
            "UPDATION",
            "Indianism",
            "Use 'update' instead of 'updation'",
            r"(?i)\bupdation\b",
            "update",
        ),
        // Articles
        rule(
            "MISSING_ARTICLE_A",
            "Missing Article",
            "Add article 'a' before singular countable nouns",
            r"(?i)\b(have|need|want|see) (book|car|house|pen)\b",
            "$1 a $2",
        ),
        rule(
            "THE_INDIA",
            "Unnecessary Article",
            "Don't use 'the' with country names (except USA, UK, etc.)",
            r"(?i)\bthe India\b",
            "India",
        ),
        // Prepositions
        rule(
            "DIFFERENT_THAN",
            "Wrong Preposition",
            "Use 'different from', not 'different than'",
            r"(?i)\bdifferent than\b",
            "different from",
        ),
        rule(
            "MARRIED_WITH",
            "Wrong Preposition",
            "Use 'married to', not 'married with'",
            r"(?i)\bmarried with\b",
            "married to",
        ),
        rule(
            "DISCUSS_ABOUT",
            "Unnecessary Preposition",
            "Use 'discuss', not 'discuss about'",
            r"(?i)\bdiscuss about\b",
            "discuss",
        ),
        // Double negatives
        rule(
            "DONT_HAVE_NOTHING",
            "Double Negative",
            "Use 'don't have anything' instead",
            r"(?i)\bdon't have nothing\b",
            "don't have anything",
        ),
        rule(
            "CANT_NEVER",
            "Double Negative",
            "Use 'can never' instead",
            r"(?i)\bcan't never\b",
            "can never",
        ),
        // Fillers
        rule(
            "UMM_FILLER",
            "Filler Word",
            "Avoid using filler words like 'umm', 'uhh'",
            r"(?i)\b(umm|ummm|uhh|uhhh)\b",
            "",
        ),
        advisory(
            "LIKE_FILLER",
            "Excessive Filler",
            "Reduce excessive use of 'like'",
            r"(?i)\blike\b.*\blike\b.*\blike\b",
        ),
        rule(
            "YOU_KNOW_FILLER",
            "Filler Phrase",
            "Avoid filler phrase 'you know'",
            r"(?i)\byou know\b",
            "",
        ),
        // Plural/singular
        rule(
            "THIS_THINGS",
            "Singular/Plural Mismatch",
            "Use 'these' with plural nouns, not 'this'",
            r"(?i)\bthis (things|people|books|cars)\b",
            "these $1",
        ),
        rule(
            "THESE_THING",
            "Singular/Plural Mismatch",
            "Use 'this' with singular nouns, not 'these'",
            r"(?i)\bthese (thing|person|book|car)\b",
            "this $1",
        ),
        // Word order
        rule(
            "ALWAYS_NOT",
            "Word Order",
            "Use 'not always' instead of 'always not'",
            r"(?i)\balways not\b",
            "not always",
        ),
        // Comparatives
        rule(
            "MORE_BETTER",
            "Double Comparative",
            "Use 'better', not 'more better'",
            r"(?i)\bmore better\b",
            "better",
        ),
        rule(
            "MORE_WORSE",
            "Double Comparative",
            "Use 'worse', not 'more worse'",
            r"(?i)\bmore worse\b",
            "worse",
        ),
        // Could/would/should of
        rule(
            "COULD_OF",
            "Common Mistake",
            "Use 'could have' or 'could've', not 'could of'",
            r"(?i)\bcould of\b",
            "could have",
        ),
        rule(
            "WOULD_OF",
            "Common Mistake",
            "Use 'would have' or 'would've', not 'would of'",
            r"(?i)\bwould of\b",
            "would have",
        ),
        rule(
            "SHOULD_OF",
            "Common Mistake",
            "Use 'should have' or 'should've', not 'should of'",
            r"(?i)\bshould of\b",
            "should have",
        ),
        // Less/fewer
        rule(
            "LESS_PEOPLE",
            "Less vs Fewer",
            "Use 'fewer' with countable nouns, not 'less'",
            r"(?i)\bless (people|students|items|things)\b",
            "fewer $1",
        ),
        // Homophones
        rule(
            "YOUR_ARE",
            "Your vs You're",
            "Use 'you're' (you are), not 'your'",
            r"(?i)\byour (going|coming|being)\b",
            "you're $1",
        ),
        rule(
            "THEIR_ARE",
            "Their vs There",
            "Use 'there are', not 'their are'",
            r"(?i)\btheir are\b",
            "there are",
        ),
        rule(
            "ITS_BEING",
            "Its vs It's",
            "Use 'it's' (it is), not 'its'",
            r"(?i)\bits (going|coming|being)\b",
            "it's $1",
        ),
        rule(
            "BETTER_THEN",
            "Then vs Than",
            "Use 'than' for comparisons, not 'then'",
            r"(?i)\bbetter then\b",
            "better than",
        ),
        rule(
            "EFFECT_VERB",
            "Affect vs Effect",
            "Use 'affect' as a verb, 'effect' as a noun",
            r"(?i)\bwill effect\b",
            "will affect",
        ),
        // More Indianisms
        rule(
            "OUT_OF_STATION",
            "Indianism",
            "Use 'out of town' instead of 'out of station'",
            r"(?i)\bout of station\b",
            "out of town",
        ),
        rule_rewriting(
            "PASS_OUT",
            "Indianism",
            "Use 'graduate' instead of 'pass out' for education",
            r"(?i)\bI (pass out|passed out) from college\b",
            r"(?i)\b(pass out|passed out) from\b",
            "graduated from",
        ),
        rule(
            "GOOD_NAME",
            "Indianism",
            "Just ask 'What is your name?', not 'What is your good name?'",
            r"(?i)\bgood name\b",
            "name",
        ),
        // More tense errors
        advisory(
            "SINCE_PRESENT",
            "Tense Error",
            "Use present perfect tense with 'since'",
            r"(?i)\bsince\b.*\b(go|come|work)\b",
        ),
        rule_rewriting(
            "FOR_PAST",
            "Tense Error",
            "Use present perfect with duration (for/since)",
            r"(?i)\bfor (two|three|four|five) (years|months|days)\b.*\bworked\b",
            r"(?i)\bworked\b",
            "have been working",
        ),
        // Question formation
        rule(
            "WHERE_YOU_ARE",
            "Question Formation",
            "Use 'where are you' in questions",
            r"(?i)\bwhere you are\b",
            "where are you",
        ),
        rule(
            "WHAT_YOU_WANT",
            "Question Formation",
            "Use 'what do you want' in questions",
            r"(?i)\bwhat you want\b",
            "what do you want",
        ),
        // Indefinite pronouns
        rule(
            "EVERYONE_ARE",
            "Subject-Verb Agreement",
            "'Everyone' is singular, use 'is' not 'are'",
            r"(?i)\beveryone are\b",
            "everyone is",
        ),
        rule(
            "SOMEBODY_ARE",
            "Subject-Verb Agreement",
            "Indefinite pronouns are singular, use 'is'",
            r"(?i)\b(somebody|someone|anybody|anyone) are\b",
            "$1 is",
        ),
        // Redundancies
        rule(
            "REPEAT_AGAIN",
            "Redundancy",
            "'Repeat' already means 'again', just use 'repeat'",
            r"(?i)\brepeat again\b",
            "repeat",
        ),
        rule(
            "RETURN_BACK",
            "Redundancy",
            "'Return' already means 'back', just use 'return'",
            r"(?i)\breturn back\b",
            "return",
        ),
        // Spelling / double modal
        rule(
            "ALOT",
            "Spelling Error",
            "Use 'a lot' (two words), not 'alot'",
            r"(?i)\balot\b",
            "a lot",
        ),
        rule(
            "CANT_ABLE_TO",
            "Double Modal",
            "Use either 'can't' or 'not able to', not both",
            r"(?i)\bcan't able to\b",
            "am not able to",
        ),
    ]
});

/// The full rule catalog in declaration (priority) order.
pub fn rules() -> &'static [GrammarRule] {
    &RULES
}

/// Check text against the catalog. First matching rule wins; returns the rule
/// and the corrected full text. Empty or whitespace-only input never matches.
pub fn detect_error(text: &str) -> Option<(&'static GrammarRule, String)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|rule| rule.matches(text))
        .map(|rule| (rule, rule.correct(text)))
}
