// ABOUTME: Heuristic query classifier driven by an ordered keyword/pattern rule table.
// ABOUTME: Detects domains, workflow and multi-tool signals, then decides Simple vs Complex.

use lazy_static::lazy_static;
use regex::Regex;

use super::types::{Complexity, Domain, QueryClassification};

// =============================================================================
// Rule Table
// =============================================================================

/// What a rule contributes to a classification when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Domain(Domain),
    Workflow,
    MultiTool,
    HardComplex,
}

/// How a rule inspects the lower-cased query.
enum Matcher {
    Pattern(Regex),
    Check(fn(&str) -> bool),
}

/// One `(predicate, signal)` entry of the rule table.
pub struct Rule {
    pub signal: Signal,
    pub label: &'static str,
    matcher: Matcher,
}

impl Rule {
    fn pattern(signal: Signal, label: &'static str, pattern: &str) -> Self {
        Self {
            signal,
            label,
            matcher: Matcher::Pattern(Regex::new(pattern).expect("classifier pattern")),
        }
    }

    fn check(signal: Signal, label: &'static str, check: fn(&str) -> bool) -> Self {
        Self {
            signal,
            label,
            matcher: Matcher::Check(check),
        }
    }

    /// Test the rule against an already lower-cased query.
    pub fn matches(&self, lower: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(re) => re.is_match(lower),
            Matcher::Check(check) => check(lower),
        }
    }
}

const DOCUMENT_PATTERN: &str = r"\b(documents?|files?|reports?|find|summary|summari[sz]e|edit|pdfs?|spreadsheets?|notes?|memos?|contracts?|filings?|drafts?)\b";
const MEDIA_PATTERN: &str = r"\b(videos?|images?|photos?|pictures?|movies?|films?|music|songs?|podcasts?|audio|media|clips?|playlists?)\b";
const TASK_PATTERN: &str = r"\b(tasks?|todos?|to-dos?|reminders?|remind|assign(ed)?|deadlines?|checklists?|tickets?)\b";
const EVENT_PATTERN: &str = r"\b(events?|meetings?|calendar|schedule[ds]?|appointments?|conferences?|webinars?|invites?)\b";
const WEB_PATTERN: &str = r"\b(web|websites?|online|internet|google|browse|news|urls?|links?)\b";

/// Tokens that split a request into sequential clauses.
const SPLIT_PATTERN: &str = r",|\band then\b|\bafter that\b|\bnext\b|\bfinally\b";

lazy_static! {
    /// Evaluated top to bottom. Domain rules are listed in priority order so
    /// matched domains come out in that order.
    static ref RULES: Vec<Rule> = vec![
        Rule::pattern(Signal::Domain(Domain::Document), "document-keywords", DOCUMENT_PATTERN),
        Rule::pattern(Signal::Domain(Domain::Media), "media-keywords", MEDIA_PATTERN),
        Rule::pattern(Signal::Domain(Domain::Task), "task-keywords", TASK_PATTERN),
        Rule::pattern(Signal::Domain(Domain::Event), "event-keywords", EVENT_PATTERN),
        Rule::pattern(Signal::Domain(Domain::Web), "web-keywords", WEB_PATTERN),
        Rule::pattern(Signal::Workflow, "sequencing", r"\b(and then|after that|next|finally)\b"),
        Rule::check(Signal::Workflow, "enumeration", has_three_clauses),
        Rule::pattern(Signal::Workflow, "find-open", r"\b(find|search|locate|get)\b.*\b(open|read|view)\b"),
        Rule::pattern(Signal::Workflow, "open-analyze", r"\bopen\b.*\b(analy[sz]e|review|summari[sz]e)\b"),
        Rule::pattern(Signal::Workflow, "create-update", r"\bcreate\b.*\bupdate\b"),
        Rule::pattern(Signal::Workflow, "trailing-action", r",\s*and\s+(tell|show|send|share|explain|summari[sz]e|email)\b"),
        Rule::pattern(Signal::MultiTool, "comparison", r"\b(compare|comparing|comparison|contrast|correlate|cross[- ]reference)\b"),
        Rule::check(Signal::MultiTool, "repeated-and", has_repeated_and),
        Rule::pattern(Signal::HardComplex, "workflow-word", r"\b(workflow|pipeline)\b"),
        Rule::pattern(Signal::HardComplex, "versus", r"\b(versus|vs)\b"),
        Rule::pattern(Signal::HardComplex, "analyze-and-summarize", r"\banaly[sz]e and summari[sz]e\b"),
    ];

    static ref SPLIT_TOKENS: Regex = Regex::new(SPLIT_PATTERN).expect("split pattern");
    static ref AND_WORD: Regex = Regex::new(r"\band\b").expect("conjunction pattern");
}

/// The full rule table, in evaluation order.
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// Three or more non-empty comma-separated clauses.
fn has_three_clauses(lower: &str) -> bool {
    lower
        .split(',')
        .filter(|clause| !clause.trim().is_empty())
        .count()
        >= 3
}

/// Two or more occurrences of the conjunction "and".
fn has_repeated_and(lower: &str) -> bool {
    AND_WORD.find_iter(lower).count() >= 2
}

fn count_split_tokens(lower: &str) -> u32 {
    SPLIT_TOKENS.find_iter(lower).count() as u32
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a query. Total and deterministic: always returns a value with a
/// non-empty domain list.
///
/// Decision precedence:
/// 1. Workflow signal → Complex, steps = split tokens (min 2)
/// 2. Multi-tool signal → Complex, steps = max(2, |domains|)
/// 3. No domain → Simple, domains = [General]
/// 4. Single domain → Simple
///
/// A hard-complex pattern then escalates to Complex (never the reverse).
pub fn classify(query: &str) -> QueryClassification {
    let lower = query.to_lowercase();

    let mut domains: Vec<Domain> = Vec::new();
    let mut workflow_hits: Vec<&'static str> = Vec::new();
    let mut multi_tool_hits: Vec<&'static str> = Vec::new();
    let mut override_hits: Vec<&'static str> = Vec::new();

    for rule in rules() {
        if !rule.matches(&lower) {
            continue;
        }
        match rule.signal {
            Signal::Domain(domain) => {
                if !domains.contains(&domain) {
                    domains.push(domain);
                }
            }
            Signal::Workflow => workflow_hits.push(rule.label),
            Signal::MultiTool => multi_tool_hits.push(rule.label),
            Signal::HardComplex => override_hits.push(rule.label),
        }
    }

    if domains.len() > 1 {
        multi_tool_hits.push("multiple-domains");
    }

    let requires_workflow = !workflow_hits.is_empty();
    let requires_multiple_tools = !multi_tool_hits.is_empty();

    let (mut complexity, mut estimated_steps, mut reasoning) = if requires_workflow {
        (
            Complexity::Complex,
            count_split_tokens(&lower).max(2),
            format!("workflow: {}", workflow_hits.join(", ")),
        )
    } else if requires_multiple_tools {
        (
            Complexity::Complex,
            (domains.len() as u32).max(2),
            format!("multi-tool: {}", multi_tool_hits.join(", ")),
        )
    } else if domains.is_empty() {
        (
            Complexity::Simple,
            1,
            "general: no domain keywords matched".to_string(),
        )
    } else {
        (
            Complexity::Simple,
            1,
            format!("single-domain: {}", domains[0]),
        )
    };

    if domains.is_empty() {
        domains.push(Domain::General);
    }

    if !override_hits.is_empty() {
        if complexity == Complexity::Simple {
            reasoning = format!("hard-override: {}", override_hits.join(", "));
        } else {
            reasoning = format!("{}; hard-override: {}", reasoning, override_hits.join(", "));
        }
        complexity = Complexity::Complex;
        estimated_steps = estimated_steps.max(2);
    }

    log::debug!(
        "[Classifier] complexity={:?} domains={:?} steps={} ({})",
        complexity,
        domains,
        estimated_steps,
        reasoning
    );

    QueryClassification {
        complexity,
        domains,
        requires_multiple_tools,
        requires_workflow,
        estimated_steps,
        reasoning,
    }
}
