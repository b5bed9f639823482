use crate::scoring::types::{ArticleText, CompanyContext};

pub const SYSTEM_PROMPT: &str = "You assess whether news articles describe material SEC-style corporate actions, \
including agreements, financings, governance changes, listings/delistings, restructurings, and other significant \
events. Respond with JSON containing integer field 'score' (1-5) and string field 'reason'.";

const RUBRIC: &str = "Rate how strongly it signals a material corporate trigger that is likely or imminent using \
this 1-5 scoring guide: 1 = no indication; 2 = weak hint/background; 3 = possible or emerging trigger; \
4 = high confidence of a trigger; 5 = clear, confirmed trigger.";

const CATEGORIES: &str = "Category definitions: 1.01 = Entry into a material definitive agreement (M&A, joint \
venture, major contract); 1.02 = Termination of a material definitive agreement; 1.03 = Bankruptcy or \
receivership; 2.01 = Completion of acquisition or disposition of assets; 2.03 = Creation of or increase in a \
direct financial obligation; 2.04 = Triggering events accelerating or increasing a financial obligation; \
3.01 = Notice of delisting or failure to satisfy a continued listing rule; 3.02 = Unregistered sales of equity \
securities; 3.03 = Material modification to rights of security holders; 4.02 = Non-reliance on previously \
issued financial statements; 5.01 = Changes in control of registrant; 5.03 = Amendments to articles/bylaws or \
change in fiscal year; 8.01 = Other material events (recalls, investigations, regulatory actions, etc.).";

const GUIDELINES: &str = "Guidelines:\n\
- Treat the task as predictive: if any material event appears plausible or imminent based on the article, set \
the score to 3 or higher even if not yet confirmed.\n\
- Reserve score 4-5 for high-confidence or announced events; use score 2 for vague background mentions.\n\
- In the reason, mention key evidence supporting your assessment and specify which category types \
(e.g., 1.01, 2.01) are most relevant.";

fn clean_field<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => fallback,
    }
}

pub fn build_user_prompt(article: &ArticleText, context: &CompanyContext) -> String {
    let title = clean_field(article.title.as_deref(), "(No headline provided)");
    let snippet = clean_field(article.snippet.as_deref(), "(No snippet provided)");

    let mut p = String::new();
    p.push_str("Evaluate the following article headline and body snippet. ");
    p.push_str(RUBRIC);
    p.push_str("\n\nConsider all categories comprehensively when determining if any material corporate action appears likely or imminent. ");
    p.push_str(CATEGORIES);
    p.push_str("\n\n");
    p.push_str(GUIDELINES);
    p.push_str("\n\nReturn only 'score' as an integer (1-5) and 'reason' as a string explaining your assessment.\n\n");

    let names = context.names();
    if !names.is_empty() {
        p.push_str(&format!("Companies linked to this article: {}\n", names.join("; ")));
    }
    p.push_str(&format!("Headline: {title}\n"));
    p.push_str(&format!("Snippet: {snippet}"));
    p
}
