//! Prompt templates for the reasoning service.

/// Ask for search terms likely to appear in traffic answering `query`.
pub fn keyword_prompt(query: &str) -> String {
    format!(
        r#"A user wants to find the answer to this question inside captured browser network traffic: "{query}"

List the keywords, phrases and patterns worth searching for in that traffic. Cover:

1. Words taken directly from the question
2. Related technical terms
3. Common API parameter names
4. Likely JSON field names
5. URL path segments
6. Header names

For example, for "my YouTube username" good terms would be: username, user_name, userName, handle, userHandle, displayName, channel, channelName, profile, account.

Answer with a JSON array of search terms and nothing else:
["term1", "term2", "term3"]

Aim for 10 to 20 terms."#
    )
}

/// Ask for the most specific page likely to hold the answer to `query`.
pub fn url_suggestion_prompt(query: &str) -> String {
    format!(
        r#"For the question "{query}", name the most specific web page where the answer is likely shown, such as an account, subscription or membership page. Reply with the URL only (for example "youtube.com/paid_memberships", "spotify.com/account" or "netflix.com/youraccount").

Guidelines:
- Subscription tiers, plans and account details: the platform's page for managing them.
- Usernames and profiles: the profile or account settings page.
- Login or QR codes: the main login page.
- Anything else: the page on the platform most relevant to the question.
- Prefer a URL with a path over a bare domain when a more specific page exists.
- Leave out "https://" and any trailing slash."#
    )
}

/// Final analysis request over the filtered traffic.
pub fn analysis_prompt(
    query: &str,
    keywords: &[String],
    serialized: &str,
    focused: usize,
    total: usize,
) -> String {
    format!(
        r#"You are reading network requests captured while a page loaded. They were filtered down to requests containing terms related to this question: "{query}"

Search terms used: {terms}

Filtered network data ({focused} relevant requests out of {total} total):
{serialized}

Question: {query}

Please provide:
1. A direct answer to the question, if the data allows one
2. Which request(s) hold the relevant information (cite their requestIndex)
3. The exact data found (URLs, values and so on)
4. Key findings from the matches

Stay focused on the most relevant information and say precisely where you found it."#,
        terms = keywords.join(", ")
    )
}

/// Answer returned when no request matched any term.
pub fn no_matches_message(query: &str, keywords: &[String]) -> String {
    format!(
        "No relevant network requests found for query: \"{query}\"\n\n\
         Tried searching for keywords: {}\n\n\
         Suggestions:\n\
         - Try a different search query\n\
         - Check if the website actually makes requests related to your query\n\
         - Look at the raw network data to see what information is available",
        keywords.join(", ")
    )
}
