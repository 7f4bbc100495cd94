//! Prompt templates for the router, query transformer and response generator

use sdk::types::RetrievedDocument;

const CONVERSATION_START: &str = "=========== START OF CONVERSATION ===========";
const CONVERSATION_END: &str = "===========  END OF CONVERSATION  ===========";

fn with_transcript(instructions: &str, transcript: &str) -> String {
    format!(
        "{}\n\n{}\n{}\n{}\n",
        instructions.trim_end(),
        CONVERSATION_START,
        transcript,
        CONVERSATION_END
    )
}

/// Prompt asking for a plan of searches ending in one generate step
pub fn routing_prompt(transcript: &str, max_instructions: usize, max_searches: usize) -> String {
    let instructions = format!(
        r#"You are the planning stage of a document assistant. You have NO general knowledge: every fact in an answer must come from a document search shown in the conversation.

Plan the steps needed to answer the user's most recent message. There are two actions:
- "document_search": search the document store. The suggestion describes what to look for.
- "generate": write the final answer. The suggestion describes how to answer.

Choose document_search when:
- The conversation is just starting.
- The user's message introduces a topic not covered by previous searches.
- The user asks for new or updated information.
- Previous search results are not enough to answer.

Go straight to generate only when:
- Previous search results fully answer the user's message.
- The message is directly about topics already searched.

Rules:
- The plan has at most {max_instructions} steps.
- Never plan more than {max_searches} searches in a row.
- The last step is always "generate", and it is the only "generate".
- Do not repeat a search that already appears in the conversation.
- When in doubt, search.

Respond with a JSON object and nothing else:
{{"plan": [{{"action": "document_search", "suggestion": "..."}}, {{"action": "generate", "suggestion": "..."}}]}}"#,
    );

    with_transcript(&instructions, transcript)
}

/// Prompt asking for one compact search string
pub fn query_prompt(transcript: &str, suggestion: &str) -> String {
    let instructions = format!(
        r#"You are the query creation stage of a document assistant. Write one search query for a semantic similarity search over a document store.

Search goal: {suggestion}

Guidelines:
1. Target the information the conversation is still missing.
2. Use key concepts and semantically rich terms, not exact phrases.
3. Keep the query between 3 and 7 words.
4. Leave out stop words and overly specific details.
5. Include domain terminology when it helps.
6. Do not repeat a query that already appears in the conversation.

Respond with a JSON object with a single key "query" holding the search string, and nothing else."#,
    );

    with_transcript(&instructions, transcript)
}

/// Prompt for the final, streamed answer
pub fn response_prompt(
    transcript: &str,
    suggestion: Option<&str>,
    documents: &[RetrievedDocument],
) -> String {
    let mut instructions = String::from(
        r#"You are the response stage of a document assistant. Answer the user's most recent message using the search results and conversation below.

Guidelines:
1. Address the most recent question or request directly.
2. Combine information from several search results when needed.
3. Use only information from the search results. If they are not enough, say so.
4. Keep the answer concise, clear and friendly.
5. Stay consistent with earlier answers in the conversation.
"#,
    );

    if let Some(suggestion) = suggestion.filter(|s| !s.trim().is_empty()) {
        instructions.push_str(&format!("\nPlan for this answer: {}\n", suggestion));
    }

    if !documents.is_empty() {
        instructions.push_str("\nDocuments retrieved for this message:\n");
        for doc in documents {
            instructions.push_str(&format!("- {}\n", doc.id));
        }
    }

    with_transcript(&instructions, transcript)
}
