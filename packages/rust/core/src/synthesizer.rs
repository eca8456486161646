//! Answer synthesis: one persona-conditioned completion per question.
//!
//! [`Synthesizer::synthesize`] never returns an error. Completion failures
//! are encoded into the returned [`AnswerRecord`] (`error: true`, answer
//! text `"Error: <description>"`) so a bad question or a transient API
//! outage can never abort the batch. Enrichment failures degrade to an
//! empty snippet list.

use chrono::Utc;
use tracing::{instrument, warn};

use answerforge_llm::CompletionClient;
use answerforge_search::SearchClient;
use answerforge_shared::{
    AnswerRecord, PersonaDefinition, PersonaRegistry, QuestionRecord, SearchSnippet,
};

/// Snippets requested from the search collaborator per question.
pub const SNIPPETS_REQUESTED: usize = 5;

/// Snippets embedded into the prompt text (the full fetched list is still
/// retained on the answer record).
const SNIPPETS_IN_PROMPT: usize = 3;

/// Excerpt truncation length for prompt embedding, in characters.
const EXCERPT_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// Assembles prompts and calls the completion collaborator.
pub struct Synthesizer {
    completion: CompletionClient,
    search: Option<SearchClient>,
    registry: PersonaRegistry,
}

impl Synthesizer {
    /// Create a synthesizer. `search: None` disables enrichment entirely
    /// (e.g., when search credentials are not configured).
    pub fn new(
        completion: CompletionClient,
        search: Option<SearchClient>,
        registry: PersonaRegistry,
    ) -> Self {
        Self {
            completion,
            search,
            registry,
        }
    }

    /// Produce an answer record for one question. Infallible by contract:
    /// every failure mode is captured in the record itself.
    #[instrument(skip_all, fields(question_id = %question.id, persona = persona_key))]
    pub async fn synthesize(
        &self,
        question: &QuestionRecord,
        persona_key: &str,
        enrichment_enabled: bool,
    ) -> AnswerRecord {
        let persona = self.registry.resolve(persona_key);

        let snippets = if enrichment_enabled {
            self.fetch_snippets(&question.text).await
        } else {
            Vec::new()
        };

        let prompt = build_prompt(persona, &snippets, &question.text);

        let (answer, failed) = match self.completion.complete(&prompt).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(question_id = %question.id, error = %e, "completion failed");
                (format!("Error: {e}"), true)
            }
        };

        AnswerRecord {
            question: question.text.clone(),
            answer,
            character: persona.name.clone(),
            roleplay_character: persona.key.clone(),
            search_results: snippets,
            timestamp: Utc::now().timestamp(),
            model: self.completion.model().to_string(),
            question_id: question.id.clone(),
            error: failed,
        }
    }

    /// Best-effort snippet fetch: any search failure collapses to an empty
    /// list with a log line.
    async fn fetch_snippets(&self, query: &str) -> Vec<SearchSnippet> {
        let Some(search) = &self.search else {
            return Vec::new();
        };

        match search.search(query, SNIPPETS_REQUESTED).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(error = %e, "search failed, continuing without snippets");
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

/// Assemble the system prompt from persona, snippets, and question.
///
/// At most [`SNIPPETS_IN_PROMPT`] snippets are embedded, each excerpt
/// truncated to [`EXCERPT_CHARS`] characters.
fn build_prompt(persona: &PersonaDefinition, snippets: &[SearchSnippet], question: &str) -> String {
    let mut context = String::new();
    if !snippets.is_empty() {
        context.push_str("\n\nRelevant research findings:\n");
        for (i, snippet) in snippets.iter().take(SNIPPETS_IN_PROMPT).enumerate() {
            context.push_str(&format!("{}. {}\n", i + 1, snippet.title));
            context.push_str(&format!(
                "   {}...\n\n",
                truncate_chars(&snippet.excerpt, EXCERPT_CHARS)
            ));
        }
    }

    format!(
        "You are {name}. {instructions}\n\n\
         Your task is to answer the following question while maintaining your character's voice and expertise.\n\
         Use the provided research context to enhance your response with factual accuracy.\n\
         {context}\n\
         Question: {question}\n\n\
         Provide your response as {name}:",
        name = persona.name,
        instructions = persona.prompt,
        context = context,
        question = question,
    )
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
