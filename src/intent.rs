//! Intent classification and routing.
//!
//! Every utterance that survives the reflex layer goes through the router.
//! Classification is a fast local call made before anything remote; the
//! resulting intent is a tagged variant, never a sentinel marker embedded in
//! reply text. If the local backend is unreachable, the utterance degrades to
//! a cloud conversation rather than an error.

use std::sync::Arc;

use crate::context::{ConversationContext, Speaker};
use crate::error::LlmError;
use crate::llm::{ChatMessage, LlmProvider};
use crate::memory::KnowledgeStore;

/// What kind of background job an ACTION intent dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Coder,
    Researcher,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coder => write!(f, "coder"),
            Self::Researcher => write!(f, "researcher"),
        }
    }
}

/// Routed meaning of an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A direct reply, already computed against the full context.
    Conversation(String),
    /// Dispatch a background job.
    Action { kind: ActionKind, payload: String },
    /// Graceful termination request.
    Shutdown,
    /// Cancel the currently running job.
    Abort,
}

const CLASSIFY_PROMPT: &str = "\
You are the intent classifier of a voice assistant. Classify the user's \
spoken request into exactly one label:
- CODE: fix, edit, create, refactor, or debug code or files.
- RESEARCH: look something up, summarize, investigate a topic in depth.
- ABORT: cancel or stop the current task.
- SHUTDOWN: turn the assistant off, end the session.
- CHAT: anything else (questions, conversation, status).
Reply with ONLY the label.";

const CHAT_SYSTEM_PROMPT: &str = "\
You are a concise, helpful voice assistant. Your replies are spoken aloud, \
so keep them short and natural. Use the provided project context and \
conversation history when relevant.";

/// How many knowledge snippets enrich a conversation turn.
const SNIPPET_LIMIT: usize = 3;

/// Routes utterances to intents.
///
/// Holds the fast local backend for classification and default chat, and the
/// cloud backend used when the local one cannot answer.
pub struct IntentRouter {
    local: Arc<dyn LlmProvider>,
    cloud: Arc<dyn LlmProvider>,
    knowledge: Arc<dyn KnowledgeStore>,
}

impl IntentRouter {
    pub fn new(
        local: Arc<dyn LlmProvider>,
        cloud: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            local,
            cloud,
            knowledge,
        }
    }

    /// Classify `text` and, for conversations, compute the reply.
    pub async fn route(
        &self,
        text: &str,
        context: &ConversationContext,
    ) -> Result<Intent, LlmError> {
        match self.classify(text).await {
            Some(Label::Code) => {
                return Ok(Intent::Action {
                    kind: ActionKind::Coder,
                    payload: text.to_string(),
                })
            }
            Some(Label::Research) => {
                return Ok(Intent::Action {
                    kind: ActionKind::Researcher,
                    payload: text.to_string(),
                })
            }
            Some(Label::Shutdown) => return Ok(Intent::Shutdown),
            Some(Label::Abort) => return Ok(Intent::Abort),
            Some(Label::Chat) | None => {}
        }

        let reply = self.converse(text, context).await?;
        Ok(Intent::Conversation(reply))
    }

    /// Fast local classification. `None` means the local backend failed and
    /// the caller should fall through to the conversation path.
    async fn classify(&self, text: &str) -> Option<Label> {
        let prompt = format!("{CLASSIFY_PROMPT}\n\nUser request: \"{text}\"");
        match self.local.generate(&prompt).await {
            Ok(raw) => Some(parse_label(&raw)),
            Err(err) => {
                tracing::warn!(error = %err, "Local classification failed, treating as chat");
                None
            }
        }
    }

    /// Compute a conversational reply with the full rolling context plus
    /// retrieved snippets. Local backend first; the cloud backend (with its
    /// credential rotation) covers local failures.
    async fn converse(
        &self,
        text: &str,
        context: &ConversationContext,
    ) -> Result<String, LlmError> {
        let messages = self.build_chat(text, context).await;

        match self.local.chat(&messages).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    backend = %self.local.name(),
                    "Local chat failed, handing off to cloud"
                );
                self.cloud.chat(&messages).await
            }
        }
    }

    async fn build_chat(&self, text: &str, context: &ConversationContext) -> Vec<ChatMessage> {
        let snippets = self.knowledge.query(text, SNIPPET_LIMIT).await;
        let mut system = CHAT_SYSTEM_PROMPT.to_string();
        if !snippets.is_empty() {
            system.push_str("\n\nProject context:\n");
            for snippet in &snippets {
                system.push_str(&format!(
                    "--- {} ---\n{}\n",
                    snippet.path.display(),
                    snippet.excerpt
                ));
            }
        }

        let mut messages = vec![ChatMessage::system(system)];
        for turn in context.turns() {
            messages.push(match turn.speaker {
                Speaker::User => ChatMessage::user(turn.text.clone()),
                Speaker::Assistant => ChatMessage::assistant(turn.text.clone()),
                Speaker::System => ChatMessage::system(turn.text.clone()),
            });
        }
        messages.push(ChatMessage::user(text));
        messages
    }
}

/// Classifier output labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Code,
    Research,
    Shutdown,
    Abort,
    Chat,
}

/// Parse the classifier's raw reply. Unknown output means CHAT: a confused
/// classifier must never trigger a job or a shutdown.
fn parse_label(raw: &str) -> Label {
    let normalized = raw.trim().to_uppercase();
    let head = normalized
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|s| !s.is_empty())
        .unwrap_or("");
    match head {
        "CODE" => Label::Code,
        "RESEARCH" => Label::Research,
        "SHUTDOWN" => Label::Shutdown,
        "ABORT" => Label::Abort,
        _ => Label::Chat,
    }
}
