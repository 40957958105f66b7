//! Retrieval-augmented answering.
//!
//! Three flows share one [`ChatProvider`]:
//!
//! - **plain**: the legal persona answers from model knowledge alone.
//! - **rag**: the question is embedded, the closest chunks are pulled from
//!   the graph, and the model is told to answer only from those fragments.
//! - **ticket**: the conversation is reformulated into a `Title:`/`Question:`
//!   draft a human lawyer can pick up.

mod prompts;
mod retriever;

pub use prompts::NO_CONTEXT_ANSWER;
pub use retriever::{RetrievedChunk, top_chunks};

use tracing::{debug, info};

use crate::embed::Embedder;
use crate::error::AppError;
use crate::graph::GraphStore;
use crate::llm::{ChatMessage, ChatProvider};

pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TicketDraft {
    pub title: String,
    pub question: String,
}

pub struct RagEngine<'a> {
    store: &'a GraphStore,
    embedder: &'a Embedder,
    chat: &'a ChatProvider,
    index_name: String,
    top_k: usize,
}

impl<'a> RagEngine<'a> {
    pub fn new(
        store: &'a GraphStore,
        embedder: &'a Embedder,
        chat: &'a ChatProvider,
        index_name: &str,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            index_name: index_name.to_string(),
            top_k,
        }
    }

    /// Answer without retrieval, streaming tokens through `on_token`.
    pub async fn plain_answer<F>(&self, question: &str, on_token: F) -> Result<String, AppError>
    where
        F: FnMut(&str),
    {
        let messages = [
            ChatMessage::system(prompts::PLAIN_SYSTEM),
            ChatMessage::user(question),
        ];
        self.chat.complete_streaming(&messages, on_token).await
    }

    /// Answer grounded in the document graph.
    pub async fn rag_answer<F>(
        &self,
        question: &str,
        mut on_token: F,
    ) -> Result<RagAnswer, AppError>
    where
        F: FnMut(&str),
    {
        let sources = top_chunks(
            self.store,
            self.embedder,
            &self.index_name,
            question,
            self.top_k,
        )
        .await?;

        if sources.is_empty() {
            info!("no chunks retrieved, answering with the fallback message");
            on_token(NO_CONTEXT_ANSWER);
            return Ok(RagAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources,
            });
        }

        let context = sources
            .iter()
            .map(RetrievedChunk::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(sources = sources.len(), context_chars = context.len(), "rag context built");

        let messages = [
            ChatMessage::system(prompts::rag_system(&context)),
            ChatMessage::user(question),
        ];
        let answer = self.chat.complete_streaming(&messages, on_token).await?;
        Ok(RagAnswer { answer, sources })
    }

    /// Reformulate the conversation into a ticket draft for a human lawyer.
    pub async fn ticket_draft(&self, conversation: &str) -> Result<TicketDraft, AppError> {
        let messages = [
            ChatMessage::system(prompts::TICKET_SYSTEM),
            ChatMessage::user(conversation),
        ];
        let raw = self.chat.complete(&messages).await?;
        parse_ticket_draft(&raw)
            .ok_or_else(|| AppError::Llm(format!("unparseable ticket draft: {raw:?}")))
    }
}

/// Pull `Title:` and `Question:` out of a model reply. Lines after
/// `Question:` are continuations of the question and keep their line breaks;
/// the model does not always keep it to one line.
pub fn parse_ticket_draft(text: &str) -> Option<TicketDraft> {
    let mut title = None;
    let mut question: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Title:") {
            title = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Question:") {
            question = Some(rest.trim().to_string());
        } else if !line.is_empty() {
            if let Some(q) = question.as_mut() {
                q.push('\n');
                q.push_str(line);
            }
        }
    }

    match (title, question) {
        (Some(title), Some(question)) if !title.is_empty() && !question.is_empty() => {
            Some(TicketDraft { title, question })
        }
        _ => None,
    }
}
