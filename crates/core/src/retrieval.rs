use crate::error::QueryError;
use crate::models::{Citation, HistoryEntry, QueryOutcome, QueryStatus, RagOptions, ScoredChunk};
use crate::retry;
use crate::traits::{FieldFilter, MetadataStore, VectorStore};
use crate::{ChatModel, EmbeddingClient};
use chrono::Utc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Fixed instruction for the chat model: stay inside the retrieved context.
pub const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant specialized in answering questions based on provided context.

IMPORTANT RULES:
1. Answer ONLY based on the provided context
2. If the answer is not in the context, say \"I don't have enough information to answer this question\"
3. Be concise but comprehensive
4. Cite sources when possible by mentioning the document name
5. If the context contains conflicting information, mention both perspectives
6. Do not make up information or hallucinate facts

Always maintain a professional and helpful tone.";

/// Answer returned when retrieval finds nothing above the threshold.
pub const NO_ANSWER: &str =
    "I don't have enough information to answer this question based on the available documents.";

/// Answer returned when the pipeline fails mid-flight.
pub const ERROR_ANSWER: &str =
    "I encountered an error while processing your question. Please try again.";

/// Score floor applied by `search_similar_documents`.
pub const MIN_SIMILARITY_SCORE: f64 = 0.5;

/// Payload field used for source-equality filtering.
pub const SOURCE_FIELD: &str = "source";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const CITATION_TEXT_CHARS: usize = 200;

fn rag_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context, please answer the user's question.\n\n\
         CONTEXT:\n{context}\n\n\
         USER QUESTION: {question}\n\n\
         Please provide a helpful and accurate answer based only on the context above. \
         If the context doesn't contain enough information to answer the question, say so clearly."
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

fn citation(hit: &ScoredChunk) -> Citation {
    Citation {
        source: hit.payload.source.clone(),
        url: hit.payload.url.clone(),
        text: truncate_chars(&hit.payload.text, CITATION_TEXT_CHARS),
        score: round_score(hit.score),
        chunk_index: hit.payload.chunk_index,
    }
}

/// Retrieval pipeline: embed the query, search, assemble a prompt, call the
/// chat model, and report citations.
pub struct Retriever<E, V, M, L>
where
    E: EmbeddingClient,
    V: VectorStore,
    M: MetadataStore,
    L: ChatModel,
{
    embedder: E,
    vectors: V,
    metadata: M,
    chat: L,
    options: RagOptions,
}

impl<E, V, M, L> Retriever<E, V, M, L>
where
    E: EmbeddingClient + Send + Sync,
    V: VectorStore + Send + Sync,
    M: MetadataStore + Send + Sync,
    L: ChatModel + Send + Sync,
{
    pub fn new(embedder: E, vectors: V, metadata: M, chat: L, options: RagOptions) -> Self {
        Self {
            embedder,
            vectors,
            metadata,
            chat,
            options,
        }
    }

    /// Full question-answering pipeline. Mid-pipeline failures are folded
    /// into an error-status outcome instead of propagating.
    pub async fn query(
        &self,
        user_query: &str,
        session_id: Option<&str>,
        top_k: Option<usize>,
        filter_source: Option<&str>,
    ) -> QueryOutcome {
        let started = Instant::now();

        let outcome = match self.try_query(user_query, top_k, filter_source).await {
            Ok(stage) => QueryOutcome {
                answer: stage.answer,
                sources: stage.sources,
                query: user_query.to_string(),
                documents_retrieved: stage.documents_retrieved,
                processing_time_ms: started.elapsed().as_millis() as u64,
                status: stage.status,
            },
            Err(query_error) => {
                error!(query = user_query, error = %query_error, "query pipeline failed");
                QueryOutcome {
                    answer: ERROR_ANSWER.to_string(),
                    sources: Vec::new(),
                    query: user_query.to_string(),
                    documents_retrieved: 0,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    status: QueryStatus::Error,
                }
            }
        };

        if outcome.status != QueryStatus::Error {
            if let Some(session) = session_id {
                self.record_history(session, &outcome).await;
            }
        }

        info!(
            status = ?outcome.status,
            retrieved = outcome.documents_retrieved,
            elapsed_ms = outcome.processing_time_ms,
            "query processed"
        );
        outcome
    }

    async fn try_query(
        &self,
        user_query: &str,
        top_k: Option<usize>,
        filter_source: Option<&str>,
    ) -> Result<QueryStage, QueryError> {
        if user_query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let hits = self
            .retrieve(
                user_query,
                top_k.unwrap_or(self.options.top_k),
                self.options.similarity_threshold,
                filter_source,
            )
            .await?;

        if hits.is_empty() {
            warn!(query = user_query, "no documents above similarity threshold");
            return Ok(QueryStage {
                answer: NO_ANSWER.to_string(),
                sources: Vec::new(),
                documents_retrieved: 0,
                status: QueryStatus::NoResults,
            });
        }

        let context = hits
            .iter()
            .map(|hit| format!("[Source: {}]\n{}", hit.payload.source, hit.payload.text))
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let answer = self
            .chat
            .complete(SYSTEM_PROMPT, &rag_prompt(&context, user_query))
            .await?;

        let sources = hits
            .iter()
            .take(self.options.max_sources)
            .map(citation)
            .collect();

        Ok(QueryStage {
            answer,
            sources,
            documents_retrieved: hits.len(),
            status: QueryStatus::Success,
        })
    }

    /// Retrieval without generation: ranked chunks for the query.
    pub async fn search_similar_documents(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, QueryError> {
        self.retrieve(query, top_k, MIN_SIMILARITY_SCORE, None).await
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f64,
        filter_source: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, QueryError> {
        let query_vector = retry::with_backoff(
            retry::DEFAULT_ATTEMPTS,
            retry::DEFAULT_DELAY,
            "embed_query",
            || self.embedder.embed_one(query),
        )
        .await?;

        let filter = filter_source.map(|source| FieldFilter::new(SOURCE_FIELD, source));
        let mut hits = retry::with_backoff(
            retry::DEFAULT_ATTEMPTS,
            retry::DEFAULT_DELAY,
            "vector_search",
            || {
                self.vectors
                    .search(&query_vector, top_k, score_threshold, filter.as_ref())
            },
        )
        .await?;

        // Scores surface in responses; keep them at 4 decimals everywhere.
        for hit in &mut hits {
            hit.score = round_score(hit.score);
        }
        Ok(hits)
    }

    pub async fn get_chat_history(&self, session_id: &str, limit: usize) -> Vec<HistoryEntry> {
        self.metadata.get_history(session_id, limit).await
    }

    async fn record_history(&self, session_id: &str, outcome: &QueryOutcome) {
        let entry = HistoryEntry {
            session_id: session_id.to_string(),
            query: outcome.query.clone(),
            answer: outcome.answer.clone(),
            sources: outcome.sources.clone(),
            status: outcome.status,
            processing_time_ms: outcome.processing_time_ms,
            timestamp: Utc::now(),
        };

        // Best-effort: a transcript miss must not break the response.
        if let Err(store_error) = self.metadata.append_history(&entry).await {
            warn!(session_id, error = %store_error, "history append failed");
        }
    }
}

struct QueryStage {
    answer: String,
    sources: Vec<Citation>,
    documents_retrieved: usize,
    status: QueryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::indexing::testing::{FakeEmbedder, FakeMetadataStore, FakeVectorStore};
    use crate::models::ChunkPayload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChat {
        fail: bool,
        last_user_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ChatModel for FakeChat {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
        ) -> Result<String, LlmError> {
            if self.fail {
                return Err(LlmError::MissingContent);
            }
            *self.last_user_prompt.lock().expect("lock") = Some(user_prompt.to_string());
            Ok("The relief valve opens at forty bar.".to_string())
        }
    }

    fn hit(source: &str, chunk_index: usize, text: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            payload: ChunkPayload {
                document_id: "doc-1".to_string(),
                source: source.to_string(),
                url: String::new(),
                chunk_index,
                text: text.to_string(),
                start_char: 0,
                end_char: text.chars().count(),
                metadata: json!({}),
                indexed_at: Utc::now(),
            },
            score,
        }
    }

    fn retriever(
        vectors: FakeVectorStore,
        metadata: FakeMetadataStore,
        chat: FakeChat,
    ) -> Retriever<FakeEmbedder, FakeVectorStore, FakeMetadataStore, FakeChat> {
        Retriever::new(
            FakeEmbedder::default(),
            vectors,
            metadata,
            chat,
            RagOptions::default(),
        )
    }

    #[tokio::test]
    async fn no_hits_returns_fallback_answer_and_records_history() {
        let pipeline = retriever(
            FakeVectorStore::default(),
            FakeMetadataStore::default(),
            FakeChat::default(),
        );

        let outcome = pipeline
            .query("what is the torque setting?", Some("session-1"), None, None)
            .await;

        assert_eq!(outcome.status, QueryStatus::NoResults);
        assert_eq!(outcome.answer, NO_ANSWER);
        assert!(outcome.sources.is_empty());
        assert_eq!(outcome.documents_retrieved, 0);

        let history = pipeline.metadata.history.lock().expect("lock");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].session_id, "session-1");
        assert_eq!(history[0].status, QueryStatus::NoResults);
    }

    #[tokio::test]
    async fn single_hit_produces_answer_with_citation() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![hit(
            "manual.pdf",
            3,
            "The relief valve opens at forty bar.",
            0.9,
        )];
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let outcome = pipeline.query("relief valve?", None, None, None).await;

        assert_eq!(outcome.status, QueryStatus::Success);
        assert_eq!(outcome.documents_retrieved, 1);
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].score, 0.9);
        assert_eq!(outcome.sources[0].chunk_index, 3);
        assert_eq!(outcome.sources[0].source, "manual.pdf");

        let prompt = pipeline
            .chat
            .last_user_prompt
            .lock()
            .expect("lock")
            .clone()
            .expect("prompt captured");
        assert!(prompt.contains("[Source: manual.pdf]"));
        assert!(prompt.contains("relief valve?"));
    }

    #[tokio::test]
    async fn citation_text_is_truncated_and_score_rounded() {
        let vectors = FakeVectorStore::default();
        let long_text = "x".repeat(500);
        *vectors.search_hits.lock().expect("lock") =
            vec![hit("long.txt", 0, &long_text, 0.876_543_21)];
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let outcome = pipeline.query("anything", None, None, None).await;

        assert_eq!(outcome.sources[0].text.chars().count(), 200);
        assert!(outcome.sources[0].text.ends_with("..."));
        assert_eq!(outcome.sources[0].score, 0.8765);
    }

    #[tokio::test]
    async fn citations_are_capped_even_when_more_chunks_match() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = (0..7)
            .map(|index| hit("many.txt", index, "chunk body", 0.9 - index as f64 * 0.01))
            .collect();
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let outcome = pipeline.query("anything", None, Some(7), None).await;

        assert_eq!(outcome.documents_retrieved, 7);
        assert_eq!(outcome.sources.len(), 5);
    }

    #[tokio::test]
    async fn chat_failure_becomes_error_outcome() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![hit("doc.txt", 0, "body", 0.8)];
        let pipeline = retriever(
            vectors,
            FakeMetadataStore::default(),
            FakeChat {
                fail: true,
                ..Default::default()
            },
        );

        let outcome = pipeline.query("anything", Some("session-9"), None, None).await;

        assert_eq!(outcome.status, QueryStatus::Error);
        assert_eq!(outcome.answer, ERROR_ANSWER);
        assert!(outcome.sources.is_empty());
        assert!(pipeline.metadata.history.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn history_write_failure_does_not_break_the_response() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![hit("doc.txt", 0, "body", 0.8)];
        let pipeline = retriever(
            vectors,
            FakeMetadataStore {
                fail_writes: true,
                ..Default::default()
            },
            FakeChat::default(),
        );

        let outcome = pipeline.query("anything", Some("session-2"), None, None).await;

        assert_eq!(outcome.status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn source_filter_and_threshold_reach_the_vector_store() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![
            hit("manual.pdf", 0, "valve body", 0.9),
            hit("other.txt", 0, "unrelated", 0.8),
        ];
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let outcome = pipeline
            .query("relief valve?", None, None, Some("manual.pdf"))
            .await;

        assert_eq!(outcome.documents_retrieved, 1);
        assert_eq!(outcome.sources[0].source, "manual.pdf");

        let (threshold, filter) = pipeline
            .vectors
            .last_search
            .lock()
            .expect("lock")
            .clone()
            .expect("search recorded");
        assert_eq!(threshold, RagOptions::default().similarity_threshold);
        let filter = filter.expect("filter forwarded");
        assert_eq!(filter.field, SOURCE_FIELD);
        assert_eq!(filter.value, "manual.pdf");
    }

    #[tokio::test]
    async fn search_applies_the_raw_score_floor_and_rounds_scores() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![
            hit("a.txt", 0, "strong match", 0.876_543_21),
            hit("b.txt", 1, "weak match", 0.4),
        ];
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let results = pipeline
            .search_similar_documents("query", 10)
            .await
            .expect("search");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.8765);

        let (threshold, filter) = pipeline
            .vectors
            .last_search
            .lock()
            .expect("lock")
            .clone()
            .expect("search recorded");
        assert_eq!(threshold, MIN_SIMILARITY_SCORE);
        assert!(filter.is_none());
    }

    #[tokio::test]
    async fn search_similar_returns_ranked_chunks_without_generation() {
        let vectors = FakeVectorStore::default();
        *vectors.search_hits.lock().expect("lock") = vec![
            hit("a.txt", 0, "first", 0.9),
            hit("b.txt", 1, "second", 0.7),
        ];
        let pipeline = retriever(vectors, FakeMetadataStore::default(), FakeChat::default());

        let results = pipeline
            .search_similar_documents("query", 10)
            .await
            .expect("search");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].payload.source, "a.txt");
        // generation was never invoked
        assert!(pipeline.chat.last_user_prompt.lock().expect("lock").is_none());
    }

    #[tokio::test]
    async fn history_reads_back_in_chronological_order() {
        let pipeline = retriever(
            FakeVectorStore::default(),
            FakeMetadataStore::default(),
            FakeChat::default(),
        );

        pipeline.query("first question", Some("s"), None, None).await;
        pipeline.query("second question", Some("s"), None, None).await;

        let history = pipeline.get_chat_history("s", 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query, "first question");
        assert_eq!(history[1].query, "second question");
    }
}
