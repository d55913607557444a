//! The 5-step research pipeline.
//!
//! One research session moves through a fixed sequence of states:
//!
//! ```text
//! Pending → Retrieved1 → Drafted → Retrieved2 → Finalized
//!     └────────┴──────────┴───────────┴──▶ Failed (terminal)
//! ```
//!
//! Step 1 retrieves round-1 chunks for the query, step 2 drafts an answer
//! and extracts knowledge gaps, step 3 retrieves again per gap, step 4
//! generates the final cited answer and fixes source numbers, step 5
//! assembles and persists the session record. `Failed` is reachable from
//! any non-terminal state; a terminal session is never mutated again.
//!
//! The pipeline pins one index snapshot at step 1 and uses it for every
//! retrieval in the session, so scores stay internally comparable even if
//! documents are added or deleted concurrently. The only suspension points
//! are the two generation calls and persistence; each generation call is
//! retried exactly once before the session fails. Cancellation is honored
//! only at step boundaries, never mid-call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use log::{debug, warn};

use crate::citations::{self, CitationMapper};
use crate::config::RetrievalConfig;
use crate::generation::{ContextChunk, DraftOutput, GenerationClient};
use crate::index::IndexManager;
use crate::models::{ResearchSession, SessionStatus, TimelineStep};
use crate::retrieve::{retrieve_all, ScoredChunk};
use crate::store::Store;

/// Progress of one session through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Pending,
    Retrieved1,
    Drafted,
    Retrieved2,
    Finalized,
}

/// Run one research session end to end.
///
/// Always returns the session record; computation and collaborator
/// failures are reported through its `status` and timeline rather than as
/// errors, so a computed-but-unpersisted result is never lost.
pub async fn run_research(
    index: &IndexManager,
    generator: &dyn GenerationClient,
    store: &dyn Store,
    retrieval: &RetrievalConfig,
    query: &str,
    cancel: Option<&AtomicBool>,
) -> Result<ResearchSession> {
    let mut session = ResearchSession::new(query.trim());
    session.status = SessionStatus::Running;
    debug!("session {}: {:?}", session.id, PipelineState::Pending);

    if let Err(e) = store.create(&session).await {
        warn!("session {}: store unavailable at start: {e:#}", session.id);
        return fail(store, session, 1, "session store unavailable").await;
    }

    // Step 1: initial retrieval against a pinned snapshot.
    let snapshot = index.snapshot();
    if snapshot.is_empty() {
        return fail(store, session, 1, "no documents").await;
    }

    let query_vec = snapshot.query_vector(query);
    let round1 = retrieve_all(&snapshot, &query_vec, retrieval.round1());
    record_step(
        store,
        &mut session,
        TimelineStep::new(1, format!("Retrieved {} chunks for the query", round1.len()))
            .with_chunks(round1.len()),
    )
    .await;
    debug!("session {}: {:?}", session.id, PipelineState::Retrieved1);
    if is_cancelled(cancel) {
        return fail(store, session, 2, "cancelled").await;
    }

    // Step 2: draft answer and gap extraction. An empty round 1 still
    // drafts, so generation can state there is insufficient information.
    let draft_ctx = to_context(round1.iter());
    let draft = match call_draft(generator, query, &draft_ctx).await {
        Ok(d) => d,
        Err(()) => return fail(store, session, 2, "generation unavailable").await,
    };
    session.gap_questions = draft.gap_questions.clone();
    record_step(
        store,
        &mut session,
        TimelineStep::new(
            2,
            format!(
                "Drafted an initial answer and identified {} knowledge gaps",
                draft.gap_questions.len()
            ),
        )
        .with_gaps(draft.gap_questions.len()),
    )
    .await;
    debug!("session {}: {:?}", session.id, PipelineState::Drafted);
    if is_cancelled(cancel) {
        return fail(store, session, 3, "cancelled").await;
    }

    // Step 3: one retrieval per gap against the same pinned snapshot,
    // merged by chunk id keeping the best score.
    let mut merged: HashMap<String, ScoredChunk> = HashMap::new();
    for gap in &draft.gap_questions {
        let gap_vec = snapshot.query_vector(gap);
        for chunk in retrieve_all(&snapshot, &gap_vec, retrieval.round2()) {
            merged
                .entry(chunk.chunk_id.clone())
                .and_modify(|existing| {
                    if chunk.score > existing.score {
                        existing.score = chunk.score;
                    }
                })
                .or_insert(chunk);
        }
    }
    let mut round2: Vec<ScoredChunk> = merged.into_values().collect();
    round2.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    record_step(
        store,
        &mut session,
        TimelineStep::new(
            3,
            format!("Retrieved {} additional chunks for gaps", round2.len()),
        )
        .with_chunks(round2.len()),
    )
    .await;
    debug!("session {}: {:?}", session.id, PipelineState::Retrieved2);
    if is_cancelled(cancel) {
        return fail(store, session, 4, "cancelled").await;
    }

    // Step 4: final generation over the deduplicated union, then fix
    // source numbers: round-1 chunks first, round-2 after, best score wins.
    let mut seen = std::collections::HashSet::new();
    let union: Vec<&ScoredChunk> = round1
        .iter()
        .chain(round2.iter())
        .filter(|c| seen.insert(c.chunk_id.clone()))
        .collect();
    let final_ctx = to_context(union.iter().copied());

    let raw_answer = match call_final(
        generator,
        query,
        &final_ctx,
        &draft.answer,
        &draft.gap_questions,
    )
    .await
    {
        Ok(text) => text,
        Err(()) => return fail(store, session, 4, "generation unavailable").await,
    };

    let mut mapper = CitationMapper::new();
    for chunk in round1.iter().chain(round2.iter()) {
        mapper.accept(chunk);
    }
    let local_to_stable: Vec<usize> = union
        .iter()
        .enumerate()
        .map(|(i, c)| mapper.source_number(&c.chunk_id).unwrap_or(i + 1))
        .collect();
    session.final_answer = citations::renumber_markers(&raw_answer, &local_to_stable);
    record_step(
        store,
        &mut session,
        TimelineStep::new(
            4,
            format!("Generated the final answer citing {} sources", mapper.len()),
        )
        .with_citations(mapper.len()),
    )
    .await;
    if is_cancelled(cancel) {
        return fail(store, session, 5, "cancelled").await;
    }

    // Step 5: assemble and persist.
    session.citations = mapper.into_citations();
    session.status = SessionStatus::Completed;
    let cited = session.citations.len();
    record_step(
        store,
        &mut session,
        TimelineStep::new(5, format!("Completed with {cited} cited sources")),
    )
    .await;
    debug!("session {}: {:?}", session.id, PipelineState::Finalized);

    if let Err(e) = store.finalize(&session).await {
        // The computed result is still surfaced to the caller, but a
        // session that was never persisted must not report success.
        warn!("session {}: persistence failed: {e:#}", session.id);
        session.status = SessionStatus::Failed;
        session
            .timeline
            .push(TimelineStep::new(5, "session store unavailable"));
    }

    Ok(session)
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn to_context<'a>(chunks: impl Iterator<Item = &'a ScoredChunk>) -> Vec<ContextChunk> {
    chunks
        .map(|c| ContextChunk {
            id: c.chunk_id.clone(),
            filename: c.filename.clone(),
            text: c.text.clone(),
        })
        .collect()
}

/// Draft call with the retry-once policy.
async fn call_draft(
    generator: &dyn GenerationClient,
    query: &str,
    chunks: &[ContextChunk],
) -> Result<DraftOutput, ()> {
    match generator.generate_draft(query, chunks).await {
        Ok(d) => Ok(d),
        Err(first) => {
            warn!("draft generation failed, retrying once: {first}");
            generator.generate_draft(query, chunks).await.map_err(|second| {
                warn!("draft generation failed again: {second}");
            })
        }
    }
}

/// Final-answer call with the retry-once policy.
async fn call_final(
    generator: &dyn GenerationClient,
    query: &str,
    chunks: &[ContextChunk],
    draft: &str,
    gaps: &[String],
) -> Result<String, ()> {
    match generator.generate_final(query, chunks, draft, gaps).await {
        Ok(t) => Ok(t),
        Err(first) => {
            warn!("final generation failed, retrying once: {first}");
            generator
                .generate_final(query, chunks, draft, gaps)
                .await
                .map_err(|second| {
                    warn!("final generation failed again: {second}");
                })
        }
    }
}

/// Record a timeline step on the session and best-effort persist it.
async fn record_step(store: &dyn Store, session: &mut ResearchSession, step: TimelineStep) {
    if let Err(e) = store.append_step(&session.id, &step).await {
        warn!("session {}: failed to persist step {}: {e:#}", session.id, step.step);
    }
    session.timeline.push(step);
}

/// Transition to the terminal `Failed` state with the reason recorded in
/// the timeline, persisting best-effort.
async fn fail(
    store: &dyn Store,
    mut session: ResearchSession,
    step: u8,
    reason: &str,
) -> Result<ResearchSession> {
    warn!("session {} failed at step {step}: {reason}", session.id);
    let note = TimelineStep::new(step, reason);
    if let Err(e) = store.append_step(&session.id, &note).await {
        warn!("session {}: failed to persist failure step: {e:#}", session.id);
    }
    session.timeline.push(note);
    session.status = SessionStatus::Failed;
    if let Err(e) = store.finalize(&session).await {
        warn!("session {}: failed to persist failed session: {e:#}", session.id);
    }
    Ok(session)
}
