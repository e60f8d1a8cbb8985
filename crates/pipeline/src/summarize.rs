//! Map-reduce summarization.
//!
//! Every chunk is summarized independently (map), with at most
//! `max_concurrency` calls in flight. Partial summaries are stored by chunk
//! index so the reduce phase always sees them in document order.
//!
//! Reduce joins the partials and combines them in one call when they fit the
//! combine budget. Otherwise consecutive partials are grouped to fit the
//! budget, each group is collapsed into one intermediate summary, and the
//! process repeats on the shorter list.

use crate::chunk::Chunk;
use crate::model::{before_deadline, ModelCaller};
use crate::progress::ProgressReporter;
use fable_core::config::SummarySettings;
use fable_core::{AppError, AppResult, PipelineStep};
use fable_prompt::PromptTemplate;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::ops::Range;
use std::sync::Arc;
use tokio::time::Instant;

/// Separator placed between summaries handed to a combine or collapse call.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// What happens to completed partial summaries when the stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialPolicy {
    /// Drop them with the failed document
    #[default]
    Discard,
    /// Return them in a [`SummaryCheckpoint`] so a retry can skip them
    Retain,
}

/// Templates used by the stage.
#[derive(Debug, Clone)]
pub struct SummaryPrompts {
    pub map: Arc<PromptTemplate>,
    pub combine: Arc<PromptTemplate>,
    /// Intermediate merges; the combine template when absent
    pub collapse: Option<Arc<PromptTemplate>>,
}

impl SummaryPrompts {
    fn collapse(&self) -> &PromptTemplate {
        self.collapse.as_deref().unwrap_or(&self.combine)
    }
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Maximum characters handed to a single combine or collapse call
    pub combine_budget: usize,
    /// Map calls in flight at once
    pub max_concurrency: usize,
    pub partial_policy: PartialPolicy,
    /// Collapse passes allowed before giving up
    pub max_collapse_depth: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self::from(&SummarySettings::default())
    }
}

impl From<&SummarySettings> for SummaryConfig {
    fn from(settings: &SummarySettings) -> Self {
        Self {
            combine_budget: settings.combine_budget,
            max_concurrency: settings.max_concurrency.max(1),
            partial_policy: if settings.keep_partials {
                PartialPolicy::Retain
            } else {
                PartialPolicy::Discard
            },
            max_collapse_depth: settings.max_collapse_depth,
        }
    }
}

/// Partial summaries completed before a failure, indexed by chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCheckpoint {
    partials: Vec<Option<String>>,
}

impl SummaryCheckpoint {
    /// Number of chunks the checkpoint covers.
    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    pub fn completed(&self) -> usize {
        self.partials.iter().filter(|p| p.is_some()).count()
    }

    /// Chunk indexes still lacking a summary.
    pub fn missing(&self) -> Vec<usize> {
        self.partials
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn partial(&self, index: usize) -> Option<&str> {
        self.partials.get(index).and_then(|p| p.as_deref())
    }
}

/// A failed summarization, with completed work when the policy retains it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SummarizeError {
    #[source]
    pub error: AppError,
    pub checkpoint: Option<SummaryCheckpoint>,
}

impl From<SummarizeError> for AppError {
    fn from(err: SummarizeError) -> Self {
        err.error
    }
}

/// Final summary of one document.
#[derive(Debug, Clone)]
pub struct CombinedSummary {
    pub text: String,
    /// Map-phase outputs in chunk order
    pub partials: Vec<String>,
    /// Intermediate collapse passes before the final combine
    pub collapse_passes: usize,
    /// Model calls issued by this run (resumed partials excluded)
    pub model_calls: usize,
}

pub struct Summarizer {
    caller: ModelCaller,
    prompts: SummaryPrompts,
    config: SummaryConfig,
    progress: ProgressReporter,
}

impl Summarizer {
    pub fn new(caller: ModelCaller, prompts: SummaryPrompts, config: SummaryConfig) -> Self {
        Self {
            caller,
            prompts,
            config,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Summarize `chunks` into one text.
    ///
    /// A `checkpoint` from an earlier failed run over the same chunks skips the
    /// map calls it already holds.
    pub async fn summarize(
        &self,
        chunks: &[Chunk],
        deadline: Option<Instant>,
        checkpoint: Option<SummaryCheckpoint>,
    ) -> Result<CombinedSummary, SummarizeError> {
        if chunks.is_empty() {
            return Err(self.discard(AppError::Other("nothing to summarize".to_string())));
        }

        let mut partials = match checkpoint {
            Some(checkpoint) if checkpoint.len() == chunks.len() => checkpoint.partials,
            Some(checkpoint) => {
                return Err(self.discard(AppError::Other(format!(
                    "checkpoint covers {} chunks but the document has {}",
                    checkpoint.len(),
                    chunks.len()
                ))))
            }
            None => vec![None; chunks.len()],
        };

        let map_calls = match self.map_phase(chunks, &mut partials, deadline).await {
            Ok(calls) => calls,
            Err(error) => return Err(self.fail(error, partials)),
        };

        let summaries: Vec<String> = partials.iter().flatten().cloned().collect();
        match self.reduce_phase(&summaries, deadline).await {
            Ok((text, collapse_passes, reduce_calls)) => {
                tracing::info!(
                    chunks = chunks.len(),
                    collapse_passes,
                    model_calls = map_calls + reduce_calls,
                    "Document summarized"
                );
                Ok(CombinedSummary {
                    text,
                    partials: summaries,
                    collapse_passes,
                    model_calls: map_calls + reduce_calls,
                })
            }
            Err(error) => Err(self.fail(error, partials)),
        }
    }

    fn fail(&self, error: AppError, partials: Vec<Option<String>>) -> SummarizeError {
        let checkpoint = match self.config.partial_policy {
            PartialPolicy::Retain => Some(SummaryCheckpoint { partials }),
            PartialPolicy::Discard => None,
        };
        SummarizeError { error, checkpoint }
    }

    fn discard(&self, error: AppError) -> SummarizeError {
        SummarizeError {
            error,
            checkpoint: None,
        }
    }

    /// Fill every empty slot of `partials`. Returns the number of calls made.
    async fn map_phase(
        &self,
        chunks: &[Chunk],
        partials: &mut [Option<String>],
        deadline: Option<Instant>,
    ) -> AppResult<usize> {
        let pending: Vec<usize> = (0..chunks.len()).filter(|&i| partials[i].is_none()).collect();
        let total = chunks.len() as u64;
        let mut done = (chunks.len() - pending.len()) as u64;
        let issued = pending.len();

        if done > 0 {
            tracing::info!(resumed = done, remaining = issued, "Resuming from checkpoint");
        }

        let mut results = stream::iter(pending.into_iter().map(|index| async move {
            let result = match self.prompts.map.render_text(chunks[index].text.trim()) {
                Ok(prompt) => self.caller.call(&prompt.user).await,
                Err(e) => Err(e),
            };
            (index, result)
        }))
        .buffer_unordered(self.config.max_concurrency.max(1));

        loop {
            let next = match before_deadline(deadline, "map phase", async {
                Ok::<_, AppError>(results.next().await)
            })
            .await
            {
                Ok(next) => next,
                Err(error) => {
                    // Attributed to the first chunk still without a summary
                    let chunk = partials.iter().position(Option::is_none).unwrap_or(0);
                    return Err(error.at(PipelineStep::Map { chunk }));
                }
            };

            match next {
                Some((index, Ok(summary))) => {
                    tracing::debug!(chunk = index, chars = summary.len(), "Chunk summarized");
                    partials[index] = Some(summary);
                    done += 1;
                    self.progress.map(done, total);
                }
                Some((index, Err(error))) => {
                    tracing::warn!(chunk = index, error = %error, "Chunk summary failed");
                    return Err(error.at(PipelineStep::Map { chunk: index }));
                }
                None => break,
            }
        }

        Ok(issued)
    }

    /// Returns the final text, the number of collapse passes and the number
    /// of calls made.
    async fn reduce_phase(
        &self,
        partials: &[String],
        deadline: Option<Instant>,
    ) -> AppResult<(String, usize, usize)> {
        let budget = self.config.combine_budget;
        let mut current = partials.to_vec();
        let mut level = 0usize;
        let mut calls = 0usize;

        while joined_len(&current) > budget {
            if level >= self.config.max_collapse_depth {
                return Err(AppError::Other(format!(
                    "summaries still exceed the combine budget ({} chars) after {} collapse passes",
                    budget, level
                ))
                .at(PipelineStep::Combine));
            }
            level += 1;

            let groups = partition(&current, budget);
            self.progress.combine(level as u64, groups.len() as u64);
            tracing::debug!(level, groups = groups.len(), inputs = current.len(), "Collapsing summaries");

            let inputs = &current;
            let collapsed: Vec<String> = stream::iter(groups.into_iter().enumerate().map(
                |(group, range)| async move {
                    let joined = inputs[range].join(SUMMARY_SEPARATOR);
                    let result = match self.prompts.collapse().render_text(&joined) {
                        Ok(prompt) => {
                            before_deadline(deadline, "collapse", self.caller.call(&prompt.user))
                                .await
                        }
                        Err(e) => Err(e),
                    };
                    result.map_err(|e| e.at(PipelineStep::Collapse { level, group }))
                },
            ))
            .buffered(self.config.max_concurrency.max(1))
            .try_collect()
            .await?;

            calls += collapsed.len();
            current = collapsed;
        }

        self.progress.combine(0, 1);
        let prompt = self.prompts.combine.render_text(&current.join(SUMMARY_SEPARATOR))?;
        let text = before_deadline(deadline, "combine", self.caller.call(&prompt.user))
            .await
            .map_err(|e| e.at(PipelineStep::Combine))?;

        Ok((text, level, calls + 1))
    }
}

/// Characters in `summaries` joined by [`SUMMARY_SEPARATOR`].
fn joined_len(summaries: &[String]) -> usize {
    let separators = summaries.len().saturating_sub(1) * SUMMARY_SEPARATOR.len();
    summaries.iter().map(|s| s.chars().count()).sum::<usize>() + separators
}

/// Split `summaries` into consecutive groups whose joined length fits
/// `budget`. A summary longer than the budget forms its own group.
fn partition(summaries: &[String], budget: usize) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    let mut len = 0;

    for (i, summary) in summaries.iter().enumerate() {
        let chars = summary.chars().count();
        if i > start && len + SUMMARY_SEPARATOR.len() + chars > budget {
            groups.push(start..i);
            start = i;
            len = 0;
        }
        len += if i > start {
            SUMMARY_SEPARATOR.len() + chars
        } else {
            chars
        };
    }

    if start < summaries.len() {
        groups.push(start..summaries.len());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(n: usize, len: usize) -> Vec<String> {
        (0..n).map(|_| "s".repeat(len)).collect()
    }

    #[test]
    fn test_joined_len() {
        assert_eq!(joined_len(&[]), 0);
        assert_eq!(joined_len(&strings(1, 10)), 10);
        assert_eq!(joined_len(&strings(3, 10)), 34);
        assert_eq!(joined_len(&["ñandú".to_string()]), 5);
    }

    #[test]
    fn test_partition_fits_budget() {
        let groups = partition(&strings(27, 10), 34);
        assert_eq!(groups.len(), 9);
        assert!(groups.iter().all(|g| g.len() == 3));
        assert_eq!(groups[8], 24..27);
    }

    #[test]
    fn test_partition_oversized_summary_alone() {
        let summaries = vec!["a".repeat(5), "b".repeat(50), "c".repeat(5)];
        let groups = partition(&summaries, 20);
        assert_eq!(groups, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_partition_keeps_order_and_covers_all() {
        let summaries: Vec<String> = (0..7).map(|i| "x".repeat(i + 1)).collect();
        let groups = partition(&summaries, 9);
        let mut expected = 0;
        for group in &groups {
            assert_eq!(group.start, expected);
            assert!(joined_len(&summaries[group.clone()]) <= 9 || group.len() == 1);
            expected = group.end;
        }
        assert_eq!(expected, 7);
    }

    #[test]
    fn test_checkpoint_accessors() {
        let checkpoint = SummaryCheckpoint {
            partials: vec![Some("a".to_string()), None, Some("c".to_string())],
        };
        assert_eq!(checkpoint.len(), 3);
        assert_eq!(checkpoint.completed(), 2);
        assert_eq!(checkpoint.missing(), vec![1]);
        assert_eq!(checkpoint.partial(2), Some("c"));
        assert_eq!(checkpoint.partial(1), None);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = SummarySettings {
            keep_partials: true,
            max_concurrency: 0,
            ..SummarySettings::default()
        };
        let config = SummaryConfig::from(&settings);
        assert_eq!(config.partial_policy, PartialPolicy::Retain);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(SummaryConfig::default().partial_policy, PartialPolicy::Discard);
    }
}
