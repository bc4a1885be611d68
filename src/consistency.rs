//! Self-consistency check: ask the model the generated question N times and
//! take a majority vote over the extracted `Answer: X` letters.
//!
//! Calls run with bounded fan-out, but results are tallied in logical call
//! order, so the first-encountered tie-break does not depend on arrival order.
//! A failed call or an unextractable completion just contributes no vote.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{ChoiceLetter, GeneratedQuestion, VerificationResult};
use crate::llm::CompletionProvider;
use crate::prompts::build_verification_prompt;
use crate::util::trunc_for_log;

fn answer_pattern() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  // \b keeps "Answer: Because..." from voting B
  RE.get_or_init(|| Regex::new(r"(?i)answer:\s*\(?([ABCD])\b").expect("answer pattern is valid"))
}

/// First `Answer: X` letter in a completion, if any.
pub fn extract_answer(text: &str) -> Option<ChoiceLetter> {
  let caps = answer_pattern().captures(text)?;
  let letter = caps.get(1)?.as_str().chars().next()?;
  ChoiceLetter::from_char(letter)
}

/// Most frequent letter; ties go to the letter that appeared first.
pub fn majority_vote(votes: &[ChoiceLetter]) -> Option<ChoiceLetter> {
  // (letter, count) in first-seen order
  let mut seen: Vec<(ChoiceLetter, usize)> = Vec::with_capacity(4);
  for v in votes {
    match seen.iter_mut().find(|(l, _)| l == v) {
      Some((_, n)) => *n += 1,
      None => seen.push((*v, 1)),
    }
  }
  let mut best: Option<(ChoiceLetter, usize)> = None;
  for (letter, n) in seen {
    if best.map_or(true, |(_, b)| n > b) {
      best = Some((letter, n));
    }
  }
  best.map(|(l, _)| l)
}

#[derive(Clone)]
pub struct SelfConsistencyChecker {
  provider: Arc<dyn CompletionProvider>,
  prompts: Prompts,
  concurrency: usize,
}

impl SelfConsistencyChecker {
  pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Prompts, concurrency: usize) -> Self {
    Self { provider, prompts, concurrency: concurrency.max(1) }
  }

  #[instrument(level = "info", skip(self, question), fields(concurrency = self.concurrency))]
  pub async fn check(&self, question: &GeneratedQuestion, num_inferences: usize) -> VerificationResult {
    let prompt = build_verification_prompt(&self.prompts, question);
    let prompt = prompt.as_str();
    let provider = &self.provider;

    // `buffered` yields in submission order regardless of completion order.
    let replies: Vec<_> = stream::iter(0..num_inferences)
      .map(|run| async move { (run, provider.complete(prompt).await) })
      .buffered(self.concurrency)
      .collect()
      .await;

    let mut result = VerificationResult { runs: num_inferences, ..Default::default() };
    for (run, reply) in replies {
      match reply {
        Ok(text) => match extract_answer(&text) {
          Some(letter) => {
            debug!(target: "regen", run, %letter, "Verification vote");
            result.votes.push(letter);
          }
          None => warn!(target: "regen", run, text = %trunc_for_log(&text, 120), "No answer letter in verification output"),
        },
        Err(e) => {
          warn!(target: "regen", run, error = %e, "Verification call failed; run casts no vote");
          result.failed_runs += 1;
        }
      }
    }

    result.counts = tally(&result.votes);
    result.answer = majority_vote(&result.votes);

    match result.answer {
      Some(answer) => info!(target: "regen", %answer, votes = result.votes.len(), failed = result.failed_runs, "Self-consistency vote complete"),
      None => warn!(target: "regen", runs = num_inferences, failed = result.failed_runs, "No valid answers extracted"),
    }
    result
  }
}

/// Vote counts keyed by letter.
pub fn tally(votes: &[ChoiceLetter]) -> BTreeMap<ChoiceLetter, usize> {
  let mut counts = BTreeMap::new();
  for v in votes {
    *counts.entry(*v).or_insert(0) += 1;
  }
  counts
}
