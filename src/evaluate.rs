use std::fmt;

use crate::{Example, GeminiClient, Predict, PromptError, Result, Signature, Sleeper};

/// Metric comparing the predicted output with the label.
pub fn exact_match<S: Signature>(example: &Example<S>, predicted: &S::Output) -> bool {
    &example.output == predicted
}

/// Result of running the program on one devset example.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome<O> {
    pub index: usize,
    /// Decoded output, or the reason the reply could not be used.
    pub predicted: std::result::Result<O, String>,
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation<O> {
    pub outcomes: Vec<Outcome<O>>,
}

impl<O> Evaluation<O> {
    pub fn correct(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.correct).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Fraction of correct outcomes; `0.0` for an empty devset.
    pub fn accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.correct() as f64 / self.total() as f64
    }
}

impl<O> fmt::Display for Evaluation<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.correct(),
            self.total(),
            self.accuracy() * 100.0
        )
    }
}

/// Runs `program` over `devset` in order and scores each reply with `metric`.
///
/// Replies that fail to parse or are blocked count as incorrect. Any other
/// error, including [`PromptError::RateLimitExhausted`], aborts the run.
pub async fn evaluate<S, Sl, M>(
    client: &GeminiClient<Sl>,
    program: &Predict<S>,
    devset: &[Example<S>],
    metric: &M,
) -> Result<Evaluation<S::Output>>
where
    S: Signature,
    Sl: Sleeper,
    M: Fn(&Example<S>, &S::Output) -> bool,
{
    let mut outcomes = Vec::with_capacity(devset.len());
    for (index, example) in devset.iter().enumerate() {
        let outcome = match program.forward(client, &example.input).await {
            Ok(prediction) => Outcome {
                index,
                correct: metric(example, &prediction.output),
                predicted: Ok(prediction.output),
            },
            Err(err @ (PromptError::Parse(_) | PromptError::Blocked { .. })) => Outcome {
                index,
                predicted: Err(err.to_string()),
                correct: false,
            },
            Err(err) => return Err(err),
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(index, correct = outcome.correct, "evaluated example");

        outcomes.push(outcome);
    }
    Ok(Evaluation { outcomes })
}
