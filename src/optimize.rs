//! Few-shot and instruction optimizers.
//!
//! Both optimizers return a new [`Predict`]; the input program is never
//! modified, so callers can keep reporting the unoptimized baseline when
//! compilation fails.

use std::future::Future;

use crate::{evaluate, Example, GeminiClient, Predict, Result, Signature, Sleeper};

/// Rewrites a program's instruction and/or demos using labeled data.
pub trait Optimizer<S: Signature> {
    fn compile<Sl, M>(
        &self,
        client: &GeminiClient<Sl>,
        program: &Predict<S>,
        metric: &M,
        trainset: &[Example<S>],
        devset: &[Example<S>],
    ) -> impl Future<Output = Result<Predict<S>>>
    where
        Sl: Sleeper,
        M: Fn(&Example<S>, &S::Output) -> bool;
}

/// Attaches the first `k` training examples as demos.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabeledFewShot {
    pub k: usize,
}

impl LabeledFewShot {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn select<S: Signature>(&self, trainset: &[Example<S>]) -> Vec<Example<S>> {
        trainset.iter().take(self.k).cloned().collect()
    }
}

impl Default for LabeledFewShot {
    fn default() -> Self {
        Self { k: 16 }
    }
}

impl<S: Signature> Optimizer<S> for LabeledFewShot {
    async fn compile<Sl, M>(
        &self,
        _client: &GeminiClient<Sl>,
        program: &Predict<S>,
        _metric: &M,
        trainset: &[Example<S>],
        _devset: &[Example<S>],
    ) -> Result<Predict<S>>
    where
        Sl: Sleeper,
        M: Fn(&Example<S>, &S::Output) -> bool,
    {
        Ok(program.clone().with_demos(self.select(trainset)))
    }
}

/// Score of one instruction tried by [`InstructionSearch`].
#[derive(Clone, Debug, PartialEq)]
pub struct Trial {
    pub instruction: String,
    pub accuracy: f64,
}

/// Scores the program's own instruction and every candidate on the devset,
/// each with the same labeled demos, and keeps the best.
///
/// Ties keep the earlier instruction, so the baseline survives unless a
/// candidate is strictly better.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstructionSearch {
    pub candidates: Vec<String>,
    pub demos: LabeledFewShot,
}

impl InstructionSearch {
    pub fn new<I, T>(candidates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            demos: LabeledFewShot::default(),
        }
    }

    pub fn with_demos(mut self, k: usize) -> Self {
        self.demos = LabeledFewShot::new(k);
        self
    }

    /// Runs the search and returns every trial alongside the best program.
    pub async fn search<S, Sl, M>(
        &self,
        client: &GeminiClient<Sl>,
        program: &Predict<S>,
        metric: &M,
        trainset: &[Example<S>],
        devset: &[Example<S>],
    ) -> Result<(Predict<S>, Vec<Trial>)>
    where
        S: Signature,
        Sl: Sleeper,
        M: Fn(&Example<S>, &S::Output) -> bool,
    {
        let seeded = program.clone().with_demos(self.demos.select(trainset));
        let instructions = std::iter::once(program.instruction().to_owned())
            .chain(self.candidates.iter().cloned());

        let mut best: Option<(Predict<S>, f64)> = None;
        let mut trials = Vec::with_capacity(self.candidates.len() + 1);

        for instruction in instructions {
            let candidate = seeded.clone().with_instruction(instruction.clone());
            let accuracy = evaluate(client, &candidate, devset, metric)
                .await?
                .accuracy();

            #[cfg(feature = "tracing")]
            tracing::info!(accuracy, instruction = %instruction, "scored instruction");

            trials.push(Trial {
                instruction,
                accuracy,
            });
            if best.as_ref().map_or(true, |(_, score)| accuracy > *score) {
                best = Some((candidate, accuracy));
            }
        }

        let program = best.map(|(program, _)| program).unwrap_or(seeded);
        Ok((program, trials))
    }
}

impl<S: Signature> Optimizer<S> for InstructionSearch {
    async fn compile<Sl, M>(
        &self,
        client: &GeminiClient<Sl>,
        program: &Predict<S>,
        metric: &M,
        trainset: &[Example<S>],
        devset: &[Example<S>],
    ) -> Result<Predict<S>>
    where
        Sl: Sleeper,
        M: Fn(&Example<S>, &S::Output) -> bool,
    {
        let (program, _) = self
            .search(client, program, metric, trainset, devset)
            .await?;
        Ok(program)
    }
}
