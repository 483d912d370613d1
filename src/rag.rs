use serde::{Deserialize, Serialize};

use crate::{
    Field, GeminiClient, Passage, Predict, Prediction, Result, SearchProvider, Signature, Sleeper,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnswerInput {
    pub context: Vec<String>,
    pub question: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutput {
    pub response: String,
}

/// `context, question -> response`
pub struct GenerateAnswer;

impl Signature for GenerateAnswer {
    type Input = AnswerInput;
    type Output = AnswerOutput;

    fn instruction() -> &'static str {
        "Answer the question using the retrieved context."
    }

    fn input_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("context", "passages that may contain relevant facts"),
            Field::new("question", ""),
        ];
        FIELDS
    }

    fn output_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("response", "")];
        FIELDS
    }
}

/// Answer produced by [`Rag::answer`] with the passages it was grounded on.
#[derive(Clone, Debug, PartialEq)]
pub struct RagAnswer {
    pub passages: Vec<Passage>,
    pub prediction: Prediction<AnswerOutput>,
}

/// Retrieve-then-answer program.
#[derive(Clone, Debug)]
pub struct Rag<P> {
    provider: P,
    k: usize,
    predict: Predict<GenerateAnswer>,
}

impl<P: SearchProvider> Rag<P> {
    /// Retrieves three passages per question and answers with reasoning.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            k: 3,
            predict: Predict::chain_of_thought(),
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_predict(mut self, predict: Predict<GenerateAnswer>) -> Self {
        self.predict = predict;
        self
    }

    pub async fn answer<S: Sleeper>(
        &self,
        client: &GeminiClient<S>,
        question: &str,
    ) -> Result<RagAnswer> {
        let passages = self.provider.search(question, self.k).await?;
        let input = AnswerInput {
            context: passages.iter().map(Passage::to_string).collect(),
            question: question.to_owned(),
        };
        let prediction = self.predict.forward(client, &input).await?;
        Ok(RagAnswer {
            passages,
            prediction,
        })
    }
}
