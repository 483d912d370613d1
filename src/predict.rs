use std::fmt;

use crate::{
    signature::{parse_output, render_input, render_system_instruction},
    GeminiClient, GenerateRequest, PromptError, Result, Signature, Sleeper,
};

/// One labeled input/output pair of a signature.
pub struct Example<S: Signature> {
    pub input: S::Input,
    pub output: S::Output,
}

impl<S: Signature> Example<S> {
    pub fn new(input: S::Input, output: S::Output) -> Self {
        Self { input, output }
    }
}

impl<S: Signature> Clone for Example<S> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

impl<S: Signature> fmt::Debug for Example<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Example")
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// Decoded model answer.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction<O> {
    pub output: O,
    /// Step-by-step reasoning, when the program asked for it.
    pub reasoning: Option<String>,
}

/// Calls the model for one [`Signature`], optionally with few-shot demos and
/// chain-of-thought reasoning.
pub struct Predict<S: Signature> {
    instruction: String,
    demos: Vec<Example<S>>,
    reasoning: bool,
    temperature: Option<f32>,
}

impl<S: Signature> Predict<S> {
    pub fn new() -> Self {
        Self {
            instruction: S::instruction().to_owned(),
            demos: Vec::new(),
            reasoning: false,
            temperature: None,
        }
    }

    /// Predictor that asks for `reasoning` before the outputs.
    pub fn chain_of_thought() -> Self {
        Self {
            reasoning: true,
            ..Self::new()
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_demos(mut self, demos: impl IntoIterator<Item = Example<S>>) -> Self {
        self.demos = demos.into_iter().collect();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn demos(&self) -> &[Example<S>] {
        &self.demos
    }

    pub fn uses_reasoning(&self) -> bool {
        self.reasoning
    }

    /// Renders the request sent for `input`: demos become alternating
    /// user/model turns ahead of the real input.
    pub fn build_request(&self, input: &S::Input) -> Result<GenerateRequest> {
        let system = render_system_instruction(
            &self.instruction,
            S::input_fields(),
            S::output_fields(),
            self.reasoning,
        );
        let mut request = GenerateRequest::default().with_system(system).json_output();
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        for demo in &self.demos {
            let answer = serde_json::to_string(&demo.output)
                .map_err(|err| PromptError::Parse(format!("demo output is not serializable: {err}")))?;
            request = request
                .push_user(render_input(&demo.input)?)
                .push_model(answer);
        }

        Ok(request.push_user(render_input(input)?))
    }

    /// Runs the model on `input` and decodes the reply.
    pub async fn forward<Sl: Sleeper>(
        &self,
        client: &GeminiClient<Sl>,
        input: &S::Input,
    ) -> Result<Prediction<S::Output>> {
        let request = self.build_request(input)?;
        let generation = client.generate(&request).await?;
        let (output, reasoning) = parse_output::<S>(&generation.text, self.reasoning)?;
        Ok(Prediction { output, reasoning })
    }
}

impl<S: Signature> Default for Predict<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signature> Clone for Predict<S> {
    fn clone(&self) -> Self {
        Self {
            instruction: self.instruction.clone(),
            demos: self.demos.clone(),
            reasoning: self.reasoning,
            temperature: self.temperature,
        }
    }
}

impl<S: Signature> fmt::Debug for Predict<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predict")
            .field("instruction", &self.instruction)
            .field("demos", &self.demos)
            .field("reasoning", &self.reasoning)
            .field("temperature", &self.temperature)
            .finish()
    }
}
