use std::fmt;

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Provider-neutral description of one `generateContent` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<Turn>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub response_mime_type: Option<String>,
}

impl GenerateRequest {
    /// Single user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::default().push_user(text)
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn push_user(mut self, text: impl Into<String>) -> Self {
        self.turns.push(Turn {
            role: Role::User,
            text: text.into(),
        });
        self
    }

    pub fn push_model(mut self, text: impl Into<String>) -> Self {
        self.turns.push(Turn {
            role: Role::Model,
            text: text.into(),
        });
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Asks the model for an `application/json` response body.
    pub fn json_output(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_owned());
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Decoded first candidate of a `generateContent` response.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
    pub model_version: Option<String>,
}

/// One recorded request/response exchange of a [`crate::GeminiClient`].
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub model: String,
    pub request: GenerateRequest,
    pub response: String,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.model)?;
        if let Some(system) = &self.request.system_instruction {
            writeln!(f, "System message:\n\n{system}\n")?;
        }
        for turn in &self.request.turns {
            let label = match turn.role {
                Role::User => "User message",
                Role::Model => "Assistant message",
            };
            writeln!(f, "{label}:\n\n{}\n", turn.text)?;
        }
        write!(f, "Response:\n\n{}", self.response)
    }
}

/// A retrieved search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Passage {
    pub title: String,
    pub text: String,
}

impl fmt::Display for Passage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.title, self.text)
    }
}
