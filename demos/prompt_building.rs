use gemini_prompt::{Field, GeminiClient, Predict, Signature};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
struct Sentence {
    sentence: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Classification {
    sentiment: Sentiment,
    confidence: f64,
}

struct Classify;

impl Signature for Classify {
    type Input = Sentence;
    type Output = Classification;

    fn instruction() -> &'static str {
        "Classify sentiment of a given sentence."
    }

    fn input_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("sentence", "")];
        FIELDS
    }

    fn output_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("sentiment", "").with_choices(&["positive", "negative", "neutral"]),
            Field::new("confidence", "between 0 and 1"),
        ];
        FIELDS
    }

    fn validate(output: &Classification) -> Result<(), String> {
        if (0.0..=1.0).contains(&output.confidence) {
            Ok(())
        } else {
            Err(format!("confidence {} is outside [0, 1]", output.confidence))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = std::env::var("GEMINI_API_KEY")?;
    let client = GeminiClient::new(api_key, "gemini/gemini-2.5-flash");

    let classify = Predict::<Classify>::new();
    let result = classify
        .forward(
            &client,
            &Sentence {
                sentence: "This book was super fun to read, though not the last chapter."
                    .to_owned(),
            },
        )
        .await?;

    println!("\nClassification Result:");
    println!("{:?}", result.output);

    println!("\n--- Prompt Built for the Model ---");
    for entry in client.inspect_history(1) {
        println!("{entry}");
    }

    Ok(())
}
