use gemini_prompt::{
    evaluate, exact_match, Example, Field, GeminiClient, InstructionSearch, Predict, PromptError,
    Signature,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize)]
struct Text {
    text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Label {
    label: String,
}

/// Labels whose meaning only the training data reveals:
/// `Oink!` is positive, `Bingo!` is neutral, `Hmmm...` is negative.
struct AnalyzeText;

impl Signature for AnalyzeText {
    type Input = Text;
    type Output = Label;

    fn instruction() -> &'static str {
        "Process the input."
    }

    fn input_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("text", "input data")];
        FIELDS
    }

    fn output_fields() -> &'static [Field] {
        const FIELDS: &[Field] =
            &[Field::new("label", "output").with_choices(&["Bingo!", "Hmmm...", "Oink!"])];
        FIELDS
    }
}

fn labeled(pairs: &[(&str, &str)]) -> Vec<Example<AnalyzeText>> {
    pairs
        .iter()
        .map(|(text, label)| {
            Example::new(
                Text {
                    text: (*text).to_owned(),
                },
                Label {
                    label: (*label).to_owned(),
                },
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = GeminiClient::from_env()?;

    let trainset = labeled(&[
        ("I absolutely loved it!", "Oink!"),
        ("Complete waste of time.", "Hmmm..."),
        ("It was okay I guess.", "Bingo!"),
        ("Some good moments but mostly disappointing.", "Bingo!"),
        ("Could have been worse, could have been better.", "Bingo!"),
        ("Exceeded all my expectations!", "Oink!"),
        ("Boring from start to finish.", "Hmmm..."),
        ("Interesting concept, poor execution.", "Bingo!"),
        ("Meh.", "Bingo!"),
        ("Best thing I've read all year!", "Oink!"),
    ]);
    let devset = labeled(&[
        ("The first half was amazing but then it fell apart.", "Bingo!"),
        ("Not terrible but nothing special.", "Bingo!"),
        ("An absolute masterpiece in every way!", "Oink!"),
        ("I wanted to like it but it was just awful.", "Hmmm..."),
        ("Has its moments but overall just average.", "Bingo!"),
    ]);
    let metric = exact_match::<AnalyzeText>;

    let baseline = Predict::<AnalyzeText>::new();
    println!("BEFORE optimization");
    println!("  instruction: {:?}", baseline.instruction());
    let before = evaluate(&client, &baseline, &devset, &metric).await?;
    println!("  accuracy: {before}");

    let search = InstructionSearch::new([
        "Classify the sentiment of the text. 'Oink!' means positive, \
         'Bingo!' means neutral or mixed, 'Hmmm...' means negative.",
        "Label the text using the conventions shown in the examples.",
    ])
    .with_demos(8);

    println!("\nOptimizing...");
    let (optimized, trials) = match search
        .search(&client, &baseline, &metric, &trainset, &devset)
        .await
    {
        Ok(found) => found,
        Err(PromptError::RateLimitExhausted { attempts, message }) => {
            println!("  still rate limited after {attempts} attempts: {message}");
            println!("  keeping the baseline program ({before})");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    for trial in &trials {
        println!("  {:>5.1}%  {:?}", trial.accuracy * 100.0, trial.instruction);
    }

    println!("\nAFTER optimization");
    println!("  instruction: {:?}", optimized.instruction());
    println!("  demos: {}", optimized.demos().len());
    let after = evaluate(&client, &optimized, &devset, &metric).await?;
    println!("  accuracy: {after} (was {before})");

    Ok(())
}
