use gemini_prompt::{Field, GeminiClient, Predict, Rag, Signature, WikipediaSearch};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize)]
struct Question {
    question: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct NumericAnswer {
    answer: f64,
}

/// `question -> answer: float`
struct Math;

impl Signature for Math {
    type Input = Question;
    type Output = NumericAnswer;

    fn instruction() -> &'static str {
        "Answer the math question."
    }

    fn input_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("question", "")];
        FIELDS
    }

    fn output_fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[Field::new("answer", "a decimal number")];
        FIELDS
    }
}

async fn chain_of_thought(client: &GeminiClient) -> anyhow::Result<()> {
    let math = Predict::<Math>::chain_of_thought();
    let result = math
        .forward(
            client,
            &Question {
                question: "Two dice are tossed. What is the probability that the sum equals two?"
                    .to_owned(),
            },
        )
        .await?;
    println!("{result:?}");
    Ok(())
}

async fn rag(client: &GeminiClient) -> anyhow::Result<()> {
    let rag = Rag::new(WikipediaSearch::new()).with_k(3);
    let question = "What's the name of the castle that David Gregory inherited?";
    let answer = rag.answer(client, question).await?;

    for passage in &answer.passages {
        println!("  context: {passage}");
    }
    if let Some(reasoning) = &answer.prediction.reasoning {
        println!("reasoning: {reasoning}");
    }
    println!("response: {}", answer.prediction.output.response);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = GeminiClient::from_env()?;

    println!("Chain of Thought Example:");
    chain_of_thought(&client).await?;

    println!("\nRAG Example:");
    rag(&client).await?;

    Ok(())
}
