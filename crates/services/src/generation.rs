use std::env;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use gate_core::model::{
    AnswerExplanations, QuestionDraft, QuestionKind, QuizQuestion, VideoContext,
};

use crate::error::GenerationError;

/// Produces one quiz question for a subject from whatever the tab
/// knows about the current video.
#[async_trait]
pub trait QuizGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GenerationError` when no question could be produced.
    async fn generate(
        &self,
        subject: &str,
        context: &VideoContext,
    ) -> Result<QuizQuestion, GenerationError>;
}

#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeneratorConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("STUDYGATE_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("STUDYGATE_AI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("STUDYGATE_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Asks an OpenAI-compatible chat endpoint for a question and parses
/// the JSON object out of its reply.
#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: Option<GeneratorConfig>,
}

impl OpenAiGenerator {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(GeneratorConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<GeneratorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl QuizGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        subject: &str,
        context: &VideoContext,
    ) -> Result<QuizQuestion, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(subject, context),
            }],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyResponse)?;

        parse_question(&content)
    }
}

fn build_prompt(subject: &str, context: &VideoContext) -> String {
    let context_json = serde_json::to_string(context).unwrap_or_else(|_| "{}".into());
    format!(
        "Write one quiz question testing knowledge of {subject}.\n\
         If the video described below relates to {subject}, base the question on it; \
         otherwise write a general {subject} question.\n\
         Video: {context_json}\n\n\
         Respond with a single JSON object and nothing else, in this exact shape:\n\
         {{\"question\": \"...\", \"type\": \"multiple_choice\" or \"true_false\", \
         \"options\": [\"...\"], \"correctAnswer\": 0, \
         \"explanations\": {{\"correct\": \"...\", \"incorrect\": [\"...\"]}}}}\n\
         Use exactly [\"True\", \"False\"] as the options for true_false. List the \
         incorrect explanations in option order, skipping the correct option."
    )
}

fn parse_question(raw: &str) -> Result<QuizQuestion, GenerationError> {
    let json = extract_json_object(raw)
        .ok_or_else(|| GenerationError::MalformedResponse("no JSON object found".into()))?;
    let wire: QuestionWire = serde_json::from_str(json)
        .map_err(|err| GenerationError::MalformedResponse(err.to_string()))?;

    let draft = QuestionDraft {
        prompt: wire.question,
        kind: wire.kind,
        options: wire.options,
        correct_index: wire.correct_answer,
        explanations: AnswerExplanations {
            correct: wire.explanations.correct,
            incorrect: wire.explanations.incorrect,
        },
    };
    Ok(draft.validate()?)
}

/// Models wrap the JSON in prose or code fences often enough that we
/// cut from the first `{` to the last `}` before parsing.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    raw.get(start..=end)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    question: String,
    #[serde(rename = "type")]
    kind: QuestionKind,
    options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    correct_answer: usize,
    #[serde(default)]
    explanations: ExplanationsWire,
}

#[derive(Debug, Default, Deserialize)]
struct ExplanationsWire {
    #[serde(default)]
    correct: String,
    #[serde(default)]
    incorrect: Vec<String>,
}

/// Canned questions used when generation is disabled or fails.
///
/// Subjects are matched by keyword; anything unrecognized draws from
/// the general set, so the bank always has something to show.
pub struct QuestionBank {
    tagged: Vec<(&'static str, Vec<QuizQuestion>)>,
    general: Vec<QuizQuestion>,
}

impl QuestionBank {
    #[must_use]
    pub fn new() -> Self {
        let math = [
            mc("What is 12 times 8?", &["88", "96", "104", "112"], 1),
            mc(
                "What is the square root of 144?",
                &["10", "11", "12", "14"],
                2,
            ),
            tf(
                "A prime number has exactly two distinct divisors.",
                true,
                "One and the number itself.",
            ),
            tf("The sum of the angles of a triangle is 360 degrees.", false, "It is 180 degrees."),
        ];
        let biology = [
            mc(
                "Which organelle produces most of a cell's ATP?",
                &["Nucleus", "Mitochondrion", "Ribosome", "Golgi apparatus"],
                1,
            ),
            mc(
                "What molecule carries genetic information?",
                &["RNA", "ATP", "DNA", "Glucose"],
                2,
            ),
            tf(
                "Photosynthesis takes place in the chloroplast.",
                true,
                "Chloroplasts hold the chlorophyll that captures light.",
            ),
        ];
        let history = [
            mc(
                "In which year did the Second World War end?",
                &["1943", "1944", "1945", "1946"],
                2,
            ),
            mc(
                "Which empire built the Colosseum?",
                &["Greek", "Roman", "Ottoman", "Byzantine"],
                1,
            ),
            tf(
                "The Great Wall of China was built in a single dynasty.",
                false,
                "Construction spanned many dynasties over centuries.",
            ),
        ];
        let general = [
            mc(
                "Which planet is closest to the sun?",
                &["Venus", "Earth", "Mercury", "Mars"],
                2,
            ),
            mc(
                "What is the chemical symbol for gold?",
                &["Go", "Gd", "Au", "Ag"],
                2,
            ),
            tf(
                "Sound travels faster in water than in air.",
                true,
                "Denser media carry sound faster.",
            ),
            tf(
                "Lightning never strikes the same place twice.",
                false,
                "Tall structures are struck repeatedly.",
            ),
        ];

        Self {
            tagged: vec![
                ("math", math.into_iter().flatten().collect()),
                ("biology", biology.into_iter().flatten().collect()),
                ("history", history.into_iter().flatten().collect()),
            ],
            general: general.into_iter().flatten().collect(),
        }
    }

    /// Picks a random question for the subject, preferring a matching
    /// tagged set over the general one.
    #[must_use]
    pub fn question_for(&self, subject: &str) -> Option<QuizQuestion> {
        let needle = subject.to_lowercase();
        let set = self
            .tagged
            .iter()
            .find(|(tag, questions)| needle.contains(tag) && !questions.is_empty())
            .map(|(_, questions)| questions)
            .unwrap_or(&self.general);
        pick(set)
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuizGenerator for QuestionBank {
    async fn generate(
        &self,
        subject: &str,
        _context: &VideoContext,
    ) -> Result<QuizQuestion, GenerationError> {
        self.question_for(subject)
            .ok_or(GenerationError::EmptyResponse)
    }
}

fn pick(questions: &[QuizQuestion]) -> Option<QuizQuestion> {
    if questions.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..questions.len());
    questions.get(index).cloned()
}

fn tf(prompt: &str, answer_is_true: bool, explanation: &str) -> Option<QuizQuestion> {
    QuizQuestion::true_false(prompt, answer_is_true, explanation).ok()
}

fn mc(prompt: &str, options: &[&str], correct_index: usize) -> Option<QuizQuestion> {
    QuestionDraft {
        prompt: prompt.to_string(),
        kind: QuestionKind::MultipleChoice,
        options: options.iter().map(|opt| (*opt).to_string()).collect(),
        correct_index,
        explanations: AnswerExplanations::default(),
    }
    .validate()
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_wire_question_wrapped_in_prose() {
        let raw = concat!(
            "Here is your question:\n```json\n",
            "{\"question\": \"What is 2 + 2?\", \"type\": \"multiple_choice\", ",
            "\"options\": [\"3\", \"4\", \"5\"], \"correctAnswer\": 1, ",
            "\"explanations\": {\"correct\": \"Basic addition.\", ",
            "\"incorrect\": [\"Too low.\", \"Too high.\"]}}",
            "\n```\nGood luck!",
        );
        let question = parse_question(raw).unwrap();
        assert_eq!(question.prompt(), "What is 2 + 2?");
        assert!(question.is_correct(1));
        assert_eq!(question.explanation_for(2), Some("Too high."));
    }

    #[test]
    fn parses_a_wire_question_without_explanations() {
        let raw = "{\"question\": \"Water boils at 100C at sea level.\", \
                   \"type\": \"true_false\", \"options\": [\"True\", \"False\"], \
                   \"correctAnswer\": 0}";
        let question = parse_question(raw).unwrap();
        assert_eq!(question.kind(), QuestionKind::TrueFalse);
        assert_eq!(question.explanation_for(0), None);
    }

    #[test]
    fn reports_missing_json_object() {
        let err = parse_question("I could not come up with anything.").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn reports_unparseable_json() {
        let err = parse_question("{\"question\": }").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn reports_invalid_question_data() {
        let raw = "{\"question\": \"Pick one.\", \"type\": \"multiple_choice\", \
                   \"options\": [\"a\", \"b\"], \"correctAnswer\": 5}";
        let err = parse_question(raw).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidQuestion(_)));
    }

    #[test]
    fn bank_always_has_a_question() {
        let bank = QuestionBank::new();
        for subject in ["Mathematics", "biology", "World History", "knitting"] {
            assert!(bank.question_for(subject).is_some(), "no question for {subject}");
        }
    }

    #[test]
    fn bank_matches_subject_keywords() {
        let bank = QuestionBank::new();
        let math_prompts: Vec<String> = bank.tagged[0]
            .1
            .iter()
            .map(|q| q.prompt().to_string())
            .collect();
        for _ in 0..16 {
            let question = bank.question_for("Advanced Mathematics").unwrap();
            assert!(math_prompts.contains(&question.prompt().to_string()));
        }
    }

    #[tokio::test]
    async fn disabled_generator_reports_disabled() {
        let generator = OpenAiGenerator::new(None);
        let err = generator
            .generate("math", &VideoContext::from_parts(None, String::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
    }
}
