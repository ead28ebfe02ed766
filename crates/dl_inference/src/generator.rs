use std::sync::Arc;
use std::time::Duration;

use dl_core::pacing::{self, Pacing};
use dl_core::{
    ChatModel, ChatRequest, Difficulty, Error, Flashcard, LearningMaterials, QuestionType,
    QuizQuestion, RateLimiter, Result, Summary,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::parse::{extract_json, string_list, text_of, truncate_chars};

const QUIZ_SYSTEM_PROMPT: &str = "You are an expert educator who creates effective quiz questions to test comprehension and retention.";
const FLASHCARD_SYSTEM_PROMPT: &str = "You are an expert in spaced repetition learning who creates effective flashcards for knowledge retention.";

/// Builds quiz questions and flashcards for summaries.
#[derive(Debug)]
pub struct MaterialGenerator {
    model: Arc<dyn ChatModel>,
    limiter: RateLimiter,
    pacing: Pacing,
}

impl MaterialGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            limiter: RateLimiter::new(Duration::from_secs(1)),
            pacing: Pacing::default(),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn quiz_prompt(summary: &Summary, num_questions: u32) -> String {
        format!(
            "Based on this summary about {topic}, create {n} quiz questions that test understanding of the key concepts.

Summary: {summary}
Key Points: {points}
Learning Objectives: {objectives}

Create a mix of question types:
- At least 1 multiple-choice question with 4 options
- At least 1 short-answer question

Each question should:
- Test understanding of core concepts
- Be clear and unambiguous
- Have appropriate difficulty level
- Include an explanation of the correct answer

Format as JSON:
{{
    \"questions\": [
        {{
            \"question\": \"Question text here\",
            \"type\": \"multiple_choice\",
            \"options\": [\"A) Option 1\", \"B) Option 2\", \"C) Option 3\", \"D) Option 4\"],
            \"correct_answer\": \"A) Option 1\",
            \"explanation\": \"Explanation of why this is correct\",
            \"difficulty\": \"medium\"
        }},
        {{
            \"question\": \"Question text here\",
            \"type\": \"short_answer\",
            \"options\": [],
            \"correct_answer\": \"Expected answer\",
            \"explanation\": \"What makes a good answer\",
            \"difficulty\": \"medium\"
        }}
    ]
}}",
            topic = summary.article.topic,
            n = num_questions,
            summary = summary.summary,
            points = summary.key_points.join(", "),
            objectives = summary.learning_objectives.join(", "),
        )
    }

    pub fn flashcard_prompt(summary: &Summary, num_flashcards: u32) -> String {
        format!(
            "Based on this summary about {topic}, create {n} flashcards for spaced repetition learning.

Summary: {summary}
Key Points: {points}

Each flashcard should:
- Have a clear, specific question
- Have a concise but complete answer
- Focus on key definitions, concepts, or actionable insights
- Be suitable for quick review
- Include a helpful hint if the concept is complex

Format as JSON:
{{
    \"flashcards\": [
        {{
            \"question\": \"What is...\",
            \"answer\": \"Concise answer here\",
            \"category\": \"{topic}\",
            \"difficulty\": \"easy|medium|hard\",
            \"hint\": \"Optional hint for complex concepts\"
        }}
    ]
}}",
            topic = summary.article.topic,
            n = num_flashcards,
            summary = summary.summary,
            points = summary.key_points.join(", "),
        )
    }

    /// Quiz questions for one summary; empty on any failure.
    pub async fn generate_quiz_questions(&self, summary: &Summary, num_questions: u32) -> Vec<QuizQuestion> {
        let request = ChatRequest::new(QUIZ_SYSTEM_PROMPT, Self::quiz_prompt(summary, num_questions))
            .with_max_tokens(800);

        match self.ask(&request).await.and_then(|reply| parse_questions(&reply)) {
            Ok(questions) => {
                info!(
                    count = questions.len(),
                    title = %truncate_chars(&summary.article.title, 50),
                    "generated quiz questions"
                );
                questions
            }
            Err(e) => {
                warn!(error = %e, title = %summary.article.title, "quiz generation failed");
                Vec::new()
            }
        }
    }

    /// Flashcards for one summary; empty on any failure.
    pub async fn generate_flashcards(&self, summary: &Summary, num_flashcards: u32) -> Vec<Flashcard> {
        let request = ChatRequest::new(FLASHCARD_SYSTEM_PROMPT, Self::flashcard_prompt(summary, num_flashcards))
            .with_max_tokens(600);

        match self
            .ask(&request)
            .await
            .and_then(|reply| parse_flashcards(&reply, &summary.article.topic))
        {
            Ok(cards) => {
                info!(
                    count = cards.len(),
                    title = %truncate_chars(&summary.article.title, 50),
                    "generated flashcards"
                );
                cards
            }
            Err(e) => {
                warn!(error = %e, title = %summary.article.title, "flashcard generation failed");
                Vec::new()
            }
        }
    }

    pub async fn generate(&self, summary: &Summary, num_questions: u32, num_flashcards: u32) -> LearningMaterials {
        info!(title = %truncate_chars(&summary.article.title, 50), "generating learning materials");

        let quiz_questions = self.generate_quiz_questions(summary, num_questions).await;
        pacing::pause(self.pacing.between_subcalls).await;
        let flashcards = self.generate_flashcards(summary, num_flashcards).await;

        LearningMaterials {
            summary: summary.clone(),
            quiz_questions,
            flashcards,
        }
    }

    pub async fn generate_batch(
        &self,
        summaries: &[Summary],
        num_questions: u32,
        num_flashcards: u32,
    ) -> Vec<LearningMaterials> {
        let mut materials = Vec::with_capacity(summaries.len());

        for (i, summary) in summaries.iter().enumerate() {
            info!(index = i + 1, total = summaries.len(), "processing summary");
            materials.push(self.generate(summary, num_questions, num_flashcards).await);
            if i + 1 < summaries.len() {
                pacing::pause(self.pacing.between_materials).await;
            }
        }

        info!(count = materials.len(), "generated learning materials");
        materials
    }

    /// Advisory score in `0.0..=1.0`.
    pub fn assess_question_quality(question: &QuizQuestion) -> f64 {
        let mut score = 0.0;

        if (10..=200).contains(&question.question.chars().count()) {
            score += 0.3;
        }
        if question.explanation.chars().count() > 10 {
            score += 0.3;
        }
        if question.question_type == QuestionType::MultipleChoice {
            if question.options.len() == 4 {
                score += 0.2;
            }
            if question.options.contains(&question.correct_answer) {
                score += 0.2;
            }
        }

        f64::min(score, 1.0)
    }

    /// Advisory score in `0.0..=1.0`.
    pub fn assess_flashcard_quality(card: &Flashcard) -> f64 {
        let mut score = 0.0;

        if (5..=100).contains(&card.question.chars().count()) {
            score += 0.4;
        }
        if (5..=200).contains(&card.answer.chars().count()) {
            score += 0.4;
        }
        if !card.category.trim().is_empty() {
            score += 0.2;
        }

        f64::min(score, 1.0)
    }

    async fn ask(&self, request: &ChatRequest) -> Result<String> {
        self.limiter.wait().await;
        self.model.complete(request).await
    }
}

fn list_items<'a>(value: &'a Value, key: &str) -> Result<Vec<&'a Map<String, Value>>> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::Inference(format!("{} response is not a JSON object", key)))?;
    Ok(object
        .get(key)
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default())
}

fn parse_reply(reply: &str, key: &str) -> Result<Value> {
    extract_json(reply).ok_or_else(|| Error::Inference(format!("{} response is not JSON", key)))
}

fn field(object: &Map<String, Value>, key: &str) -> String {
    text_of(object.get(key)).unwrap_or_default()
}

pub fn parse_questions(reply: &str) -> Result<Vec<QuizQuestion>> {
    let value = parse_reply(reply, "questions")?;
    let questions = list_items(&value, "questions")?
        .into_iter()
        .map(|q| {
            let question_type = q
                .get("type")
                .and_then(Value::as_str)
                .map(QuestionType::from_label)
                .unwrap_or(QuestionType::ShortAnswer);
            let options = match question_type {
                QuestionType::MultipleChoice => string_list(q.get("options")),
                QuestionType::ShortAnswer => Vec::new(),
            };
            QuizQuestion {
                question: field(q, "question"),
                question_type,
                options,
                correct_answer: field(q, "correct_answer"),
                explanation: field(q, "explanation"),
                difficulty: q
                    .get("difficulty")
                    .and_then(Value::as_str)
                    .map(Difficulty::from_label)
                    .unwrap_or_default(),
            }
        })
        .collect();
    Ok(questions)
}

pub fn parse_flashcards(reply: &str, default_category: &str) -> Result<Vec<Flashcard>> {
    let value = parse_reply(reply, "flashcards")?;
    let cards = list_items(&value, "flashcards")?
        .into_iter()
        .map(|f| {
            let category = field(f, "category");
            Flashcard {
                question: field(f, "question"),
                answer: field(f, "answer"),
                category: if category.trim().is_empty() {
                    default_category.to_string()
                } else {
                    category
                },
                difficulty: f
                    .get("difficulty")
                    .and_then(Value::as_str)
                    .map(Difficulty::from_label)
                    .unwrap_or_default(),
                hint: text_of(f.get("hint")).filter(|hint| !hint.trim().is_empty()),
            }
        })
        .collect();
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScriptedModel;
    use dl_core::Article;

    fn summary() -> Summary {
        Summary {
            article: Article {
                title: "Borrow checker deep dive".to_string(),
                url: "https://example.com/borrow".to_string(),
                content: "...".to_string(),
                source: "Example".to_string(),
                published_at: None,
                topic: "software development".to_string(),
            },
            summary: "Ownership rules.".to_string(),
            key_points: vec!["moves".to_string(), "borrows".to_string()],
            learning_objectives: vec!["explain lifetimes".to_string()],
        }
    }

    fn generator(model: ScriptedModel) -> (Arc<ScriptedModel>, MaterialGenerator) {
        let model = Arc::new(model);
        let generator = MaterialGenerator::new(model.clone())
            .with_rate_limiter(RateLimiter::unlimited())
            .with_pacing(Pacing::none());
        (model, generator)
    }

    const QUIZ: &str = r#"{"questions": [
        {"question": "What does a move do?", "type": "multiple_choice",
         "options": ["A) copy", "B) transfer", "C) clone", "D) drop"],
         "correct_answer": "B) transfer", "explanation": "Ownership is transferred.", "difficulty": "easy"},
        {"question": "Define a borrow.", "options": ["ignored"]}
    ]}"#;

    const CARDS: &str = r#"```json
{"flashcards": [
    {"question": "What is a lifetime?", "answer": "A scope for references", "difficulty": "hard", "hint": ""},
    {"question": "What is Drop?", "answer": "Destructor trait", "category": "rust", "hint": "think RAII"}
]}
```"#;

    #[tokio::test]
    async fn test_generate_parses_both_lists_with_defaults() {
        let (model, generator) = generator(ScriptedModel::new("llm").reply(QUIZ).reply(CARDS));

        let materials = generator.generate(&summary(), 2, 3).await;
        assert_eq!(materials.quiz_questions.len(), 2);
        assert_eq!(materials.flashcards.len(), 2);

        let mc = &materials.quiz_questions[0];
        assert_eq!(mc.question_type, QuestionType::MultipleChoice);
        assert_eq!(mc.options.len(), 4);
        assert_eq!(mc.difficulty, Difficulty::Easy);

        let short = &materials.quiz_questions[1];
        assert_eq!(short.question_type, QuestionType::ShortAnswer);
        assert!(short.options.is_empty());
        assert_eq!(short.difficulty, Difficulty::Medium);

        let first = &materials.flashcards[0];
        assert_eq!(first.category, "software development");
        assert_eq!(first.hint, None);
        assert_eq!(first.difficulty, Difficulty::Hard);
        assert_eq!(materials.flashcards[1].category, "rust");
        assert_eq!(materials.flashcards[1].hint.as_deref(), Some("think RAII"));

        let requests = model.requests();
        assert_eq!(requests[0].max_tokens, 800);
        assert_eq!(requests[1].max_tokens, 600);
        assert!(requests[0].prompt.contains("create 2 quiz questions"));
        assert!(requests[1].prompt.contains("create 3 flashcards"));
    }

    #[tokio::test]
    async fn test_failed_quiz_call_leaves_flashcards_intact() {
        let (_, generator) = generator(ScriptedModel::new("llm").fail("502").reply(CARDS));

        let materials = generator.generate(&summary(), 2, 3).await;
        assert!(materials.quiz_questions.is_empty());
        assert_eq!(materials.flashcards.len(), 2);
    }

    #[tokio::test]
    async fn test_unparsable_flashcards_degrade_to_empty() {
        let (_, generator) = generator(ScriptedModel::new("llm").reply(QUIZ).reply("I cannot help with that."));

        let materials = generator.generate(&summary(), 2, 3).await;
        assert_eq!(materials.quiz_questions.len(), 2);
        assert!(materials.flashcards.is_empty());
    }

    #[tokio::test]
    async fn test_batch_keeps_one_material_per_summary() {
        let (_, generator) = generator(
            ScriptedModel::new("llm")
                .reply(QUIZ)
                .reply(CARDS)
                .fail("down")
                .fail("down"),
        );

        let materials = generator.generate_batch(&[summary(), summary()], 2, 3).await;
        assert_eq!(materials.len(), 2);
        assert!(materials[1].quiz_questions.is_empty());
        assert!(materials[1].flashcards.is_empty());
    }

    #[test]
    fn test_question_quality() {
        let questions = parse_questions(QUIZ).unwrap();
        let mc = MaterialGenerator::assess_question_quality(&questions[0]);
        assert!((mc - 1.0).abs() < 1e-9);
        let short = MaterialGenerator::assess_question_quality(&questions[1]);
        assert!((short - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_answer_outside_options_is_kept_but_scored_lower() {
        let mut question = parse_questions(QUIZ).unwrap().remove(0);
        question.correct_answer = "E) none".to_string();
        let score = MaterialGenerator::assess_question_quality(&question);
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_flashcard_quality() {
        let cards = parse_flashcards(CARDS, "topic").unwrap();
        assert!((MaterialGenerator::assess_flashcard_quality(&cards[0]) - 1.0).abs() < 1e-9);

        let bare = Flashcard {
            question: "Why?".to_string(),
            answer: "".to_string(),
            category: "".to_string(),
            difficulty: Difficulty::Medium,
            hint: None,
        };
        assert_eq!(MaterialGenerator::assess_flashcard_quality(&bare), 0.0);
    }
}
