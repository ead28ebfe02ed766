use dl_core::{Flashcard, QuestionType, QuizQuestion};

pub fn format_quiz_questions(questions: &[QuizQuestion]) -> String {
    let mut lines = Vec::new();

    for (i, q) in questions.iter().enumerate() {
        lines.push(format!("**Question {}:** {}", i + 1, q.question));
        if q.question_type == QuestionType::MultipleChoice {
            lines.extend(q.options.iter().map(|option| format!("  {}", option)));
        }
        lines.push(format!("**Answer:** {}", q.correct_answer));
        lines.push(format!("**Explanation:** {}", q.explanation));
        lines.push(format!("**Difficulty:** {}", q.difficulty));
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn format_flashcards(cards: &[Flashcard]) -> String {
    let mut lines = Vec::new();

    for (i, card) in cards.iter().enumerate() {
        lines.push(format!("**Card {}:**", i + 1));
        lines.push(format!("Q: {}", card.question));
        lines.push(format!("A: {}", card.answer));
        if let Some(hint) = &card.hint {
            lines.push(format!("Hint: {}", hint));
        }
        lines.push(format!("Difficulty: {}", card.difficulty));
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn format_bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_answers(quiz: &str, flashcards: &str) -> String {
    format!("Quiz Answers:\n{}\n\nFlashcard Answers:\n{}", quiz, flashcards)
}
