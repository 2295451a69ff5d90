mod common;

use common::{seeded_store, settings, ScriptedFactory};
use lyric_vocab::{
    classify_service_error, config::PracticeConfig, interpreter::GENERIC_EVALUATION_FEEDBACK,
    practice::QuestionState, ApiError, PracticeService, QuizType, VocabularyStore,
};
use std::time::Duration;
use uuid::Uuid;

const SENTENCE_REPLY: &str =
    r#"{"sentence": "The serene lake calmed everyone.", "translation": "宁静的湖让每个人都平静下来。"}"#;

fn service(factory: &ScriptedFactory, store: &VocabularyStore) -> PracticeService {
    PracticeService::new(common::gateway(factory), store.clone(), PracticeConfig::default())
}

async fn fill_session(
    factory: &ScriptedFactory,
    store: &VocabularyStore,
) -> (PracticeService, Uuid) {
    factory.reply(SENTENCE_REPLY);
    let practice = service(factory, store);
    let session = practice.start_session(QuizType::Fill, Some(1), &settings()).await.unwrap();
    assert_eq!(session.questions[0].prompt, "The ____ lake calmed everyone.");
    assert_eq!(session.questions[0].hint.as_deref(), Some("宁静的湖让每个人都平静下来。"));
    (practice, session.id)
}

#[tokio::test]
async fn test_fill_answer_scored_85_passes() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"Here you go: {"isCorrect": true, "score": 85, "feedback": "拼写正确"}"#);
    let result = practice.submit_answer(session_id, "serene", &settings()).await.unwrap();

    assert!(result.is_correct);
    assert_eq!(result.score, 85);
    assert_eq!(result.feedback, "拼写正确");

    let session = practice.session(session_id).unwrap();
    assert_eq!(session.score, 1);
    assert_eq!(session.questions[0].state, QuestionState::Evaluated);
    assert!(store.wrong_answers().await.is_empty());
    assert_eq!(store.stats().await.total_correct, 1);
}

#[tokio::test]
async fn test_fill_answer_scored_40_is_logged() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"{"isCorrect": false, "score": 40, "feedback": "意思不对"}"#);
    let result = practice.submit_answer(session_id, "calm", &settings()).await.unwrap();

    assert!(!result.is_correct);
    assert_eq!(practice.session(session_id).unwrap().score, 0);

    let wrong = store.wrong_answers().await;
    assert_eq!(wrong.len(), 1);
    assert_eq!(wrong[0].score, 40);
    assert_eq!(wrong[0].user_answer, "calm");
    assert_eq!(wrong[0].correct_answer, "serene");
    assert_eq!(wrong[0].quiz_type, QuizType::Fill);
    assert_eq!(wrong[0].prompt, "The ____ lake calmed everyone.");
    assert_eq!(store.stats().await.total_answered, 1);
}

#[tokio::test]
async fn test_score_outweighs_model_claim() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"{"isCorrect": true, "score": 50, "feedback": "差不多"}"#);
    let result = practice.submit_answer(session_id, "serine", &settings()).await.unwrap();

    assert!(!result.is_correct);
    assert_eq!(store.wrong_answers().await.len(), 1);
}

#[tokio::test]
async fn test_translation_template_verdict() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    factory.reply(r#"{"sentence": "湖面很平静。"}"#);
    let practice = service(&factory, &store);

    let session = practice
        .start_session(QuizType::Translate, None, &settings())
        .await
        .unwrap();
    assert_eq!(session.questions[0].prompt, "湖面很平静。");
    assert_eq!(session.questions[0].hint.as_deref(), Some("serene"));

    factory.reply("Score: 72/100\nCorrect: \"the answer\"\nReason: 语法正确");
    let result = practice
        .submit_answer(session.id, "The lake is serene.", &settings())
        .await
        .unwrap();

    assert!(result.is_correct);
    assert_eq!(result.score, 72);
    assert_eq!(result.correct_answer, "the answer");
    assert_eq!(result.feedback, "语法正确");

    let evaluation_prompt = &factory.calls()[1].prompt;
    assert!(evaluation_prompt.contains("Chinese sentence: 湖面很平静。"));
}

#[tokio::test]
async fn test_double_submission_is_rejected() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"{"isCorrect": true, "score": 90, "feedback": "好"}"#);
    practice.submit_answer(session_id, "serene", &settings()).await.unwrap();

    let error = practice
        .submit_answer(session_id, "serene", &settings())
        .await
        .unwrap_err();
    assert!(matches!(classify_service_error(&error), ApiError::InvalidState(_)));

    // The rejected submission reached neither the model nor the stats.
    assert_eq!(factory.call_count(), 2);
    assert_eq!(practice.session(session_id).unwrap().score, 1);
    assert_eq!(store.stats().await.total_answered, 1);
}

#[tokio::test]
async fn test_transport_error_returns_question_to_unanswered() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.fail("HTTP 500: internal error");
    let error = practice
        .submit_answer(session_id, "serene", &settings())
        .await
        .unwrap_err();
    assert!(matches!(classify_service_error(&error), ApiError::AiServiceError(_)));

    let session = practice.session(session_id).unwrap();
    assert_eq!(session.questions[0].state, QuestionState::Unanswered);
    assert_eq!(store.stats().await.total_answered, 0);

    factory.reply(r#"{"isCorrect": true, "score": 95, "feedback": "好"}"#);
    assert!(practice.submit_answer(session_id, "serene", &settings()).await.is_ok());
}

#[tokio::test]
async fn test_malformed_evaluation_counts_as_miss() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"{"isCorrect": true, "score": 90, oops }"#);
    let result = practice.submit_answer(session_id, "serene", &settings()).await.unwrap();

    assert_eq!(result.score, 0);
    assert!(!result.is_correct);
    assert_eq!(result.feedback, GENERIC_EVALUATION_FEEDBACK);
    assert_eq!(store.wrong_answers().await.len(), 1);
}

#[tokio::test]
async fn test_generation_failure_falls_back_to_stored_example() {
    let factory = ScriptedFactory::new();
    factory.fail("rate limited");
    let store = seeded_store(&["serene"]).await;
    let practice = service(&factory, &store);

    let session = practice.start_session(QuizType::Fill, Some(1), &settings()).await.unwrap();

    assert_eq!(session.questions[0].prompt, "This example uses ____ once.");
    assert_eq!(session.questions[0].hint.as_deref(), Some("这个例句用了它一次。"));
}

#[tokio::test]
async fn test_choice_session_runs_locally_to_completion() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene", "ardent", "lucid"]).await;
    let practice = service(&factory, &store);

    let session = practice.start_session(QuizType::Choice, Some(5), &settings()).await.unwrap();
    assert_eq!(session.questions.len(), 3);

    let mut last = None;
    for (index, question) in session.questions.iter().enumerate() {
        assert_eq!(question.options.len(), 3);
        let answer = if index == 0 {
            "wrong".to_string()
        } else {
            question.expected_answer.clone()
        };
        practice.submit_answer(session.id, &answer, &settings()).await.unwrap();
        last = Some(practice.advance(session.id).await.unwrap());
    }

    let summary = last.unwrap().summary;
    assert!(summary.finished);
    assert_eq!(summary.score, 2);
    assert_eq!(summary.total, 3);

    // Finished sessions are released; the last advance carried the summary.
    assert!(practice.session(session.id).is_none());
    assert_eq!(factory.call_count(), 0);

    let stats = store.stats().await;
    assert_eq!(stats.sessions_completed, 1);
    assert_eq!(stats.total_answered, 3);
    assert_eq!(store.wrong_answers().await.len(), 1);
}

#[tokio::test]
async fn test_mastered_words_are_skipped_while_others_remain() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene", "ardent"]).await;
    let mastered = store.words().await[0].id;
    store.toggle_mastered(mastered).await.unwrap();
    let practice = service(&factory, &store);

    let session = practice.start_session(QuizType::Choice, None, &settings()).await.unwrap();

    assert_eq!(session.questions.len(), 1);
    assert_ne!(session.questions[0].word_id, mastered);
}

#[tokio::test]
async fn test_session_preconditions() {
    let factory = ScriptedFactory::new();
    let empty = common::test_store().await;
    let practice = service(&factory, &empty);
    let error = practice.start_session(QuizType::Fill, None, &settings()).await.unwrap_err();
    assert!(matches!(classify_service_error(&error), ApiError::ValidationError(_)));

    let single = seeded_store(&["serene"]).await;
    let practice = service(&factory, &single);
    assert!(practice.start_session(QuizType::Choice, None, &settings()).await.is_err());
    assert!(practice.start_session(QuizType::Fill, Some(0), &settings()).await.is_err());

    let error = practice.advance(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(classify_service_error(&error), ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_cannot_advance_an_unanswered_question() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    let error = practice.advance(session_id).await.unwrap_err();
    assert!(matches!(classify_service_error(&error), ApiError::InvalidState(_)));
}

#[tokio::test]
async fn test_translation_without_reference_leaves_correct_answer_empty() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    factory.reply(r#"{"sentence": "湖面很平静。"}"#);
    let practice = service(&factory, &store);
    let session = practice.start_session(QuizType::Translate, None, &settings()).await.unwrap();

    factory.reply("Score: 40/100\nReason: 用词不当");
    let result = practice
        .submit_answer(session.id, "The lake is quiet.", &settings())
        .await
        .unwrap();

    assert!(!result.is_correct);
    assert_eq!(result.correct_answer, "");
    assert_eq!(result.feedback, "用词不当");

    let wrong = store.wrong_answers().await;
    assert_eq!(wrong.len(), 1);
    assert_eq!(wrong[0].correct_answer, "");
}

#[tokio::test]
async fn test_translation_of_stored_example_falls_back_to_its_source() {
    let factory = ScriptedFactory::new();
    factory.fail("rate limited");
    let store = seeded_store(&["serene"]).await;
    let practice = service(&factory, &store);
    let session = practice.start_session(QuizType::Translate, None, &settings()).await.unwrap();
    assert_eq!(session.questions[0].prompt, "这个例句用了它一次。");

    factory.reply("Score: 30/100\nReason: 漏掉了目标词");
    let result = practice
        .submit_answer(session.id, "It was used once.", &settings())
        .await
        .unwrap();

    assert_eq!(result.correct_answer, "This example uses serene once.");
}

#[tokio::test]
async fn test_quoted_correctness_flag_keeps_the_score() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.reply(r#"{"isCorrect": "true", "score": 92, "feedback": "很好"}"#);
    let result = practice.submit_answer(session_id, "serene", &settings()).await.unwrap();

    assert!(result.is_correct);
    assert_eq!(result.score, 92);
    assert_eq!(result.feedback, "很好");
    assert!(store.wrong_answers().await.is_empty());
}

#[tokio::test]
async fn test_abandoned_evaluation_reopens_the_question() {
    let factory = ScriptedFactory::new();
    let store = seeded_store(&["serene"]).await;
    let (practice, session_id) = fill_session(&factory, &store).await;

    factory.hang();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        practice.submit_answer(session_id, "serene", &settings()),
    )
    .await;
    assert!(abandoned.is_err());

    let session = practice.session(session_id).unwrap();
    assert_eq!(session.questions[0].state, QuestionState::Unanswered);
    assert_eq!(store.stats().await.total_answered, 0);

    factory.reply(r#"{"isCorrect": true, "score": 88, "feedback": "好"}"#);
    let result = practice.submit_answer(session_id, "serene", &settings()).await.unwrap();
    assert_eq!(result.score, 88);

    let progress = practice.advance(session_id).await.unwrap();
    assert!(progress.summary.finished);
    assert_eq!(progress.summary.score, 1);
}
