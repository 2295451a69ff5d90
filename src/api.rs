use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    errors::{classify_service_error, ApiError, ErrorContext},
    extraction::{ExtractionReport, ExtractionService},
    models::*,
    practice::{AnswerResult, PracticeService, QuizSession, SessionProgress},
    vocab_store::{SongDeletion, VocabularyStore},
};

// Import logging macros
use crate::{api_error, log_api_error, log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub store: VocabularyStore,
    pub extraction: ExtractionService,
    pub practice: PracticeService,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Deserialize)]
pub struct WordQuery {
    pub q: Option<String>,
    pub mastered: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResponse {
    pub translation: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedResponse {
    pub cleared: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub practice: PracticeStats,
    pub total_words: usize,
    pub mastered_words: usize,
    pub songs: usize,
    pub wrong_answers: usize,
}

// Settings endpoints
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<UserSettings> {
    log_api_start!("get_settings");
    Ok(Json(ApiResponse::success(state.store.settings().await)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<UserSettings>,
) -> ApiResult<UserSettings> {
    log_api_start!("update_settings");

    match state.store.save_settings(settings).await {
        Ok(saved) => {
            log_api_success!(
                "update_settings",
                format!("provider={:?}, style={:?}", saved.api_provider, saved.translation_style)
            );
            Ok(Json(ApiResponse::success(saved)))
        }
        Err(e) => Err(api_error!(service, "update_settings", "settings", e)),
    }
}

// Song endpoints
pub async fn extract_song(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> ApiResult<ExtractionReport> {
    info!(
        title = %request.title,
        lyrics_length = request.lyrics.len(),
        "Extracting vocabulary from song"
    );

    let settings = state.store.settings().await;
    match state.extraction.extract(&request.title, &request.lyrics, &settings).await {
        Ok(report) => {
            log_api_success!(
                "extract_song",
                song_id = report.song.id,
                format!("{} new words in {} rounds", report.words_added.len(), report.rounds)
            );
            Ok(Json(ApiResponse::success(report)))
        }
        Err(e) => {
            log_api_error!("extract_song", error = e, "extraction failed");
            Err(api_error!(service, "extract_song", "song", e))
        }
    }
}

pub async fn list_songs(State(state): State<AppState>) -> ApiResult<Vec<Song>> {
    let mut songs = state.store.songs().await;
    songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    log_api_success!("list_songs", count = songs.len(), "songs listed");
    Ok(Json(ApiResponse::success(songs)))
}

pub async fn delete_song(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SongDeletion> {
    log_api_start!("delete_song", song_id = id);

    match state.store.delete_song(id).await {
        Ok(deletion) => {
            log_api_success!(
                "delete_song",
                song_id = id,
                format!(
                    "{} sources and {} orphaned words removed",
                    deletion.sources_removed,
                    deletion.words_removed.len()
                )
            );
            Ok(Json(ApiResponse::success(deletion)))
        }
        Err(e) => {
            let context = ErrorContext::new("delete_song", "song").with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

pub async fn translate_lyrics(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<TranslationResponse> {
    log_api_start!("translate_lyrics");

    let settings = state.store.settings().await;
    match state.extraction.translate_lyrics(&request.lyrics, &settings).await {
        Ok(outcome) => match outcome.error {
            None => {
                log_api_success!(
                    "translate_lyrics",
                    format!("{} characters", outcome.text.chars().count())
                );
                Ok(Json(ApiResponse::success(TranslationResponse {
                    translation: outcome.text,
                })))
            }
            Some(message) => {
                Err(ApiError::AiServiceError(message)
                    .to_response_with_context(ErrorContext::new("translate_lyrics", "translation")))
            }
        },
        Err(e) => Err(api_error!(service, "translate_lyrics", "translation", e)),
    }
}

// Word endpoints
pub async fn list_words(
    State(state): State<AppState>,
    Query(params): Query<WordQuery>,
) -> ApiResult<Vec<Word>> {
    let needle = params.q.as_deref().map(str::trim).unwrap_or_default().to_lowercase();

    let words: Vec<Word> = state
        .store
        .words()
        .await
        .into_iter()
        .filter(|w| params.mastered.is_none_or(|mastered| w.mastered == mastered))
        .filter(|w| {
            needle.is_empty() || w.normalized().contains(&needle) || w.meaning.contains(&needle)
        })
        .collect();

    debug!(query = %needle, mastered = ?params.mastered, "Listing words");
    log_api_success!("list_words", count = words.len(), "words listed");
    Ok(Json(ApiResponse::success(words)))
}

pub async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<WordDetail> {
    log_api_start!("get_word", word_id = id);

    match state.store.word_detail(id).await {
        Some(detail) => Ok(Json(ApiResponse::success(detail))),
        None => {
            log_api_warn!("get_word", word_id = id, "word not found");
            Err(api_error!(not_found, "get_word", "word", id))
        }
    }
}

pub async fn toggle_mastered(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Word> {
    log_api_start!("toggle_mastered", word_id = id);

    match state.store.toggle_mastered(id).await {
        Ok(word) => {
            log_api_success!(
                "toggle_mastered",
                word_id = id,
                format!("mastered={}", word.mastered)
            );
            Ok(Json(ApiResponse::success(word)))
        }
        Err(e) => {
            let context = ErrorContext::new("toggle_mastered", "word").with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

pub async fn delete_word(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Word> {
    log_api_start!("delete_word", word_id = id);

    match state.store.delete_word(id).await {
        Ok(word) => {
            log_api_success!("delete_word", word_id = id, "word and its sources deleted");
            Ok(Json(ApiResponse::success(word)))
        }
        Err(e) => {
            let context = ErrorContext::new("delete_word", "word").with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

// Blacklist endpoints
pub async fn list_blacklist(State(state): State<AppState>) -> ApiResult<Vec<BlacklistItem>> {
    let items = state.store.blacklist().await;
    log_api_success!("list_blacklist", count = items.len(), "blacklist listed");
    Ok(Json(ApiResponse::success(items)))
}

pub async fn add_blacklist_word(
    State(state): State<AppState>,
    Json(request): Json<BlacklistRequest>,
) -> ApiResult<BlacklistItem> {
    log_api_start!("add_blacklist_word");

    match state.store.add_blacklist_word(&request.word).await {
        Ok(item) => {
            log_api_success!("add_blacklist_word", format!("'{}' blacklisted", item.word));
            Ok(Json(ApiResponse::success(item)))
        }
        Err(e) => Err(api_error!(service, "add_blacklist_word", "blacklist item", e)),
    }
}

pub async fn remove_blacklist_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BlacklistItem> {
    match state.store.remove_blacklist_item(id).await {
        Ok(item) => {
            log_api_success!("remove_blacklist_item", format!("'{}' removed", item.word));
            Ok(Json(ApiResponse::success(item)))
        }
        Err(e) => {
            let context = ErrorContext::new("remove_blacklist_item", "blacklist item")
                .with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

// Wrong-answer log and stats
pub async fn list_wrong_answers(State(state): State<AppState>) -> ApiResult<Vec<WrongAnswer>> {
    let mut entries = state.store.wrong_answers().await;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    log_api_success!("list_wrong_answers", count = entries.len(), "wrong answers listed");
    Ok(Json(ApiResponse::success(entries)))
}

pub async fn clear_wrong_answers(State(state): State<AppState>) -> ApiResult<ClearedResponse> {
    match state.store.clear_wrong_answers().await {
        Ok(cleared) => {
            log_api_success!("clear_wrong_answers", count = cleared, "wrong answers cleared");
            Ok(Json(ApiResponse::success(ClearedResponse { cleared })))
        }
        Err(e) => Err(api_error!(service, "clear_wrong_answers", "wrong answer", e)),
    }
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let snapshot = state.store.snapshot().await;

    Ok(Json(ApiResponse::success(StatsResponse {
        total_words: snapshot.words.len(),
        mastered_words: snapshot.words.iter().filter(|w| w.mastered).count(),
        songs: snapshot.songs.len(),
        wrong_answers: snapshot.wrong_answers.len(),
        practice: snapshot.stats,
    })))
}

// Practice session endpoints
pub async fn start_practice_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<QuizSession> {
    info!(
        quiz_type = request.quiz_type.as_str(),
        count = ?request.count,
        "Starting practice session"
    );

    let settings = state.store.settings().await;
    match state.practice.start_session(request.quiz_type, request.count, &settings).await {
        Ok(session) => {
            log_api_success!(
                "start_practice_session",
                session_id = session.id,
                format!("{} questions", session.questions.len())
            );
            Ok(Json(ApiResponse::success(session)))
        }
        Err(e) => Err(api_error!(service, "start_practice_session", "practice session", e)),
    }
}

pub async fn get_practice_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<QuizSession> {
    log_api_start!("get_practice_session", session_id = id);

    match state.practice.session(id) {
        Some(session) => Ok(Json(ApiResponse::success(session))),
        None => Err(api_error!(not_found, "get_practice_session", "practice session", id)),
    }
}

pub async fn submit_practice_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitAnswerRequest>,
) -> ApiResult<AnswerResult> {
    log_api_start!("submit_practice_answer", session_id = id);

    let settings = state.store.settings().await;
    match state.practice.submit_answer(id, &request.answer, &settings).await {
        Ok(result) => {
            log_api_success!(
                "submit_practice_answer",
                session_id = id,
                format!("score={}, correct={}", result.score, result.is_correct)
            );
            Ok(Json(ApiResponse::success(result)))
        }
        Err(e) => {
            log_api_error!(
                "submit_practice_answer",
                session_id = id,
                error = e,
                "answer not evaluated"
            );
            let context = ErrorContext::new("submit_practice_answer", "practice session")
                .with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

pub async fn next_practice_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionProgress> {
    log_api_start!("next_practice_question", session_id = id);

    match state.practice.advance(id).await {
        Ok(progress) => Ok(Json(ApiResponse::success(progress))),
        Err(e) => {
            let context = ErrorContext::new("next_practice_question", "practice session")
                .with_id(&id.to_string());
            Err(classify_service_error(&e).to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Settings
        .route("/api/settings", get(get_settings).put(update_settings))
        // Songs
        .route("/api/songs/extract", post(extract_song))
        .route("/api/songs", get(list_songs))
        .route("/api/songs/:id", delete(delete_song))
        .route("/api/translate", post(translate_lyrics))
        // Words
        .route("/api/words", get(list_words))
        .route("/api/words/:id", get(get_word).delete(delete_word))
        .route("/api/words/:id/mastered", post(toggle_mastered))
        // Blacklist
        .route("/api/blacklist", get(list_blacklist).post(add_blacklist_word))
        .route("/api/blacklist/:id", delete(remove_blacklist_item))
        // Wrong answers and stats
        .route("/api/wrong-answers", get(list_wrong_answers).delete(clear_wrong_answers))
        .route("/api/stats", get(get_stats))
        // Practice sessions
        .route("/api/practice/sessions", post(start_practice_session))
        .route("/api/practice/sessions/:id", get(get_practice_session))
        .route("/api/practice/sessions/:id/answer", post(submit_practice_answer))
        .route("/api/practice/sessions/:id/next", post(next_practice_question))
        .with_state(state)
}
