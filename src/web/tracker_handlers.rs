// src/web/tracker_handlers.rs
use crate::{
    error::AppResult,
    models::tracker::{
        PortfolioEntry, PortfolioEntryPayload, Program, ProgramPayload, ProgramSession, ProgramSessionPayload,
        Student, StudentPayload,
    },
    services::tracker_service,
    state::AppState,
    web::mw_auth::InstructorId,
};
use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

// --- Programas ---

// GET /api/tracker/programs
pub async fn list_programs(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
) -> AppResult<Json<Vec<Program>>> {
    Ok(Json(tracker_service::list_programs(&state.db_pool, &instructor_id).await?))
}

// POST /api/tracker/programs
pub async fn create_program(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Json(payload): Json<ProgramPayload>,
) -> AppResult<impl IntoResponse> {
    let program = tracker_service::create_program(&state.db_pool, &instructor_id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

// GET /api/tracker/programs/{id}
pub async fn get_program(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
) -> AppResult<Json<Program>> {
    Ok(Json(tracker_service::get_program(&state.db_pool, &instructor_id, &program_id).await?))
}

// PUT /api/tracker/programs/{id}
pub async fn update_program(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
    Json(payload): Json<ProgramPayload>,
) -> AppResult<Json<Program>> {
    let program = tracker_service::update_program(&state.db_pool, &instructor_id, &program_id, payload).await?;
    Ok(Json(program))
}

// DELETE /api/tracker/programs/{id}
pub async fn delete_program(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
) -> AppResult<StatusCode> {
    tracker_service::delete_program(&state.db_pool, &instructor_id, &program_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Sessões (aulas) ---

// GET /api/tracker/programs/{id}/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
) -> AppResult<Json<Vec<ProgramSession>>> {
    Ok(Json(tracker_service::list_sessions(&state.db_pool, &instructor_id, &program_id).await?))
}

// POST /api/tracker/programs/{id}/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
    Json(payload): Json<ProgramSessionPayload>,
) -> AppResult<impl IntoResponse> {
    let session =
        tracker_service::create_session(&state.db_pool, &instructor_id, &program_id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

// PUT /api/tracker/sessions/{id}
pub async fn update_session(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(session_id): Path<String>,
    Json(payload): Json<ProgramSessionPayload>,
) -> AppResult<Json<ProgramSession>> {
    let session = tracker_service::update_session(&state.db_pool, &instructor_id, &session_id, payload).await?;
    Ok(Json(session))
}

// DELETE /api/tracker/sessions/{id}
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(session_id): Path<String>,
) -> AppResult<StatusCode> {
    tracker_service::delete_session(&state.db_pool, &instructor_id, &session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Alunos ---

// GET /api/tracker/programs/{id}/students
pub async fn list_program_students(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
) -> AppResult<Json<Vec<Student>>> {
    Ok(Json(
        tracker_service::list_program_students(&state.db_pool, &instructor_id, &program_id).await?,
    ))
}

// POST /api/tracker/programs/{id}/students
pub async fn create_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(program_id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> AppResult<impl IntoResponse> {
    let student =
        tracker_service::create_student_in_program(&state.db_pool, &instructor_id, &program_id, payload, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

// POST /api/tracker/programs/{id}/students/{student_id}
pub async fn enroll_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path((program_id, student_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    tracker_service::enroll_student(&state.db_pool, &instructor_id, &program_id, &student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/tracker/programs/{id}/students/{student_id}
pub async fn unenroll_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path((program_id, student_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    tracker_service::unenroll_student(&state.db_pool, &instructor_id, &program_id, &student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/tracker/students/{id}
pub async fn get_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(student_id): Path<String>,
) -> AppResult<Json<Student>> {
    Ok(Json(tracker_service::get_student(&state.db_pool, &instructor_id, &student_id).await?))
}

// GET /api/tracker/students/by-slug/{slug}
pub async fn get_student_by_slug(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(slug): Path<String>,
) -> AppResult<Json<Student>> {
    Ok(Json(tracker_service::get_student_by_slug(&state.db_pool, &instructor_id, &slug).await?))
}

// PUT /api/tracker/students/{id}
pub async fn update_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(student_id): Path<String>,
    Json(payload): Json<StudentPayload>,
) -> AppResult<Json<Student>> {
    let student = tracker_service::update_student(&state.db_pool, &instructor_id, &student_id, payload).await?;
    Ok(Json(student))
}

// DELETE /api/tracker/students/{id}
pub async fn delete_student(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(student_id): Path<String>,
) -> AppResult<StatusCode> {
    tracker_service::delete_student(&state.db_pool, &instructor_id, &student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Entradas de portfólio ---

// GET /api/tracker/students/{id}/entries
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(student_id): Path<String>,
) -> AppResult<Json<Vec<PortfolioEntry>>> {
    Ok(Json(tracker_service::list_entries(&state.db_pool, &instructor_id, &student_id).await?))
}

// POST /api/tracker/students/{id}/entries
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(student_id): Path<String>,
    Json(payload): Json<PortfolioEntryPayload>,
) -> AppResult<impl IntoResponse> {
    let entry =
        tracker_service::create_entry(&state.db_pool, &instructor_id, &student_id, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// PUT /api/tracker/entries/{id}
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(entry_id): Path<String>,
    Json(payload): Json<PortfolioEntryPayload>,
) -> AppResult<Json<PortfolioEntry>> {
    let entry = tracker_service::update_entry(&state.db_pool, &instructor_id, &entry_id, payload).await?;
    Ok(Json(entry))
}

// DELETE /api/tracker/entries/{id}
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(InstructorId(instructor_id)): Extension<InstructorId>,
    Path(entry_id): Path<String>,
) -> AppResult<StatusCode> {
    tracker_service::delete_entry(&state.db_pool, &instructor_id, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
