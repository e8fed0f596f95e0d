// src/services/tracker_service.rs
use crate::{
    error::{AppError, AppResult},
    models::tracker::{
        PortfolioEntry, PortfolioEntryPayload, Program, ProgramPayload, ProgramSession,
        ProgramSessionPayload, Student, StudentPayload,
    },
};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqlitePool};
use uuid::Uuid;

const PROGRAM_COLUMNS: &str = "id, instructor_id, title, description, start_date, end_date, created_at";
const STUDENT_COLUMNS: &str = "s.id, s.name, s.email, s.grade, s.slug, s.parent_id, s.created_at";
const ENTRY_COLUMNS: &str =
    "e.id, e.student_id, e.title, e.description, e.entry_date, e.entry_type, e.media_urls, e.created_at";

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::Validation(format!("{} is required.", field)))
    } else {
        Ok(value.to_string())
    }
}

/// "Ana Sofia!" -> "ana-sofia"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "student".to_string()
    } else {
        slug
    }
}

fn student_slug(name: &str) -> String {
    // Sufixo curto para evitar colisões entre alunos com o mesmo nome
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(name), &suffix[..6])
}

// --- Programas ---

pub async fn list_programs(db_pool: &SqlitePool, instructor_id: &str) -> AppResult<Vec<Program>> {
    let programs = sqlx::query_as::<_, Program>(&format!(
        "SELECT {} FROM programs WHERE instructor_id = ?1 ORDER BY created_at DESC",
        PROGRAM_COLUMNS
    ))
    .bind(instructor_id)
    .fetch_all(db_pool)
    .await?;
    Ok(programs)
}

pub async fn get_program(db_pool: &SqlitePool, instructor_id: &str, program_id: &str) -> AppResult<Program> {
    sqlx::query_as::<_, Program>(&format!(
        "SELECT {} FROM programs WHERE id = ?1 AND instructor_id = ?2",
        PROGRAM_COLUMNS
    ))
    .bind(program_id)
    .bind(instructor_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound)
}

fn validate_program(payload: &ProgramPayload) -> AppResult<String> {
    let title = required_text(&payload.title, "Title")?;
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if end < start {
            return Err(AppError::Validation("End date must be after the start date.".into()));
        }
    }
    Ok(title)
}

pub async fn create_program(
    db_pool: &SqlitePool,
    instructor_id: &str,
    payload: ProgramPayload,
    now: DateTime<Utc>,
) -> AppResult<Program> {
    let title = validate_program(&payload)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO programs (id, instructor_id, title, description, start_date, end_date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&id)
    .bind(instructor_id)
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(now)
    .execute(db_pool)
    .await?;

    tracing::info!("✅ Programa '{}' criado por {}.", title, instructor_id);
    get_program(db_pool, instructor_id, &id).await
}

pub async fn update_program(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
    payload: ProgramPayload,
) -> AppResult<Program> {
    let title = validate_program(&payload)?;
    let rows_affected = sqlx::query(
        r#"
        UPDATE programs
        SET title = ?1, description = ?2, start_date = ?3, end_date = ?4
        WHERE id = ?5 AND instructor_id = ?6
        "#,
    )
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(program_id)
    .bind(instructor_id)
    .execute(db_pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Falha ao atualizar programa '{}': não encontrado.", program_id);
        return Err(AppError::NotFound);
    }
    get_program(db_pool, instructor_id, program_id).await
}

pub async fn delete_program(db_pool: &SqlitePool, instructor_id: &str, program_id: &str) -> AppResult<()> {
    let rows_affected = sqlx::query("DELETE FROM programs WHERE id = ?1 AND instructor_id = ?2")
        .bind(program_id)
        .bind(instructor_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("🗑️ Programa '{}' apagado.", program_id);
    Ok(())
}

// --- Sessões de um programa ---

pub async fn list_sessions(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
) -> AppResult<Vec<ProgramSession>> {
    get_program(db_pool, instructor_id, program_id).await?;
    let sessions = sqlx::query_as::<_, ProgramSession>(
        r#"
        SELECT id, program_id, name, session_date, created_at
        FROM program_sessions
        WHERE program_id = ?1
        ORDER BY session_date ASC, created_at ASC
        "#,
    )
    .bind(program_id)
    .fetch_all(db_pool)
    .await?;
    Ok(sessions)
}

async fn get_owned_session(
    db_pool: &SqlitePool,
    instructor_id: &str,
    session_id: &str,
) -> AppResult<ProgramSession> {
    sqlx::query_as::<_, ProgramSession>(
        r#"
        SELECT s.id, s.program_id, s.name, s.session_date, s.created_at
        FROM program_sessions s
        JOIN programs p ON p.id = s.program_id
        WHERE s.id = ?1 AND p.instructor_id = ?2
        "#,
    )
    .bind(session_id)
    .bind(instructor_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound)
}

pub async fn create_session(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
    payload: ProgramSessionPayload,
    now: DateTime<Utc>,
) -> AppResult<ProgramSession> {
    get_program(db_pool, instructor_id, program_id).await?;
    let name = required_text(&payload.name, "Name")?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO program_sessions (id, program_id, name, session_date, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&id)
    .bind(program_id)
    .bind(&name)
    .bind(payload.session_date)
    .bind(now)
    .execute(db_pool)
    .await?;

    get_owned_session(db_pool, instructor_id, &id).await
}

pub async fn update_session(
    db_pool: &SqlitePool,
    instructor_id: &str,
    session_id: &str,
    payload: ProgramSessionPayload,
) -> AppResult<ProgramSession> {
    get_owned_session(db_pool, instructor_id, session_id).await?;
    let name = required_text(&payload.name, "Name")?;

    sqlx::query("UPDATE program_sessions SET name = ?1, session_date = ?2 WHERE id = ?3")
        .bind(&name)
        .bind(payload.session_date)
        .bind(session_id)
        .execute(db_pool)
        .await?;

    get_owned_session(db_pool, instructor_id, session_id).await
}

pub async fn delete_session(db_pool: &SqlitePool, instructor_id: &str, session_id: &str) -> AppResult<()> {
    get_owned_session(db_pool, instructor_id, session_id).await?;
    sqlx::query("DELETE FROM program_sessions WHERE id = ?1")
        .bind(session_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

// --- Alunos ---

pub async fn list_program_students(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
) -> AppResult<Vec<Student>> {
    get_program(db_pool, instructor_id, program_id).await?;
    let students = sqlx::query_as::<_, Student>(&format!(
        r#"
        SELECT {}
        FROM students s
        JOIN program_students ps ON ps.student_id = s.id
        WHERE ps.program_id = ?1
        ORDER BY s.name ASC
        "#,
        STUDENT_COLUMNS
    ))
    .bind(program_id)
    .fetch_all(db_pool)
    .await?;
    Ok(students)
}

/// Aluno visível para o instrutor: inscrito em pelo menos um dos seus programas.
pub async fn get_student(db_pool: &SqlitePool, instructor_id: &str, student_id: &str) -> AppResult<Student> {
    sqlx::query_as::<_, Student>(&format!(
        r#"
        SELECT {}
        FROM students s
        WHERE s.id = ?1
          AND EXISTS (
            SELECT 1 FROM program_students ps
            JOIN programs p ON p.id = ps.program_id
            WHERE ps.student_id = s.id AND p.instructor_id = ?2
          )
        "#,
        STUDENT_COLUMNS
    ))
    .bind(student_id)
    .bind(instructor_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound)
}

pub async fn get_student_by_slug(db_pool: &SqlitePool, instructor_id: &str, slug: &str) -> AppResult<Student> {
    let student_id: String = sqlx::query_scalar("SELECT id FROM students WHERE slug = ?1")
        .bind(slug)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    get_student(db_pool, instructor_id, &student_id).await
}

/// Cria o aluno e inscreve-o no programa, na mesma transação.
pub async fn create_student_in_program(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
    payload: StudentPayload,
    now: DateTime<Utc>,
) -> AppResult<Student> {
    get_program(db_pool, instructor_id, program_id).await?;
    let name = required_text(&payload.name, "Name")?;
    let id = Uuid::new_v4().to_string();

    let mut tx = db_pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO students (id, name, email, grade, slug, parent_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(payload.email.as_deref())
    .bind(payload.grade.as_deref())
    .bind(student_slug(&name))
    .bind(payload.parent_id.as_deref())
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO program_students (program_id, student_id) VALUES (?1, ?2)")
        .bind(program_id)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("✅ Aluno '{}' criado e inscrito no programa {}.", name, program_id);
    get_student(db_pool, instructor_id, &id).await
}

/// Inscreve noutro programa do instrutor um aluno que ele já vê (inscrito
/// num dos seus programas). Alunos de outros instrutores dão 404.
pub async fn enroll_student(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
    student_id: &str,
) -> AppResult<()> {
    get_program(db_pool, instructor_id, program_id).await?;
    get_student(db_pool, instructor_id, student_id).await?;

    sqlx::query("INSERT OR IGNORE INTO program_students (program_id, student_id) VALUES (?1, ?2)")
        .bind(program_id)
        .bind(student_id)
        .execute(db_pool)
        .await?;
    tracing::info!("Aluno {} inscrito no programa {}.", student_id, program_id);
    Ok(())
}

pub async fn unenroll_student(
    db_pool: &SqlitePool,
    instructor_id: &str,
    program_id: &str,
    student_id: &str,
) -> AppResult<()> {
    get_program(db_pool, instructor_id, program_id).await?;
    let rows_affected = sqlx::query("DELETE FROM program_students WHERE program_id = ?1 AND student_id = ?2")
        .bind(program_id)
        .bind(student_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn update_student(
    db_pool: &SqlitePool,
    instructor_id: &str,
    student_id: &str,
    payload: StudentPayload,
) -> AppResult<Student> {
    get_student(db_pool, instructor_id, student_id).await?;
    let name = required_text(&payload.name, "Name")?;

    // O slug não muda: links antigos continuam a funcionar
    sqlx::query("UPDATE students SET name = ?1, email = ?2, grade = ?3, parent_id = ?4 WHERE id = ?5")
        .bind(&name)
        .bind(payload.email.as_deref())
        .bind(payload.grade.as_deref())
        .bind(payload.parent_id.as_deref())
        .bind(student_id)
        .execute(db_pool)
        .await?;

    get_student(db_pool, instructor_id, student_id).await
}

pub async fn delete_student(db_pool: &SqlitePool, instructor_id: &str, student_id: &str) -> AppResult<()> {
    get_student(db_pool, instructor_id, student_id).await?;
    sqlx::query("DELETE FROM students WHERE id = ?1")
        .bind(student_id)
        .execute(db_pool)
        .await?;
    tracing::info!("🗑️ Aluno '{}' apagado.", student_id);
    Ok(())
}

// --- Entradas do portfolio de um aluno ---

pub async fn list_entries(
    db_pool: &SqlitePool,
    instructor_id: &str,
    student_id: &str,
) -> AppResult<Vec<PortfolioEntry>> {
    get_student(db_pool, instructor_id, student_id).await?;
    let entries = sqlx::query_as::<_, PortfolioEntry>(&format!(
        "SELECT {} FROM portfolio_entries e WHERE e.student_id = ?1 ORDER BY e.entry_date DESC",
        ENTRY_COLUMNS
    ))
    .bind(student_id)
    .fetch_all(db_pool)
    .await?;
    Ok(entries)
}

async fn get_owned_entry(db_pool: &SqlitePool, instructor_id: &str, entry_id: &str) -> AppResult<PortfolioEntry> {
    let entry = sqlx::query_as::<_, PortfolioEntry>(&format!(
        "SELECT {} FROM portfolio_entries e WHERE e.id = ?1",
        ENTRY_COLUMNS
    ))
    .bind(entry_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or(AppError::NotFound)?;
    // A entrada é do instrutor se o aluno for
    get_student(db_pool, instructor_id, &entry.student_id).await?;
    Ok(entry)
}

pub async fn create_entry(
    db_pool: &SqlitePool,
    instructor_id: &str,
    student_id: &str,
    payload: PortfolioEntryPayload,
    now: DateTime<Utc>,
) -> AppResult<PortfolioEntry> {
    get_student(db_pool, instructor_id, student_id).await?;
    let title = required_text(&payload.title, "Title")?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO portfolio_entries (id, student_id, title, description, entry_date, entry_type, media_urls, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(student_id)
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.entry_date)
    .bind(&payload.entry_type)
    .bind(Json(&payload.media_urls))
    .bind(now)
    .execute(db_pool)
    .await?;

    get_owned_entry(db_pool, instructor_id, &id).await
}

pub async fn update_entry(
    db_pool: &SqlitePool,
    instructor_id: &str,
    entry_id: &str,
    payload: PortfolioEntryPayload,
) -> AppResult<PortfolioEntry> {
    get_owned_entry(db_pool, instructor_id, entry_id).await?;
    let title = required_text(&payload.title, "Title")?;

    sqlx::query(
        r#"
        UPDATE portfolio_entries
        SET title = ?1, description = ?2, entry_date = ?3, entry_type = ?4, media_urls = ?5
        WHERE id = ?6
        "#,
    )
    .bind(&title)
    .bind(payload.description.as_deref())
    .bind(payload.entry_date)
    .bind(&payload.entry_type)
    .bind(Json(&payload.media_urls))
    .bind(entry_id)
    .execute(db_pool)
    .await?;

    get_owned_entry(db_pool, instructor_id, entry_id).await
}

pub async fn delete_entry(db_pool: &SqlitePool, instructor_id: &str, entry_id: &str) -> AppResult<()> {
    get_owned_entry(db_pool, instructor_id, entry_id).await?;
    sqlx::query("DELETE FROM portfolio_entries WHERE id = ?1")
        .bind(entry_id)
        .execute(db_pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, services::account_service};
    use chrono::NaiveDate;

    async fn instructor(pool: &SqlitePool, username: &str) -> String {
        account_service::create_instructor(pool, username, "password123", "Instructor", Utc::now())
            .await
            .unwrap()
            .id
    }

    fn program_payload(title: &str) -> ProgramPayload {
        ProgramPayload {
            title: title.into(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 15),
        }
    }

    fn student_payload(name: &str) -> StudentPayload {
        StudentPayload {
            name: name.into(),
            email: None,
            grade: Some("3".into()),
            parent_id: None,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Ana Sofia!"), "ana-sofia");
        assert_eq!(slugify("  --Leo  "), "leo");
        assert_eq!(slugify("???"), "student");
        assert!(student_slug("Ana").starts_with("ana-"));
    }

    #[tokio::test]
    async fn rejects_inverted_program_dates() {
        let pool = test_pool().await;
        let id = instructor(&pool, "smith").await;
        let mut payload = program_payload("Robotics");
        payload.end_date = NaiveDate::from_ymd_opt(2025, 8, 1);

        let err = create_program(&pool, &id, payload, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn programs_are_scoped_to_their_instructor() {
        let pool = test_pool().await;
        let smith = instructor(&pool, "smith").await;
        let jones = instructor(&pool, "jones").await;
        let program = create_program(&pool, &smith, program_payload("Robotics"), Utc::now())
            .await
            .unwrap();

        assert_eq!(list_programs(&pool, &smith).await.unwrap().len(), 1);
        assert!(list_programs(&pool, &jones).await.unwrap().is_empty());
        assert!(matches!(get_program(&pool, &jones, &program.id).await, Err(AppError::NotFound)));
        assert!(matches!(delete_program(&pool, &jones, &program.id).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn student_enrolment_and_entries() {
        let pool = test_pool().await;
        let smith = instructor(&pool, "smith").await;
        let jones = instructor(&pool, "jones").await;
        let now = Utc::now();
        let robotics = create_program(&pool, &smith, program_payload("Robotics"), now).await.unwrap();
        let chess = create_program(&pool, &jones, program_payload("Chess"), now).await.unwrap();

        let student = create_student_in_program(&pool, &smith, &robotics.id, student_payload("Ana Sofia"), now)
            .await
            .unwrap();
        assert!(student.slug.starts_with("ana-sofia-"));
        assert_eq!(get_student_by_slug(&pool, &smith, &student.slug).await.unwrap().id, student.id);

        // Smith pode juntar o aluno a outro programa seu
        let art = create_program(&pool, &smith, program_payload("Art"), now).await.unwrap();
        enroll_student(&pool, &smith, &art.id, &student.id).await.unwrap();
        assert_eq!(list_program_students(&pool, &smith, &art.id).await.unwrap().len(), 1);

        let entry = create_entry(
            &pool,
            &smith,
            &student.id,
            PortfolioEntryPayload {
                title: "First robot".into(),
                description: None,
                entry_date: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
                entry_type: "project".into(),
                media_urls: vec!["https://cdn.example.com/robot.jpg".into()],
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(entry.media_urls.0.len(), 1);
        assert_eq!(list_entries(&pool, &smith, &student.id).await.unwrap().len(), 1);

        unenroll_student(&pool, &smith, &art.id, &student.id).await.unwrap();
        assert!(matches!(delete_entry(&pool, &jones, &entry.id).await, Err(AppError::NotFound)));
        assert!(list_program_students(&pool, &jones, &chess.id).await.unwrap().is_empty());
        delete_entry(&pool, &smith, &entry.id).await.unwrap();
    }

    #[tokio::test]
    async fn cannot_enrol_another_instructors_student() {
        let pool = test_pool().await;
        let smith = instructor(&pool, "smith").await;
        let jones = instructor(&pool, "jones").await;
        let now = Utc::now();
        let robotics = create_program(&pool, &smith, program_payload("Robotics"), now).await.unwrap();
        let chess = create_program(&pool, &jones, program_payload("Chess"), now).await.unwrap();
        let student = create_student_in_program(&pool, &smith, &robotics.id, student_payload("Leo"), now)
            .await
            .unwrap();

        let err = enroll_student(&pool, &jones, &chess.id, &student.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert!(list_program_students(&pool, &jones, &chess.id).await.unwrap().is_empty());

        // Sem inscrição, também não consegue ler, editar nem apagar
        assert!(matches!(get_student(&pool, &jones, &student.id).await, Err(AppError::NotFound)));
        assert!(matches!(delete_student(&pool, &jones, &student.id).await, Err(AppError::NotFound)));
        assert_eq!(get_student(&pool, &smith, &student.id).await.unwrap().name, "Leo");

        // Id inexistente: a mesma resposta
        let missing = enroll_student(&pool, &jones, &chess.id, "no-such-student").await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound));
    }

    #[tokio::test]
    async fn sessions_follow_program_ownership() {
        let pool = test_pool().await;
        let smith = instructor(&pool, "smith").await;
        let jones = instructor(&pool, "jones").await;
        let now = Utc::now();
        let program = create_program(&pool, &smith, program_payload("Robotics"), now).await.unwrap();

        let session = create_session(
            &pool,
            &smith,
            &program.id,
            ProgramSessionPayload {
                name: "Week 1".into(),
                session_date: NaiveDate::from_ymd_opt(2025, 9, 8),
            },
            now,
        )
        .await
        .unwrap();

        let renamed = update_session(
            &pool,
            &smith,
            &session.id,
            ProgramSessionPayload {
                name: "Week 1: motors".into(),
                session_date: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Week 1: motors");

        assert!(matches!(delete_session(&pool, &jones, &session.id).await, Err(AppError::NotFound)));
        delete_program(&pool, &smith, &program.id).await.unwrap();
        assert!(matches!(get_owned_session(&pool, &smith, &session.id).await, Err(AppError::NotFound)));
    }
}
