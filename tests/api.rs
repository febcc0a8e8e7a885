//! End-to-end tests driving the full router over HTTP.

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use yaqeen::auth;
use yaqeen::config::{AdminBootstrap, Config};
use yaqeen::db;
use yaqeen::handlers;
use yaqeen::state::AppState;

const ADMIN_PASSWORD: &str = "admin-password";
const PASSWORD: &str = "secret-password";

struct TestApp {
  server: TestServer,
  admin: Cookie<'static>,
  _temp: TempDir,
}

async fn spawn_app() -> TestApp {
  let temp = TempDir::new().unwrap();
  let pool = db::init_db(&temp.path().join("yaqeen.db")).unwrap();
  {
    let conn = pool.lock().unwrap();
    let admin = AdminBootstrap {
      username: "admin".to_string(),
      password: ADMIN_PASSWORD.to_string(),
    };
    auth::bootstrap_admin(&conn, &admin).unwrap();
  }

  let config = Config {
    database_path: temp.path().join("yaqeen.db"),
    uploads_dir: temp.path().join("uploads"),
    pdf_browser: "yaqeen-no-such-browser".to_string(),
    admin: None,
    ..Config::default()
  };
  let server = TestServer::new(handlers::router(AppState::new(pool, config))).unwrap();
  let admin = login(&server, "admin", ADMIN_PASSWORD).await;

  TestApp {
    server,
    admin,
    _temp: temp,
  }
}

async fn login(server: &TestServer, username: &str, password: &str) -> Cookie<'static> {
  let response = server
    .post("/api/auth/login")
    .json(&json!({ "username": username, "password": password }))
    .await;
  response.assert_status_ok();
  response.cookie("yaqeen_session")
}

/// Register, approve and log in a user; returns (id, session cookie)
async fn approved_user(app: &TestApp, username: &str, role: &str) -> (i64, Cookie<'static>) {
  let response = app
    .server
    .post("/api/auth/register")
    .json(&json!({
      "username": username,
      "password": PASSWORD,
      "full_name": format!("{} full name", username),
      "role": role,
    }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let id = response.json::<Value>()["id"].as_i64().unwrap();

  app
    .server
    .post(&format!("/api/users/{}/approve", id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status_ok();

  let cookie = login(&app.server, username, PASSWORD).await;
  (id, cookie)
}

/// Admin-created group with one teacher and the given students
async fn group(app: &TestApp, teacher_id: i64, students: &[i64]) -> i64 {
  let response = app
    .server
    .post("/api/groups")
    .add_cookie(app.admin.clone())
    .json(&json!({ "name": "Halaqa Al-Fajr", "description": null, "teacher_id": teacher_id }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let group_id = response.json::<Value>()["id"].as_i64().unwrap();

  for student in students {
    app
      .server
      .post(&format!("/api/groups/{}/members", group_id))
      .add_cookie(app.admin.clone())
      .json(&json!({ "student_id": student }))
      .await
      .assert_status(StatusCode::CREATED);
  }
  group_id
}

fn days_ago(days: i64) -> NaiveDate {
  Utc::now().date_naive() - Duration::days(days)
}

#[tokio::test]
async fn test_health_needs_no_login() {
  let app = spawn_app().await;
  let response = app.server.get("/health").await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_registration_requires_approval() {
  let app = spawn_app().await;

  let response = app
    .server
    .post("/api/auth/register")
    .json(&json!({
      "username": "khadija",
      "password": PASSWORD,
      "full_name": "  Khadija   Omar ",
      "role": "student",
    }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let user = response.json::<Value>();
  assert_eq!(user["status"], "pending");
  assert_eq!(user["full_name"], "Khadija Omar");

  // Duplicate username
  app
    .server
    .post("/api/auth/register")
    .json(&json!({ "username": "khadija", "password": PASSWORD, "full_name": "K", "role": "student" }))
    .await
    .assert_status(StatusCode::CONFLICT);

  // Pending accounts cannot log in
  app
    .server
    .post("/api/auth/login")
    .json(&json!({ "username": "khadija", "password": PASSWORD }))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  let id = user["id"].as_i64().unwrap();
  app
    .server
    .post(&format!("/api/users/{}/approve", id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status_ok();

  let cookie = login(&app.server, "khadija", PASSWORD).await;
  let me = app.server.get("/api/auth/me").add_cookie(cookie).await;
  me.assert_status_ok();
  assert_eq!(me.json::<Value>()["role"], "student");

  // Approved students are enrolled on the first stage
  let profile = app
    .server
    .get(&format!("/api/students/{}", id))
    .add_cookie(app.admin.clone())
    .await;
  profile.assert_status_ok();
  assert_eq!(profile.json::<Value>()["stage"]["start_page"], 1);
}

#[tokio::test]
async fn test_login_failures_and_admin_self_registration() {
  let app = spawn_app().await;

  app
    .server
    .post("/api/auth/login")
    .json(&json!({ "username": "admin", "password": "wrong-password" }))
    .await
    .assert_status(StatusCode::UNAUTHORIZED);

  app.server.get("/api/auth/me").await.assert_status(StatusCode::UNAUTHORIZED);

  app
    .server
    .post("/api/auth/register")
    .json(&json!({ "username": "mallory", "password": PASSWORD, "full_name": "M", "role": "admin" }))
    .await
    .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_closed_registration() {
  let app = spawn_app().await;
  let response = app
    .server
    .put("/api/settings")
    .add_cookie(app.admin.clone())
    .json(&json!({ "registration_open": false }))
    .await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["registration_open"], false);

  app
    .server
    .post("/api/auth/register")
    .json(&json!({ "username": "late_comer", "password": PASSWORD, "full_name": "L", "role": "student" }))
    .await
    .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_checks() {
  let app = spawn_app().await;
  let (_, student) = approved_user(&app, "student_one", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "teacher_one", "teacher").await;

  app
    .server
    .get("/api/users")
    .add_cookie(student.clone())
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .get("/api/users")
    .add_cookie(app.admin.clone())
    .await
    .assert_status_ok();

  // Teachers cannot create groups
  app
    .server
    .post("/api/groups")
    .add_cookie(teacher)
    .json(&json!({ "name": "Mine", "teacher_id": teacher_id }))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  // Admins cannot demote themselves
  let me = app.server.get("/api/auth/me").add_cookie(app.admin.clone()).await;
  let admin_id = me.json::<Value>()["id"].as_i64().unwrap();
  app
    .server
    .put(&format!("/api/users/{}/role", admin_id))
    .add_cookie(app.admin.clone())
    .json(&json!({ "role": "teacher" }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_progress_generates_certificate_and_approval_advances_stage() {
  let app = spawn_app().await;
  let (student_id, student) = approved_user(&app, "yusuf", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadh", "teacher").await;
  let (other_student_id, _) = approved_user(&app, "outsider", "student").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  let record = |date: NaiveDate, grade: &str, page: Option<i64>| {
    json!({ "student_id": student_id, "date": date, "grade": grade, "page_number": page, "notes": null })
  };

  // Outside the first stage (pages 1-101)
  app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&record(days_ago(5), "good", Some(150)))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  // Future dates are refused
  app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&record(days_ago(-1), "good", Some(10)))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  let response = app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&record(days_ago(5), "very_good", Some(50)))
    .await;
  response.assert_status_ok();
  let outcome = response.json::<Value>();
  assert_eq!(outcome["current_page"], 50);
  assert!(outcome["certificate"].is_null());

  // Going backwards on a later date conflicts
  app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&record(days_ago(3), "good", Some(40)))
    .await
    .assert_status(StatusCode::CONFLICT);

  // A teacher outside the student's groups is refused
  app
    .server
    .put("/api/progress/records")
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": other_student_id, "date": days_ago(1), "grade": "absent" }))
    .await
    .assert_status_ok();
  app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&json!({ "student_id": other_student_id, "date": days_ago(1), "grade": "absent" }))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  // Reaching the stage end generates a pending certificate
  let response = app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&record(days_ago(1), "excellent", Some(101)))
    .await;
  response.assert_status_ok();
  let outcome = response.json::<Value>();
  assert_eq!(outcome["completion"], 100);
  assert_eq!(outcome["certificate"]["status"], "pending");
  let certificate_id = outcome["certificate"]["id"].as_i64().unwrap();

  // Timetable for the current week
  let response = app
    .server
    .get("/api/progress/timetable")
    .add_query_param("group_id", group_id)
    .add_cookie(teacher.clone())
    .await;
  response.assert_status_ok();
  let grid = response.json::<Value>();
  assert_eq!(grid["dates"].as_array().unwrap().len(), 7);
  assert_eq!(grid["rows"][0]["cells"].as_array().unwrap().len(), 7);

  // Students see their own records with a summary
  let response = app
    .server
    .get(&format!("/api/progress/students/{}", student_id))
    .add_cookie(student.clone())
    .await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["summary"]["total"], 2);

  // Unapproved certificates do not render
  app
    .server
    .get(&format!("/api/certificates/{}/render", certificate_id))
    .add_cookie(student.clone())
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  let response = app
    .server
    .post(&format!("/api/certificates/{}/approve", certificate_id))
    .add_cookie(app.admin.clone())
    .await;
  response.assert_status_ok();
  let approval = response.json::<Value>();
  assert_eq!(approval["certificate"]["status"], "approved");
  assert_eq!(approval["advanced_to"]["start_page"], 102);
  assert!(approval["certificate"]["reviewed_by"].is_i64());
  assert!(approval["certificate"]["reviewed_at"].is_string());

  // Approving twice conflicts
  app
    .server
    .post(&format!("/api/certificates/{}/approve", certificate_id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::CONFLICT);

  let html = app
    .server
    .get(&format!("/api/certificates/{}/render", certificate_id))
    .add_cookie(student.clone())
    .await;
  html.assert_status_ok();
  assert!(html.text().contains("yusuf full name"));

  // No browser is installed for tests
  app
    .server
    .get(&format!("/api/certificates/{}/render", certificate_id))
    .add_query_param("format", "pdf")
    .add_cookie(student)
    .await
    .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_audio_submission_and_grading() {
  let app = spawn_app().await;
  let (student_id, student) = approved_user(&app, "maryam", "student").await;
  let (_, outsider) = approved_user(&app, "stranger", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadha", "teacher").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  let response = app
    .server
    .post("/api/assignments")
    .add_cookie(teacher.clone())
    .json(&json!({
      "group_id": group_id,
      "title": "Recite Surat Al-Mulk",
      "description": "Full surah with tajweed",
      "due_date": days_ago(-7),
      "requires_audio": true,
    }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let assignment_id = response.json::<Value>()["id"].as_i64().unwrap();
  let submissions_url = format!("/api/assignments/{}/submissions", assignment_id);

  // Audio is required
  app
    .server
    .post(&submissions_url)
    .add_cookie(student.clone())
    .multipart(MultipartForm::new().add_text("content", "Done"))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  // Unsupported formats are refused
  let pdf = Part::bytes(b"%PDF-1.4".to_vec())
    .file_name("notes.pdf")
    .mime_type("application/pdf");
  app
    .server
    .post(&submissions_url)
    .add_cookie(student.clone())
    .multipart(MultipartForm::new().add_part("audio", pdf))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  // Students outside the group cannot submit
  let audio = || {
    Part::bytes(b"ID3 recitation bytes".to_vec())
      .file_name("al-mulk.mp3")
      .mime_type("audio/mpeg")
  };
  app
    .server
    .post(&submissions_url)
    .add_cookie(outsider.clone())
    .multipart(MultipartForm::new().add_part("audio", audio()))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  let response = app
    .server
    .post(&submissions_url)
    .add_cookie(student.clone())
    .multipart(
      MultipartForm::new()
        .add_text("content", "Recited twice")
        .add_part("audio", audio()),
    )
    .await;
  response.assert_status(StatusCode::CREATED);
  let submission = response.json::<Value>();
  assert_eq!(submission["has_audio"], true);
  assert_eq!(submission["late"], false);
  assert!(submission.get("audio_path").is_none());
  let submission_id = submission["id"].as_i64().unwrap();

  // The submitter and the teacher can stream the audio, others cannot
  let audio_url = format!("/api/submissions/{}/audio", submission_id);
  let response = app.server.get(&audio_url).add_cookie(student.clone()).await;
  response.assert_status_ok();
  assert_eq!(response.header("content-type"), "audio/mpeg");
  assert_eq!(response.as_bytes().as_ref(), b"ID3 recitation bytes");
  app.server.get(&audio_url).add_cookie(teacher.clone()).await.assert_status_ok();
  app
    .server
    .get(&audio_url)
    .add_cookie(outsider)
    .await
    .assert_status(StatusCode::FORBIDDEN);

  let response = app
    .server
    .post(&format!("/api/submissions/{}/grade", submission_id))
    .add_cookie(teacher.clone())
    .json(&json!({ "grade": "excellent", "feedback": "ما شاء الله" }))
    .await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["status"], "graded");

  // Graded submissions cannot be replaced
  app
    .server
    .post(&submissions_url)
    .add_cookie(student.clone())
    .multipart(MultipartForm::new().add_part("audio", audio()))
    .await
    .assert_status(StatusCode::CONFLICT);

  // The student sees their graded submission in the listing
  let response = app.server.get("/api/assignments").add_cookie(student).await;
  response.assert_status_ok();
  let listing = response.json::<Value>();
  assert_eq!(listing[0]["submission_status"], "graded");
  assert_eq!(listing[0]["submission_grade"], "excellent");

  let response = app
    .server
    .get(&format!("{}/archive", submissions_url))
    .add_cookie(teacher)
    .await;
  response.assert_status_ok();
  assert_eq!(response.header("content-type"), "application/zip");
  assert!(response.as_bytes().starts_with(b"PK"));
}

#[tokio::test]
async fn test_complaints_and_dashboard() {
  let app = spawn_app().await;
  let (_, student) = approved_user(&app, "abdullah", "student").await;

  let response = app
    .server
    .post("/api/complaints")
    .add_cookie(student.clone())
    .json(&json!({ "subject": "Audio player", "body": "The recording stops after a minute." }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let complaint_id = response.json::<Value>()["id"].as_i64().unwrap();

  let dashboard = app.server.get("/api/dashboard").add_cookie(app.admin.clone()).await;
  dashboard.assert_status_ok();
  let summary = dashboard.json::<Value>();
  assert_eq!(summary["role"], "admin");
  assert_eq!(summary["open_complaints"], 1);
  assert_eq!(summary["students"], 1);

  app
    .server
    .post(&format!("/api/complaints/{}/respond", complaint_id))
    .add_cookie(student.clone())
    .json(&json!({ "response": "n/a" }))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  let response = app
    .server
    .post(&format!("/api/complaints/{}/respond", complaint_id))
    .add_cookie(app.admin.clone())
    .json(&json!({ "response": "Fixed in the latest release." }))
    .await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["status"], "resolved");

  let own = app.server.get("/api/complaints").add_cookie(student.clone()).await;
  assert_eq!(own.json::<Value>().as_array().unwrap().len(), 1);

  let dashboard = app.server.get("/api/dashboard").add_cookie(student).await;
  dashboard.assert_status_ok();
  assert_eq!(dashboard.json::<Value>()["role"], "student");
}

#[tokio::test]
async fn test_progress_is_only_for_approved_students() {
  let app = spawn_app().await;
  let (teacher_id, _) = approved_user(&app, "ustadh_zaid", "teacher").await;

  app
    .server
    .put("/api/progress/records")
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": teacher_id, "date": days_ago(1), "grade": "good", "page_number": 5 }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  app
    .server
    .post("/api/certificates")
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": teacher_id, "stage_id": 1 }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  app
    .server
    .get(&format!("/api/reports/students/{}", teacher_id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  app
    .server
    .put("/api/progress/records")
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": 9999, "date": days_ago(1), "grade": "absent" }))
    .await
    .assert_status(StatusCode::NOT_FOUND);

  // Nothing was recorded and no profile was created for the teacher
  let response = app
    .server
    .get(&format!("/api/students/{}", teacher_id))
    .add_cookie(app.admin.clone())
    .await;
  response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_shared_audio_survives_replacement() {
  let app = spawn_app().await;
  let (amina_id, amina) = approved_user(&app, "amina", "student").await;
  let (bilal_id, bilal) = approved_user(&app, "bilal", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadh_hamza", "teacher").await;
  let group_id = group(&app, teacher_id, &[amina_id, bilal_id]).await;

  let response = app
    .server
    .post("/api/assignments")
    .add_cookie(teacher.clone())
    .json(&json!({ "group_id": group_id, "title": "Surat Al-Kahf", "requires_audio": true }))
    .await;
  let assignment_id = response.json::<Value>()["id"].as_i64().unwrap();
  let submissions_url = format!("/api/assignments/{}/submissions", assignment_id);
  let recording = |bytes: &[u8]| {
    MultipartForm::new().add_part(
      "audio",
      Part::bytes(bytes.to_vec()).file_name("al-kahf.ogg").mime_type("audio/ogg"),
    )
  };

  // Identical recordings share one stored file
  app
    .server
    .post(&submissions_url)
    .add_cookie(amina.clone())
    .multipart(recording(b"OggS shared take"))
    .await
    .assert_status(StatusCode::CREATED);
  let response = app
    .server
    .post(&submissions_url)
    .add_cookie(bilal.clone())
    .multipart(recording(b"OggS shared take"))
    .await;
  response.assert_status(StatusCode::CREATED);
  let bilal_submission = response.json::<Value>()["id"].as_i64().unwrap();

  // Amina replaces her recording; Bilal still references the shared file
  app
    .server
    .post(&submissions_url)
    .add_cookie(amina)
    .multipart(recording(b"OggS second take"))
    .await
    .assert_status(StatusCode::CREATED);

  let response = app
    .server
    .get(&format!("/api/submissions/{}/audio", bilal_submission))
    .add_cookie(bilal)
    .await;
  response.assert_status_ok();
  assert_eq!(response.as_bytes().as_ref(), b"OggS shared take");
}

#[tokio::test]
async fn test_materials() {
  let app = spawn_app().await;
  let (student_id, student) = approved_user(&app, "sumayya", "student").await;
  let (_, outsider) = approved_user(&app, "nusaybah", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadha_aisha", "teacher").await;
  let (_, other_teacher) = approved_user(&app, "ustadha_hafsa", "teacher").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  // A link or a file is required
  app
    .server
    .post("/api/materials")
    .add_cookie(teacher.clone())
    .multipart(MultipartForm::new().add_text("title", "Empty"))
    .await
    .assert_status(StatusCode::BAD_REQUEST);
  app
    .server
    .post("/api/materials")
    .add_cookie(teacher.clone())
    .multipart(
      MultipartForm::new()
        .add_text("title", "Bad link")
        .add_text("url", "ftp://example.com/file"),
    )
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  // Students cannot post materials
  app
    .server
    .post("/api/materials")
    .add_cookie(student.clone())
    .multipart(
      MultipartForm::new()
        .add_text("title", "Mine")
        .add_text("url", "https://example.com"),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);

  // Only the group's teacher may post to the group
  let tajweed = || {
    MultipartForm::new()
      .add_text("group_id", group_id.to_string())
      .add_text("title", "Tajweed rules")
      .add_part(
        "file",
        Part::bytes(b"%PDF-1.4 tajweed".to_vec())
          .file_name("تجويد.pdf")
          .mime_type("application/pdf"),
      )
  };
  app
    .server
    .post("/api/materials")
    .add_cookie(other_teacher.clone())
    .multipart(tajweed())
    .await
    .assert_status(StatusCode::FORBIDDEN);
  let response = app
    .server
    .post("/api/materials")
    .add_cookie(teacher.clone())
    .multipart(tajweed())
    .await;
  response.assert_status(StatusCode::CREATED);
  let material = response.json::<Value>();
  assert_eq!(material["file_name"], "تجويد.pdf");
  let material_id = material["id"].as_i64().unwrap();

  // Global link posted by another teacher
  app
    .server
    .post("/api/materials")
    .add_cookie(other_teacher.clone())
    .multipart(
      MultipartForm::new()
        .add_text("title", "Mushaf recitations")
        .add_text("url", "https://quran.example.org/recitations"),
    )
    .await
    .assert_status(StatusCode::CREATED);

  let listed = app.server.get("/api/materials").add_cookie(student.clone()).await;
  assert_eq!(listed.json::<Value>().as_array().unwrap().len(), 2);
  let listed = app.server.get("/api/materials").add_cookie(outsider.clone()).await;
  let visible = listed.json::<Value>();
  assert_eq!(visible.as_array().unwrap().len(), 1);
  assert_eq!(visible[0]["title"], "Mushaf recitations");

  let file_url = format!("/api/materials/{}/file", material_id);
  let response = app.server.get(&file_url).add_cookie(student.clone()).await;
  response.assert_status_ok();
  assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.4 tajweed");
  let disposition = response.header("content-disposition");
  let disposition = disposition.to_str().unwrap();
  assert!(disposition.starts_with("attachment;"));
  assert!(disposition.contains("filename*=UTF-8''%D8%AA%D8%AC%D9%88%D9%8A%D8%AF.pdf"));
  app
    .server
    .get(&file_url)
    .add_cookie(outsider)
    .await
    .assert_status(StatusCode::FORBIDDEN);

  // Only the uploader or an admin deletes
  let material_url = format!("/api/materials/{}", material_id);
  app
    .server
    .delete(&material_url)
    .add_cookie(other_teacher)
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .delete(&material_url)
    .add_cookie(teacher)
    .await
    .assert_status(StatusCode::NO_CONTENT);
  app
    .server
    .get(&file_url)
    .add_cookie(student)
    .await
    .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_meetings() {
  let app = spawn_app().await;
  let (student_id, student) = approved_user(&app, "hamid", "student").await;
  let (_, outsider) = approved_user(&app, "rashid", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadh_ilyas", "teacher").await;
  let (_, other_teacher) = approved_user(&app, "ustadh_idris", "teacher").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  let meeting = |title: &str, starts_at: chrono::DateTime<Utc>, duration: i64| {
    json!({
      "group_id": group_id,
      "title": title,
      "starts_at": starts_at.to_rfc3339(),
      "duration_minutes": duration,
      "link": "https://meet.example.com/halaqa",
    })
  };
  let tomorrow = Utc::now() + Duration::days(1);

  for duration in [0, 481] {
    app
      .server
      .post("/api/meetings")
      .add_cookie(teacher.clone())
      .json(&meeting("Too long", tomorrow, duration))
      .await
      .assert_status(StatusCode::BAD_REQUEST);
  }
  app
    .server
    .post("/api/meetings")
    .add_cookie(other_teacher.clone())
    .json(&meeting("Not my group", tomorrow, 60))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  app
    .server
    .post("/api/meetings")
    .add_cookie(teacher.clone())
    .json(&meeting("Last week's review", Utc::now() - Duration::days(2), 60))
    .await
    .assert_status(StatusCode::CREATED);
  let response = app
    .server
    .post("/api/meetings")
    .add_cookie(teacher.clone())
    .json(&meeting("Juz Amma review", tomorrow, 480))
    .await;
  response.assert_status(StatusCode::CREATED);
  let meeting_id = response.json::<Value>()["id"].as_i64().unwrap();

  let all = app.server.get("/api/meetings").add_cookie(student.clone()).await;
  assert_eq!(all.json::<Value>().as_array().unwrap().len(), 2);
  let upcoming = app
    .server
    .get("/api/meetings")
    .add_query_param("upcoming", true)
    .add_cookie(student.clone())
    .await;
  let upcoming = upcoming.json::<Value>();
  assert_eq!(upcoming.as_array().unwrap().len(), 1);
  assert_eq!(upcoming[0]["title"], "Juz Amma review");
  let none = app.server.get("/api/meetings").add_cookie(outsider).await;
  assert!(none.json::<Value>().as_array().unwrap().is_empty());

  let meeting_url = format!("/api/meetings/{}", meeting_id);
  app
    .server
    .delete(&meeting_url)
    .add_cookie(other_teacher)
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .delete(&meeting_url)
    .add_cookie(student)
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .delete(&meeting_url)
    .add_cookie(teacher)
    .await
    .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_stage_and_membership_conflicts() {
  let app = spawn_app().await;
  let (student_id, _) = approved_user(&app, "salman", "student").await;
  let (teacher_id, _) = approved_user(&app, "ustadh_anas", "teacher").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  app
    .server
    .post(&format!("/api/groups/{}/members", group_id))
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": student_id }))
    .await
    .assert_status(StatusCode::CONFLICT);

  // Teachers cannot be added as members
  app
    .server
    .post(&format!("/api/groups/{}/members", group_id))
    .add_cookie(app.admin.clone())
    .json(&json!({ "student_id": teacher_id }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);

  let stages = app.server.get("/api/stages").add_cookie(app.admin.clone()).await;
  let first_stage = stages.json::<Value>()[0]["id"].as_i64().unwrap();
  app
    .server
    .delete(&format!("/api/stages/{}", first_stage))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::CONFLICT);

  let response = app
    .server
    .post("/api/stages")
    .add_cookie(app.admin.clone())
    .json(&json!({ "name": "Review stage", "start_page": 1, "end_page": 604, "sort_order": 99 }))
    .await;
  response.assert_status(StatusCode::CREATED);
  let unused = response.json::<Value>()["id"].as_i64().unwrap();
  app
    .server
    .delete(&format!("/api/stages/{}", unused))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::NO_CONTENT);

  app
    .server
    .post("/api/stages")
    .add_cookie(app.admin.clone())
    .json(&json!({ "name": "Backwards", "start_page": 300, "end_page": 200, "sort_order": 100 }))
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reports_render_html_and_need_a_browser_for_pdf() {
  let app = spawn_app().await;
  let (student_id, student) = approved_user(&app, "zaynab", "student").await;
  let (_, classmate) = approved_user(&app, "ruqayya", "student").await;
  let (teacher_id, teacher) = approved_user(&app, "ustadha_fatima", "teacher").await;
  let group_id = group(&app, teacher_id, &[student_id]).await;

  app
    .server
    .put("/api/progress/records")
    .add_cookie(teacher.clone())
    .json(&json!({ "student_id": student_id, "date": days_ago(0), "grade": "excellent", "page_number": 12 }))
    .await
    .assert_status_ok();

  let report_url = format!("/api/reports/students/{}", student_id);
  let response = app.server.get(&report_url).add_cookie(student.clone()).await;
  response.assert_status_ok();
  assert!(response.header("content-type").to_str().unwrap().starts_with("text/html"));
  let html = response.text();
  assert!(html.contains("zaynab full name"));
  assert!(html.contains("dir=\"rtl\""));

  app
    .server
    .get(&report_url)
    .add_cookie(classmate)
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .get(&report_url)
    .add_query_param("format", "pdf")
    .add_cookie(teacher.clone())
    .await
    .assert_status(StatusCode::SERVICE_UNAVAILABLE);

  let weekly_url = format!("/api/reports/groups/{}/weekly", group_id);
  let response = app.server.get(&weekly_url).add_cookie(teacher.clone()).await;
  response.assert_status_ok();
  let html = response.text();
  assert!(html.contains("Halaqa Al-Fajr"));
  assert!(html.contains("zaynab full name"));

  app
    .server
    .get(&weekly_url)
    .add_cookie(student)
    .await
    .assert_status(StatusCode::FORBIDDEN);
  app
    .server
    .get(&weekly_url)
    .add_query_param("format", "pdf")
    .add_cookie(teacher)
    .await
    .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_reject_and_delete_end_sessions() {
  let app = spawn_app().await;
  let (rejected_id, rejected) = approved_user(&app, "muadh", "student").await;
  let (deleted_id, deleted) = approved_user(&app, "ubayy", "teacher").await;

  app.server.get("/api/auth/me").add_cookie(rejected.clone()).await.assert_status_ok();
  let response = app
    .server
    .post(&format!("/api/users/{}/reject", rejected_id))
    .add_cookie(app.admin.clone())
    .await;
  response.assert_status_ok();
  assert_eq!(response.json::<Value>()["status"], "rejected");
  app
    .server
    .get("/api/auth/me")
    .add_cookie(rejected)
    .await
    .assert_status(StatusCode::UNAUTHORIZED);
  app
    .server
    .post("/api/auth/login")
    .json(&json!({ "username": "muadh", "password": PASSWORD }))
    .await
    .assert_status(StatusCode::FORBIDDEN);

  app
    .server
    .delete(&format!("/api/users/{}", deleted_id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::NO_CONTENT);
  app
    .server
    .get("/api/auth/me")
    .add_cookie(deleted)
    .await
    .assert_status(StatusCode::UNAUTHORIZED);
  app
    .server
    .delete(&format!("/api/users/{}", deleted_id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::NOT_FOUND);

  // Admins cannot delete themselves
  let me = app.server.get("/api/auth/me").add_cookie(app.admin.clone()).await;
  let admin_id = me.json::<Value>()["id"].as_i64().unwrap();
  app
    .server
    .delete(&format!("/api/users/{}", admin_id))
    .add_cookie(app.admin.clone())
    .await
    .assert_status(StatusCode::BAD_REQUEST);
}
