use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::auth::{
    self, NewUserRequest, Role, RoleChangeRequest, SessionStore, UserDirectory, authorize,
    require_auth,
};
use crate::config::Config;
use crate::flow::{self, Step};
use crate::response::Answers;
use crate::saving;
use crate::sheets::SheetMirror;
use crate::storage::{MemStorage, ResponseStore};

pub struct AppState {
    pub store: MemStorage,
    pub users: UserDirectory,
    pub sessions: SessionStore,
    pub mirror: SheetMirror,
    pub snapshot_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Direction {
    #[default]
    Next,
    Prev,
    /// From the privacy-rejected screen back to the consent question.
    Reconsider,
    /// From the privacy-rejected screen back to the start.
    Home,
}

#[derive(Deserialize)]
struct AdvanceRequest {
    current: Step,
    #[serde(default)]
    answers: Answers,
    #[serde(default)]
    direction: Direction,
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;

    let snapshot_file = config.snapshot_file().to_string_lossy().to_string();
    let store = if config.snapshot_file().exists() {
        match saving::load_responses(&snapshot_file) {
            Ok(records) => {
                log::info!("loaded {} responses from snapshot", records.len());
                MemStorage::from_snapshot(records)
            }
            Err(e) => {
                log::warn!("snapshot unreadable, starting empty: {}", e);
                MemStorage::new()
            }
        }
    } else {
        MemStorage::new()
    };

    let users = UserDirectory::new();
    users
        .add_user(
            &config.admin_username,
            &config.admin_password,
            &config.admin_email,
            Role::Admin,
        )
        .map_err(|e| format!("failed to bootstrap admin account: {}", e))?;

    let state = Arc::new(AppState {
        store,
        users,
        sessions: SessionStore::new(),
        mirror: SheetMirror::new(config.workbook_file()),
        snapshot_file,
    });

    let app = router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    log::info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the full router. Separate from [`run`] so tests can drive the
/// service without a socket.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/admin/responses", get(list_responses))
        .route("/api/admin/responses/:id", get(get_response))
        .route("/api/admin/users", get(list_users).post(add_user))
        .route("/api/admin/users/:username", delete(delete_user))
        .route("/api/admin/users/:username/role", patch(update_user_role))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(serve_questionnaire_page))
        .route("/login", get(serve_login_page))
        .route("/admin", get(serve_admin_page))
        .route("/api/flow/start", get(flow_start))
        .route("/api/flow/advance", post(flow_advance))
        .route("/api/responses", post(create_response))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/logout", post(auth::handle_logout))
        .route("/api/auth/me", get(auth::handle_me))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve_questionnaire_page() -> Html<&'static str> {
    Html(include_str!("./static/questionnaire.html"))
}

async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

async fn serve_admin_page() -> Html<&'static str> {
    Html(include_str!("./static/admin.html"))
}

/// Hand out the first step so the wizard page starts server-driven.
async fn flow_start() -> Response {
    let step = flow::first_step();
    Json(json!({
        "step": flow::descriptor(step),
        "progress": flow::progress(step, &Answers::default()),
        "terminal": false,
    }))
    .into_response()
}

/// Move the wizard one step in the requested direction.
///
/// The branching decision lives entirely here: the page reports where it
/// is and what has been answered, and gets told where to go.
async fn flow_advance(Json(req): Json<AdvanceRequest>) -> Response {
    let target = match req.direction {
        Direction::Next => match flow::next_step(req.current, &req.answers) {
            Ok(step) => step,
            Err(message) => return error_json(StatusCode::BAD_REQUEST, &message),
        },
        Direction::Prev => match flow::prev_step(req.current, &req.answers) {
            Some(step) => step,
            None => return error_json(StatusCode::BAD_REQUEST, "無法返回上一步"),
        },
        Direction::Reconsider => {
            if req.current != Step::PrivacyRejected {
                return error_json(StatusCode::BAD_REQUEST, "此步驟無法重新考慮");
            }
            Step::PrivacyConsent
        }
        Direction::Home => Step::Welcome,
    };

    Json(json!({
        "step": flow::descriptor(target),
        "progress": flow::progress(target, &req.answers),
        "terminal": flow::is_terminal(target),
    }))
    .into_response()
}

/// Accept a completed questionnaire.
///
/// Validates the payload shape and branch invariants, stores the record,
/// and mirrors it to the spreadsheet off the request path. Mirror and
/// snapshot failures are logged, never reported to the respondent.
#[axum::debug_handler]
async fn create_response(
    State(state): State<Arc<AppState>>,
    Json(answers): Json<Answers>,
) -> Response {
    match state.store.create(answers) {
        Ok(stored) => {
            let task_state = state.clone();
            let record = stored.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = task_state.mirror.append_response(&record) {
                    log::error!("failed to append to spreadsheet: {}", e);
                }
                if let Err(e) =
                    saving::save_responses(&task_state.store.snapshot(), &task_state.snapshot_file)
                {
                    log::error!("failed to write snapshot: {}", e);
                }
            });

            Json(stored).into_response()
        }
        Err(message) => error_json(StatusCode::BAD_REQUEST, &message),
    }
}

async fn list_responses(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Viewer) {
        return denied.into_response();
    }
    Json(state.store.all()).into_response()
}

async fn get_response(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Viewer) {
        return denied.into_response();
    }
    match state.store.get(&id) {
        Some(record) => Json(record).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "Response not found"),
    }
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Admin) {
        return denied.into_response();
    }
    Json(state.users.list()).into_response()
}

async fn add_user(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Json(new_user): Json<NewUserRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Admin) {
        return denied.into_response();
    }
    match state.users.add_user(
        &new_user.username,
        &new_user.password,
        &new_user.email,
        new_user.role,
    ) {
        Ok(created) => {
            log::info!("user {} created by {}", created.username, username);
            Json(created).into_response()
        }
        Err(message) => error_json(StatusCode::BAD_REQUEST, &message),
    }
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(target): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Admin) {
        return denied.into_response();
    }
    if target == username {
        return error_json(StatusCode::BAD_REQUEST, "無法刪除自己的帳號");
    }
    if state.users.remove_user(&target) {
        log::info!("user {} removed by {}", target, username);
        Json(json!({ "ok": true })).into_response()
    } else {
        error_json(StatusCode::NOT_FOUND, "使用者不存在")
    }
}

async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(target): Path<String>,
    Json(change): Json<RoleChangeRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &username, Role::Admin) {
        return denied.into_response();
    }
    match state.users.update_role(&target, change.role) {
        Some(updated) => Json(updated).into_response(),
        None => error_json(StatusCode::NOT_FOUND, "使用者不存在"),
    }
}
