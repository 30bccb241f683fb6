#![allow(dead_code)]

use std::sync::{mpsc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Method, StatusCode};
use serde_json::{json, Value};

use sms_api::app::{self, AppState};
use sms_api::config::AppConfig;

pub const ROOT_EMAIL: &str = "root@sms.test";
pub const ROOT_PASSWORD: &str = "root-password";
pub const ADMIN_PASSWORD: &str = "admin-password";

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Router served in-process against the memory store, shared by every test in a binary
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        // Each #[tokio::test] owns a short-lived runtime, so the server gets its own
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to build server runtime");

            runtime.block_on(async move {
                let mut config = AppConfig::for_memory("integration-test-secret");
                config.bootstrap.superadmin_email = Some(ROOT_EMAIL.to_string());
                config.bootstrap.superadmin_password = Some(ROOT_PASSWORD.to_string());

                let store = app::build_store(&config).await.expect("memory store");
                let state = AppState::new(config, store).expect("app state");
                state
                    .accounts
                    .bootstrap(&state.config.bootstrap)
                    .await
                    .expect("bootstrap superadmin");

                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
                let addr = listener.local_addr().expect("local addr");
                tx.send((format!("http://{}", addr), state.clone())).expect("announce server");

                axum::serve(listener, app::router(state)).await.expect("serve");
            });
        });

        let (base_url, state) = rx
            .recv_timeout(Duration::from_secs(10))
            .context("test server did not start")?;
        Ok(Self { base_url, state })
    }
}

pub fn server() -> &'static TestServer {
    SERVER.get_or_init(|| TestServer::spawn().expect("failed to start test server"))
}

/// Short unique suffix so tests sharing the store never collide
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Cookie(&'a str),
    /// Bearer token plus an unrelated session cookie
    Both(&'a str, &'a str),
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub cookies: Vec<String>,
}

impl Reply {
    /// `name=value` pair of the named cookie, if one was set
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .iter()
            .find(|c| c.starts_with(&format!("{}=", name)))
            .cloned()
    }
}

pub async fn send(
    method: Method,
    path: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> Result<Reply> {
    let client = reqwest::Client::new();
    let mut request = client.request(method, format!("{}{}", server().base_url, path));
    request = match auth {
        Auth::None => request,
        Auth::Bearer(token) => request.bearer_auth(token),
        Auth::Cookie(cookie) => request.header(header::COOKIE, cookie),
        Auth::Both(token, cookie) => request.bearer_auth(token).header(header::COOKIE, cookie),
    };
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .collect();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);

    Ok(Reply { status, body, cookies })
}

pub async fn login(email: &str, password: &str) -> Result<Reply> {
    send(
        Method::POST,
        "/api/auth/login",
        Auth::None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

pub async fn token_for(email: &str, password: &str) -> Result<String> {
    let reply = login(email, password).await?;
    anyhow::ensure!(reply.status == StatusCode::OK, "login failed: {}", reply.body);
    reply.body["accessToken"]
        .as_str()
        .map(str::to_string)
        .context("accessToken missing")
}

pub async fn root_token() -> Result<String> {
    token_for(ROOT_EMAIL, ROOT_PASSWORD).await
}

fn id_of(reply: &Reply, key: &str) -> Result<String> {
    anyhow::ensure!(
        reply.status == StatusCode::CREATED,
        "create failed: {} {}",
        reply.status,
        reply.body
    );
    reply.body[key]["id"]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("{}.id missing", key))
}

/// Creates a school with a unique name; returns (id, name)
pub async fn create_school(root: &str) -> Result<(String, String)> {
    let name = unique("school");
    let reply = send(
        Method::POST,
        "/api/schools",
        Auth::Bearer(root),
        Some(json!({ "name": name, "location": "Springfield" })),
    )
    .await?;
    Ok((id_of(&reply, "school")?, name))
}

/// Creates an admin for `school` and logs in; returns (email, token)
pub async fn create_admin(root: &str, school: &str) -> Result<(String, String)> {
    let email = format!("{}@school.test", unique("admin"));
    let reply = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(root),
        Some(json!({
            "name": "School Admin",
            "email": email,
            "password": ADMIN_PASSWORD,
            "role": "admin",
            "school": school,
        })),
    )
    .await?;
    anyhow::ensure!(reply.status == StatusCode::CREATED, "create-admin failed: {}", reply.body);
    let token = token_for(&email, ADMIN_PASSWORD).await?;
    Ok((email, token))
}

pub async fn create_classroom(admin: &str, name: &str) -> Result<String> {
    let reply = send(
        Method::POST,
        "/api/classrooms",
        Auth::Bearer(admin),
        Some(json!({ "name": name, "vacancy": 25 })),
    )
    .await?;
    id_of(&reply, "classroom")
}

pub async fn create_student(admin: &str, classroom: &str, username: &str) -> Result<String> {
    let reply = send(
        Method::POST,
        "/api/students",
        Auth::Bearer(admin),
        Some(json!({ "username": username, "classroom": classroom })),
    )
    .await?;
    id_of(&reply, "student")
}

/// A school with one signed-in admin
pub struct Campus {
    pub school: String,
    pub admin_email: String,
    pub admin: String,
}

pub async fn campus(root: &str) -> Result<Campus> {
    let (school, _) = create_school(root).await?;
    let (admin_email, admin) = create_admin(root, &school).await?;
    Ok(Campus {
        school,
        admin_email,
        admin,
    })
}
