use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{campus, login, root_token, send, token_for, unique, Auth, ADMIN_PASSWORD};

fn email() -> String {
    format!("{}@school.test", unique("user"))
}

#[tokio::test]
async fn admin_cannot_create_a_superadmin() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;
    let target = email();

    let denied = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(&campus.admin),
        Some(json!({
            "name": "Boss",
            "email": target,
            "password": "password1",
            "role": "superadmin",
        })),
    )
    .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let attempt = login(&target, "password1").await?;
    assert_eq!(attempt.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn admin_cannot_staff_another_school() -> Result<()> {
    let root = root_token().await?;
    let mine = campus(&root).await?;
    let theirs = campus(&root).await?;

    let denied = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(&mine.admin),
        Some(json!({
            "name": "Spy",
            "email": email(),
            "password": "password1",
            "role": "admin",
            "school": theirs.school,
        })),
    )
    .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn admin_creates_colleague_in_own_school() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;
    let colleague = email();

    let created = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(&campus.admin),
        Some(json!({
            "name": "Colleague",
            "email": colleague,
            "password": "password1",
            "role": "admin",
        })),
    )
    .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["user"]["school"], campus.school.as_str());
    assert!(created.body["user"].get("password_hash").is_none());

    token_for(&colleague, "password1").await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;

    let again = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(&root),
        Some(json!({
            "name": "Copy",
            "email": campus.admin_email,
            "password": "password1",
            "role": "admin",
            "school": campus.school,
        })),
    )
    .await?;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn short_password_is_rejected() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;

    let rejected = send(
        Method::POST,
        "/api/user/create-admin",
        Auth::Bearer(&root),
        Some(json!({
            "name": "Short",
            "email": email(),
            "password": "abc",
            "role": "admin",
            "school": campus.school,
        })),
    )
    .await?;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert!(rejected.body["field_errors"]["password"].is_string());
    Ok(())
}

#[tokio::test]
async fn profile_update_touches_only_the_caller() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;
    let renamed = email();

    let updated = send(
        Method::PUT,
        "/api/user/update-profile",
        Auth::Bearer(&campus.admin),
        Some(json!({ "name": "Renamed Admin", "email": renamed })),
    )
    .await?;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["user"]["name"], "Renamed Admin");
    assert_eq!(updated.body["user"]["email"], renamed.as_str());

    token_for(&renamed, ADMIN_PASSWORD).await?;
    let old = login(&campus.admin_email, ADMIN_PASSWORD).await?;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

async fn register(email: &str, school: Option<&str>) -> Result<common::Reply> {
    send(
        Method::POST,
        "/api/user/create-user",
        Auth::None,
        Some(json!({
            "email": email,
            "username": "pupil-parent",
            "password": "password1",
            "school": school,
        })),
    )
    .await
}

#[tokio::test]
async fn registered_user_signs_in_without_admin_rights() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;
    let address = email();

    let created = register(&address, Some(&campus.school)).await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["user"]["role"], "user");
    assert_eq!(created.body["user"]["school"], campus.school.as_str());
    assert_eq!(created.body["user"]["name"], "pupil-parent");
    assert!(created.body["user"].get("password_hash").is_none());

    let token = token_for(&address, "password1").await?;
    let students = send(Method::GET, "/api/students", Auth::Bearer(&token), None).await?;
    assert_eq!(students.status, StatusCode::FORBIDDEN);

    let session = send(Method::GET, "/api/auth/session", Auth::Bearer(&token), None).await?;
    assert_eq!(session.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn registration_requires_an_existing_school() -> Result<()> {
    let missing = register(&email(), None).await?;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert!(missing.body["field_errors"]["school"].is_string());

    let unknown = uuid::Uuid::new_v4().to_string();
    let ghost = register(&email(), Some(&unknown)).await?;
    assert_eq!(ghost.status, StatusCode::BAD_REQUEST);
    assert!(ghost.body["field_errors"]["school"].is_string());
    Ok(())
}

#[tokio::test]
async fn registration_rejects_taken_email() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;

    let again = register(&campus.admin_email, Some(&campus.school)).await?;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["code"], "CONFLICT");
    Ok(())
}
