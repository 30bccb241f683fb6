use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{campus, create_classroom, create_school, root_token, send, unique, Auth};

#[tokio::test]
async fn superadmin_creates_and_lists_schools() -> Result<()> {
    let root = root_token().await?;
    let name = unique("school");

    let created = send(
        Method::POST,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": name, "location": "Shelbyville" })),
    )
    .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["success"], true);
    assert_eq!(created.body["school"]["name"], name.as_str());

    let listed = send(Method::GET, "/api/schools", Auth::Bearer(&root), None).await?;
    assert_eq!(listed.status, StatusCode::OK);
    let schools = listed.body["schools"].as_array().expect("schools array");
    let school = schools
        .iter()
        .find(|s| s["name"] == name.as_str())
        .expect("created school listed");
    assert!(school["classrooms"].as_array().expect("classrooms").is_empty());
    assert!(school["admins"].as_array().expect("admins").is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_school_name_conflicts() -> Result<()> {
    let root = root_token().await?;
    let (_, name) = create_school(&root).await?;

    let again = send(
        Method::POST,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": name, "location": "Elsewhere" })),
    )
    .await?;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn admins_cannot_manage_schools() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;

    // Denied before the payload is looked at
    let invalid = send(
        Method::POST,
        "/api/schools",
        Auth::Bearer(&campus.admin),
        Some(json!({})),
    )
    .await?;
    assert_eq!(invalid.status, StatusCode::FORBIDDEN);
    assert_eq!(invalid.body["error"], "Access denied");

    let listing = send(Method::GET, "/api/schools", Auth::Bearer(&campus.admin), None).await?;
    assert_eq!(listing.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn update_by_name_changes_location() -> Result<()> {
    let root = root_token().await?;
    let (id, name) = create_school(&root).await?;

    let updated = send(
        Method::PUT,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": name, "location": "Capital City" })),
    )
    .await?;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["school"]["id"], id.as_str());
    assert_eq!(updated.body["school"]["location"], "Capital City");

    let missing = send(
        Method::PUT,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": unique("missing"), "location": "Nowhere" })),
    )
    .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn school_with_classrooms_cannot_be_deleted() -> Result<()> {
    let root = root_token().await?;
    let campus = campus(&root).await?;
    create_classroom(&campus.admin, "Room 1").await?;

    let refused = send(
        Method::DELETE,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "id": campus.school })),
    )
    .await?;
    assert_eq!(refused.status, StatusCode::BAD_REQUEST);
    assert_eq!(refused.body["success"], false);

    let listed = send(Method::GET, "/api/schools", Auth::Bearer(&root), None).await?;
    let still_there = listed.body["schools"]
        .as_array()
        .expect("schools array")
        .iter()
        .any(|s| s["id"] == campus.school.as_str());
    assert!(still_there);
    Ok(())
}

#[tokio::test]
async fn empty_school_deletes_by_name() -> Result<()> {
    let root = root_token().await?;
    let (_, name) = create_school(&root).await?;

    let deleted = send(
        Method::DELETE,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": name })),
    )
    .await?;
    assert_eq!(deleted.status, StatusCode::OK);

    let again = send(
        Method::DELETE,
        "/api/schools",
        Auth::Bearer(&root),
        Some(json!({ "name": name })),
    )
    .await?;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
    Ok(())
}
