//! Integration tests for the public registration form and the admin payment flow.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_retreat, create_test_app, create_test_app_with, empty_request, json_request,
    parse_response_body, registration_form, submit_registration,
};
use domain::services::{MockEmailTransport, MockWhatsAppTransport};
use serde_json::json;

#[tokio::test]
async fn test_public_retreat_hides_admin_fields() {
    let app = create_test_app();
    let retreat = create_retreat(&app, json!({})).await;
    let share_link = retreat["shareLink"].as_str().unwrap();

    let response = app
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/public/retreats/{}", share_link),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["name"], "Retiro de Quaresma");
    assert_eq!(body["shirtSizes"], json!(["P", "M", "G"]));
    assert!(body.get("paymentInstructions").is_none());
    assert!(body.get("whatsappGroupLink").is_none());
}

#[tokio::test]
async fn test_inactive_or_unknown_share_link_is_not_found() {
    let app = create_test_app();
    let retreat = create_retreat(&app, json!({ "isActive": false })).await;

    for link in [retreat["shareLink"].as_str().unwrap(), "does-not-exist"] {
        let response = app
            .send(empty_request(
                Method::GET,
                &format!("/api/v1/public/retreats/{}", link),
                None,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_submit_registration_sends_confirmation() {
    let app = create_test_app();
    let retreat = create_retreat(&app, json!({})).await;
    let share_link = retreat["shareLink"].as_str().unwrap();

    let mut form = registration_form();
    form["email"] = json!("  Joao.Silva@Example.COM ");
    let response = submit_registration(&app, share_link, form).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["registration"]["paymentStatus"], "pending");
    assert_eq!(body["registration"]["email"], "joao.silva@example.com");
    assert_eq!(body["registration"]["termsAccepted"], true);
    assert_eq!(body["notification"]["ok"], true);
    assert_eq!(body["notification"]["emailSent"], true);
    assert_eq!(body["notification"]["whatsapp"]["reason"], "action_not_supported");

    let sent = app.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "joao.silva@example.com");
    assert_eq!(sent[0].subject, "Inscrição recebida - Retiro de Quaresma");
    assert_eq!(app.whatsapp.attempts(), 0);
}

#[tokio::test]
async fn test_submit_rejects_invalid_forms() {
    let app = create_test_app();
    let retreat = create_retreat(&app, json!({})).await;
    let share_link = retreat["shareLink"].as_str().unwrap();

    let mut unknown_size = registration_form();
    unknown_size["shirtSize"] = json!("XGG");
    let mut no_terms = registration_form();
    no_terms["termsAccepted"] = json!(false);
    let mut bad_email = registration_form();
    bad_email["email"] = json!("not-an-email");

    for form in [unknown_size, no_terms, bad_email] {
        let response = submit_registration(&app, share_link, form).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn test_registration_kept_when_confirmation_email_fails() {
    let app = create_test_app_with(MockEmailTransport::failing(), MockWhatsAppTransport::new());
    let retreat = create_retreat(&app, json!({})).await;
    let share_link = retreat["shareLink"].as_str().unwrap();

    let response = submit_registration(&app, share_link, registration_form()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = parse_response_body(response).await;
    assert_eq!(body["notification"]["ok"], true);
    assert_eq!(body["notification"]["emailSent"], false);
    assert_eq!(app.email.attempts(), 3);

    let retreat_id = retreat["id"].as_str().unwrap();
    let token = app.admin_token();
    let listed = app
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/retreats/{}/registrations", retreat_id),
            Some(&token),
        ))
        .await;
    let listed = parse_response_body(listed).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_lifecycle_end_to_end() {
    let app = create_test_app();
    let token = app.admin_token();
    let retreat = create_retreat(&app, json!({})).await;
    let share_link = retreat["shareLink"].as_str().unwrap();
    let retreat_id = retreat["id"].as_str().unwrap();

    let submitted = parse_response_body(
        submit_registration(&app, share_link, registration_form()).await,
    )
    .await;
    let id = submitted["registration"]["id"].as_str().unwrap().to_string();

    // Paying before a link was sent is not a valid transition
    let early = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/confirm-payment", id),
            json!({ "whatsappGroupLink": "https://chat.whatsapp.com/abc" }),
            Some(&token),
        ))
        .await;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    // Empty body falls back to the retreat's instructions
    let linked = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/payment-link", id),
            Some(&token),
        ))
        .await;
    assert_eq!(linked.status(), StatusCode::OK);
    let linked = parse_response_body(linked).await;
    assert_eq!(linked["registration"]["paymentStatus"], "link_sent");
    assert_eq!(
        linked["registration"]["paymentLink"],
        "PIX: financeiro@example.com - R$ 350,00"
    );
    assert_eq!(linked["notification"]["emailSent"], true);
    assert_eq!(linked["notification"]["whatsapp"]["sent"], true);
    assert_eq!(app.whatsapp.sent()[0].to, "5511987654321");

    // No link in the request and none on the retreat
    let missing_link = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/confirm-payment", id),
            Some(&token),
        ))
        .await;
    assert_eq!(missing_link.status(), StatusCode::BAD_REQUEST);

    let paid = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/confirm-payment", id),
            json!({ "whatsappGroupLink": "https://chat.whatsapp.com/abc" }),
            Some(&token),
        ))
        .await;
    assert_eq!(paid.status(), StatusCode::OK);
    let paid = parse_response_body(paid).await;
    assert_eq!(paid["registration"]["paymentStatus"], "paid");
    assert_eq!(
        paid["registration"]["whatsappGroupLink"],
        "https://chat.whatsapp.com/abc"
    );
    assert!(paid["registration"]["paymentConfirmedAt"].is_string());

    // The link is remembered on the retreat
    let stored = app
        .send(empty_request(
            Method::GET,
            &format!("/api/v1/retreats/{}", retreat_id),
            Some(&token),
        ))
        .await;
    let stored = parse_response_body(stored).await;
    assert_eq!(stored["whatsappGroupLink"], "https://chat.whatsapp.com/abc");

    // Paid is terminal
    let relink = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/payment-link", id),
            Some(&token),
        ))
        .await;
    assert_eq!(relink.status(), StatusCode::CONFLICT);

    // Resend repeats the paid message without changing state
    let emails_before = app.email.sent().len();
    let resent = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/registrations/{}/resend-notification", id),
            Some(&token),
        ))
        .await;
    assert_eq!(resent.status(), StatusCode::OK);
    let resent = parse_response_body(resent).await;
    assert_eq!(resent["registration"]["paymentStatus"], "paid");
    let sent = app.email.sent();
    assert_eq!(sent.len(), emails_before + 1);
    assert_eq!(sent.last().unwrap().subject, "Pagamento confirmado - Retiro de Quaresma");
}

#[tokio::test]
async fn test_resend_confirmation_is_public() {
    let app = create_test_app();
    let retreat = create_retreat(&app, json!({})).await;
    let submitted = parse_response_body(
        submit_registration(&app, retreat["shareLink"].as_str().unwrap(), registration_form())
            .await,
    )
    .await;
    let id = submitted["registration"]["id"].as_str().unwrap();

    let response = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/public/registrations/{}/resend-confirmation", id),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["emailSent"], true);
    assert_eq!(app.email.sent().len(), 2);

    let unknown = app
        .send(empty_request(
            Method::POST,
            &format!(
                "/api/v1/public/registrations/{}/resend-confirmation",
                uuid::Uuid::new_v4()
            ),
            None,
        ))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_registration() {
    let app = create_test_app();
    let token = app.admin_token();
    let retreat = create_retreat(&app, json!({})).await;
    let submitted = parse_response_body(
        submit_registration(&app, retreat["shareLink"].as_str().unwrap(), registration_form())
            .await,
    )
    .await;
    let uri = format!(
        "/api/v1/registrations/{}",
        submitted["registration"]["id"].as_str().unwrap()
    );

    let deleted = app
        .send(empty_request(Method::DELETE, &uri, Some(&token)))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let again = app
        .send(empty_request(Method::DELETE, &uri, Some(&token)))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_retreat_removes_registrations() {
    let app = create_test_app();
    let token = app.admin_token();
    let retreat = create_retreat(&app, json!({})).await;
    let retreat_id = retreat["id"].as_str().unwrap();
    let submitted = parse_response_body(
        submit_registration(&app, retreat["shareLink"].as_str().unwrap(), registration_form())
            .await,
    )
    .await;
    let registration_id = submitted["registration"]["id"].as_str().unwrap();

    let deleted = app
        .send(empty_request(
            Method::DELETE,
            &format!("/api/v1/retreats/{}", retreat_id),
            Some(&token),
        ))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let orphan = app
        .send(empty_request(
            Method::POST,
            &format!("/api/v1/public/registrations/{}/resend-confirmation", registration_id),
            None,
        ))
        .await;
    assert_eq!(orphan.status(), StatusCode::NOT_FOUND);
}
