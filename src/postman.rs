//! Postman collection and environment for exercising the API by hand.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{json, Value};

use crate::{
    config::APP_NAME,
    paths::{api_app, api_auth},
};

const BASE_URL_PLACEHOLDER: &str = "{{baseUrl}}";
const COLLECTION_SCHEMA: &str =
    "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

struct Endpoint {
    name: &'static str,
    method: &'static str,
    path: String,
    description: &'static str,
    body: Option<Value>,
}

struct Group {
    name: &'static str,
    description: &'static str,
    endpoints: Vec<Endpoint>,
}

fn endpoint(
    name: &'static str,
    method: &'static str,
    path: &str,
    description: &'static str,
) -> Endpoint {
    Endpoint {
        name,
        method,
        path: path.to_string(),
        description,
        body: None,
    }
}

impl Endpoint {
    fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn groups() -> Vec<Group> {
    let contact_path = format!("{}/{{{{testContactId}}}}", api_app::CONTACTS_BASE);
    vec![
        Group {
            name: "Auth Core",
            description: "Session endpoints: CSRF, sign-in, session, sign-out",
            endpoints: vec![
                endpoint(
                    "Get CSRF Token",
                    "GET",
                    api_auth::CSRF,
                    "Issues the CSRF token required by sign-in and sign-out. The test script stores `csrfToken` in the environment.",
                ),
                endpoint(
                    "Sign In (Credentials)",
                    "POST",
                    api_auth::SIGNIN_CREDENTIALS,
                    "Signs in with email and password. Requires `csrfToken`. Sets session cookies on success.",
                )
                .with_body(json!({
                    "email": "{{testUserEmail}}",
                    "password": "{{testUserPassword}}",
                    "csrfToken": "{{csrfToken}}",
                })),
                endpoint(
                    "Get Session",
                    "GET",
                    api_auth::SESSION,
                    "Current session, or null when not signed in.",
                ),
                endpoint(
                    "Refresh Tokens",
                    "POST",
                    api_auth::REFRESH,
                    "Re-issues the token pair from the refresh cookie. The role is re-read from storage.",
                ),
                endpoint(
                    "Sign Out",
                    "POST",
                    api_auth::SIGNOUT,
                    "Signs out and clears the session cookies. Requires `csrfToken`.",
                )
                .with_body(json!({ "csrfToken": "{{csrfToken}}" })),
                endpoint(
                    "Initiate Google Sign In (Browser Only)",
                    "GET",
                    api_auth::SIGNIN_GOOGLE,
                    "Redirects to Google. The OAuth flow can only be completed in a browser.",
                ),
            ],
        },
        Group {
            name: "Custom Auth",
            description: "Registration, email verification and password reset",
            endpoints: vec![
                endpoint(
                    "Register User",
                    "POST",
                    api_auth::REGISTER,
                    "Creates an unverified user and sends a verification email.",
                )
                .with_body(json!({
                    "name": "Test User",
                    "email": "new-test-user@example.com",
                    "password": "password1234",
                })),
                endpoint(
                    "Verify Email",
                    "POST",
                    api_auth::VERIFY_EMAIL,
                    "Consumes the token from the verification email.",
                )
                .with_body(json!({ "token": "VERIFICATION_TOKEN_FROM_EMAIL" })),
                endpoint(
                    "Resend Verification Email",
                    "POST",
                    api_auth::RESEND_VERIFICATION_EMAIL,
                    "Sends a new verification email if the address is registered and unverified.",
                )
                .with_body(json!({ "email": "{{testUserEmail}}" })),
                endpoint(
                    "Forgot Password",
                    "POST",
                    api_auth::FORGOT_PASSWORD,
                    "Sends a password reset link if the address is registered.",
                )
                .with_body(json!({ "email": "{{testUserEmail}}" })),
                endpoint(
                    "Reset Password",
                    "POST",
                    api_auth::RESET_PASSWORD,
                    "Consumes the reset token and sets a new password.",
                )
                .with_body(json!({
                    "token": "RESET_TOKEN_FROM_EMAIL",
                    "password": "new-password1234",
                })),
            ],
        },
        Group {
            name: "Contacts API",
            description: "Contacts owned by the signed-in user",
            endpoints: vec![
                endpoint(
                    "List Contacts",
                    "GET",
                    api_app::CONTACTS_BASE,
                    "Lists contacts for the signed-in user. Supports `limit` and `offset`.",
                ),
                endpoint(
                    "Create Contact",
                    "POST",
                    api_app::CONTACTS_BASE,
                    "Creates a contact for the signed-in user.",
                )
                .with_body(json!({
                    "firstName": "Test",
                    "lastName": "Contactsson",
                    "email": "test.contact@example.com",
                    "phone": "123-456789",
                })),
                endpoint(
                    "Get Contact by ID",
                    "GET",
                    &contact_path,
                    "Fetches one contact. Set `testContactId` in the environment.",
                ),
                endpoint(
                    "Update Contact",
                    "PUT",
                    &contact_path,
                    "Updates the given fields of one contact. `type` is LEAD, CUSTOMER or AMBASSADOR.",
                )
                .with_body(json!({ "phone": "987-654321", "type": "CUSTOMER" })),
                endpoint(
                    "Delete Contact",
                    "DELETE",
                    &contact_path,
                    "Deletes one contact.",
                ),
                endpoint(
                    "Mark Contact Viewed",
                    "POST",
                    &format!("{contact_path}/viewed"),
                    "Records that the signed-in user viewed the contact. Always answers with `{success, message?}`.",
                ),
            ],
        },
    ]
}

fn csrf_test_event() -> Value {
    json!([{
        "listen": "test",
        "script": {
            "type": "text/javascript",
            "exec": [
                "try {",
                "    const jsonData = pm.response.json();",
                "    if (jsonData.csrfToken) {",
                "        pm.environment.set(\"csrfToken\", jsonData.csrfToken);",
                "    } else {",
                "        console.warn(\"CSRF token not found in response JSON.\");",
                "    }",
                "} catch (e) {",
                "    console.error(\"Failed to parse JSON or set CSRF token:\", e);",
                "}",
                "",
            ],
        },
    }])
}

fn request_item(ep: &Endpoint) -> Value {
    let segments: Vec<&str> = ep.path.trim_matches('/').split('/').collect();
    let mut item = json!({
        "name": ep.name,
        "request": {
            "method": ep.method,
            "header": [],
            "description": ep.description,
            "url": {
                "raw": format!("{BASE_URL_PLACEHOLDER}{}", ep.path),
                "host": [BASE_URL_PLACEHOLDER],
                "path": segments,
            },
        },
        "response": [],
    });

    if let Some(body) = &ep.body {
        item["request"]["header"] = json!([{ "key": "Content-Type", "value": "application/json" }]);
        item["request"]["body"] = json!({
            "mode": "raw",
            "raw": serde_json::to_string_pretty(body).unwrap_or_default(),
            "options": { "raw": { "language": "json" } },
        });
    }
    if ep.path == api_auth::CSRF {
        item["event"] = csrf_test_event();
    }
    item
}

fn readme_folder() -> Value {
    let description = format!(
        "# Authentication in Postman\n\n\
         The API uses cookie-based sessions.\n\n\
         1. Run `GET {csrf}`. The test script stores `csrfToken` in the environment.\n\
         2. Run `POST {signin}` with the test user from the environment. Postman keeps the session cookies for `{{{{baseUrl}}}}`.\n\
         3. Run `GET {session}` to check the session.\n\
         4. Call the protected endpoints; the cookies are sent automatically.\n\
         5. Run `POST {signout}` with a valid `csrfToken` to clear the cookies.\n\n\
         Google sign-in cannot be completed inside Postman because of browser redirects.\n",
        csrf = api_auth::CSRF,
        signin = api_auth::SIGNIN_CREDENTIALS,
        session = api_auth::SESSION,
        signout = api_auth::SIGNOUT,
    );
    json!({
        "name": "README - Authentication",
        "description": "How authentication works when calling this API from Postman.",
        "item": [{
            "name": "Authentication Instructions (Cookie Method)",
            "request": {
                "method": "GET",
                "url": { "raw": "" },
                "description": description,
            },
        }],
    })
}

pub fn build_collection() -> Value {
    let mut items = vec![readme_folder()];
    items.extend(groups().iter().map(|g| {
        json!({
            "name": g.name,
            "description": g.description,
            "item": g.endpoints.iter().map(request_item).collect::<Vec<_>>(),
        })
    }));
    json!({
        "info": {
            "name": format!("{APP_NAME} API"),
            "description": format!("Postman collection for the {APP_NAME} API"),
            "schema": COLLECTION_SCHEMA,
        },
        "item": items,
    })
}

pub fn build_environment(base_url: &str) -> Value {
    let var = |key: &str, value: &str, kind: &str| {
        json!({ "key": key, "value": value, "type": kind, "enabled": true })
    };
    json!({
        "name": format!("{APP_NAME} Environment"),
        "values": [
            var("baseUrl", base_url, "default"),
            var("csrfToken", "", "secret"),
            var("testUserEmail", "test@example.com", "default"),
            var("testUserPassword", "password1234", "secret"),
            var("testContactId", "", "default"),
        ],
    })
}

/// `ContactHub-API.postman_collection.json` and the matching environment file name.
pub fn file_names() -> (String, String) {
    let sanitized: String = APP_NAME.split_whitespace().collect();
    (
        format!("{sanitized}-API.postman_collection.json"),
        format!("{sanitized}-API.postman_environment.json"),
    )
}

/// Write both files into `out_dir`, returning their paths.
pub fn write_files(out_dir: &Path, base_url: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create {}", out_dir.display()))?;
    let (collection_name, environment_name) = file_names();
    let collection_path = out_dir.join(collection_name);
    let environment_path = out_dir.join(environment_name);

    std::fs::write(
        &collection_path,
        serde_json::to_string_pretty(&build_collection())?,
    )
    .with_context(|| format!("write {}", collection_path.display()))?;
    std::fs::write(
        &environment_path,
        serde_json::to_string_pretty(&build_environment(base_url))?,
    )
    .with_context(|| format!("write {}", environment_path.display()))?;

    Ok((collection_path, environment_path))
}
