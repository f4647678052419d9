//! Auth command handlers
//!
//! Sign-in happens outside weekplan; these commands only store, show and
//! forget the resulting session.

use anyhow::{Context, Result};

use weekplan_core::{Session, SessionGate};

use crate::output::{Output, OutputFormat};

/// Store a session for the given user and access token
pub fn set(
    gate: &SessionGate,
    user_id: String,
    token: String,
    email: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut session = Session::new(user_id, token);
    if let Some(email) = email {
        session = session.with_email(email);
    }

    gate.set_session(session.clone())
        .context("Failed to store session")?;

    output.success(&format!("Signed in as {}", display_name(&session)));
    Ok(())
}

/// Forget the stored session
pub fn clear(gate: &SessionGate, output: &Output) -> Result<()> {
    gate.clear().context("Failed to remove session")?;
    output.success("Signed out");
    Ok(())
}

/// Show who is signed in
pub fn show(gate: &SessionGate, output: &Output) -> Result<()> {
    let session = gate.session();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "signed_in": session.is_some(),
                    "user_id": session.as_ref().map(|s| &s.user_id),
                    "email": session.as_ref().and_then(|s| s.email.as_ref()),
                })
            );
        }
        OutputFormat::Quiet => {
            if let Some(session) = session {
                println!("{}", session.user_id);
            }
        }
        OutputFormat::Human => match session {
            Some(session) => {
                println!("Signed in as {}", display_name(&session));
                println!("  User ID: {}", session.user_id);
                println!("  Token:   {}", redact(&session.access_token));
            }
            None => println!("Not signed in."),
        },
    }

    Ok(())
}

fn display_name(session: &Session) -> &str {
    session.email.as_deref().unwrap_or(&session.user_id)
}

/// Keep only the last four characters of a secret
fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekplan_core::AuthGate;

    fn quiet() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_set_then_clear_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let gate = SessionGate::with_path(path.clone()).unwrap();

        set(
            &gate,
            "user-1".to_string(),
            "token-abc".to_string(),
            Some("me@example.com".to_string()),
            &quiet(),
        )
        .unwrap();
        assert!(path.exists());

        let reopened = SessionGate::with_path(path.clone()).unwrap();
        let user = reopened.current_user().unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("me@example.com"));
        assert_eq!(reopened.access_token().as_deref(), Some("token-abc"));

        clear(&reopened, &quiet()).unwrap();
        assert!(!path.exists());
        assert!(!reopened.is_authenticated());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abc"), "****");
        assert_eq!(redact("eyJhbGciOiJIUzI1NiJ9.payload.sig1"), "****sig1");
    }

    #[test]
    fn test_display_name_prefers_email() {
        let session = Session::new("user-1", "t");
        assert_eq!(display_name(&session), "user-1");
        let session = session.with_email("me@example.com");
        assert_eq!(display_name(&session), "me@example.com");
    }
}
