// src/templates.rs
use askama::Template; // Trait necessário para Askama
use crate::models::portfolio::{Highlight, PortfolioView};

// Página pública do portfolio (`templates/portfolio.html`)
#[derive(Template)]
#[template(path = "portfolio.html")]
pub struct PortfolioPage {
    pub portfolio: PortfolioView,
    pub highlights: Vec<Highlight>,
    pub is_owner: bool,
}

// Portfolio privado: formulário de password ou aviso
#[derive(Template)]
#[template(path = "portfolio_locked.html")]
pub struct PortfolioLockedPage {
    pub portfolio_id: String,
    pub child_name: String,
    pub has_password: bool,
    pub error: Option<String>,
}

// --- Emails (corpo HTML) ---

#[derive(Template)]
#[template(path = "email/trial_reminder.html")]
pub struct TrialReminderEmail<'a> {
    pub name: &'a str,
    pub when: &'a str,
    pub upgrade_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/event_followup.html")]
pub struct EventFollowupEmail<'a> {
    pub name: &'a str,
    pub child_name: &'a str,
    pub title: &'a str,
    pub portfolio_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/invitation.html")]
pub struct InvitationEmail<'a> {
    pub inviter: &'a str,
    pub child_name: &'a str,
    pub link: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn view(child_name: &str) -> PortfolioView {
        PortfolioView {
            id: "p1".into(),
            user_id: "u1".into(),
            child_name: child_name.into(),
            bio: Some("Loves painting".into()),
            template: "classic".into(),
            is_private: false,
            has_password: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn portfolio_page_escapes_user_content() {
        let page = PortfolioPage {
            portfolio: view("<script>Mia</script>"),
            highlights: vec![Highlight {
                id: "h1".into(),
                portfolio_id: "p1".into(),
                title: "First recital".into(),
                description: None,
                highlight_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                media_url: Some("https://cdn.example.com/a.jpg".into()),
                media_type: Some("image".into()),
                followup_sent_at: None,
                created_at: Utc::now(),
            }],
            is_owner: false,
        };
        let html = page.render().unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("First recital"));
        assert!(html.contains("theme-classic"));
        assert!(html.contains("<img"));
    }

    #[test]
    fn locked_page_shows_form_only_with_password() {
        let with_password = PortfolioLockedPage {
            portfolio_id: "p1".into(),
            child_name: "Mia".into(),
            has_password: true,
            error: Some("Incorrect password.".into()),
        };
        let html = with_password.render().unwrap();
        assert!(html.contains("/p/p1/unlock"));
        assert!(html.contains("Incorrect password."));

        let private_only = PortfolioLockedPage {
            has_password: false,
            error: None,
            ..with_password
        };
        assert!(!private_only.render().unwrap().contains("<form"));
    }

    #[test]
    fn email_bodies_escape_names_and_titles() {
        let invitation = InvitationEmail {
            inviter: r#"<a href="https://evil.example">Click</a>"#,
            child_name: "Mia",
            link: "http://localhost:3000/p/p1?invite=tok",
        }
        .render()
        .unwrap();
        assert!(!invitation.contains("evil.example\">"));
        assert!(invitation.contains("&lt;a href="));
        assert!(invitation.contains("?invite=tok"));

        let followup = EventFollowupEmail {
            name: "Ana",
            child_name: "<b>Mia</b>",
            title: "<img src=x onerror=alert(1)>",
            portfolio_url: "http://localhost:3000/p/p1",
        }
        .render()
        .unwrap();
        assert!(!followup.contains("<img"));
        assert!(!followup.contains("<b>"));
        assert!(followup.contains("&lt;img"));
    }
}
