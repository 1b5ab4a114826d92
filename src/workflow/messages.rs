//! HTML bodies for workflow notifications.

use chrono::Utc;

use crate::models::approval::{ApprovalRequest, RequestKind};
use crate::models::user::ActorTier;

pub struct Rendered {
    pub subject: String,
    pub html_body: String,
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Label/value rows describing the request, already escaped.
fn detail_rows(request: &ApprovalRequest) -> Vec<(&'static str, String)> {
    let mut rows = vec![("User Name", escape_html(&request.submitter_name))];
    match request.kind {
        RequestKind::UserRegistration => {
            for (label, key) in [
                ("Email", "email"),
                ("Requested Role", "role"),
                ("Designation", "designation"),
                ("Department", "department"),
                ("Contact Number", "contact_number"),
            ] {
                if let Some(v) = request.detail(key) {
                    rows.push((label, escape_html(v)));
                }
            }
        }
        RequestKind::ScrapRequest => {
            rows.push(("Chemical ID", escape_html(&request.subject_ref)));
            if let Some(name) = request.detail("chemical_name") {
                rows.push(("Chemical Name", escape_html(name)));
            }
        }
        RequestKind::NewChemicalRequest => {
            rows.push(("Requested Chemical Name", escape_html(&request.subject_ref)));
        }
    }
    rows.push((
        "Request Date",
        request.created_at.format("%Y-%m-%d").to_string(),
    ));
    rows
}

fn table(rows: &[(&'static str, String)]) -> String {
    let mut html = String::from(
        r#"<table style="width: 100%; border-collapse: collapse; margin: 20px 0;">"#,
    );
    for (i, (label, value)) in rows.iter().enumerate() {
        let shade = if i % 2 == 0 { r#" style="background-color: #f2f2f2;""# } else { "" };
        html.push_str(&format!(
            r#"<tr{}><td style="padding: 10px; border: 1px solid #ddd;"><strong>{}:</strong></td><td style="padding: 10px; border: 1px solid #ddd;">{}</td></tr>"#,
            shade, label, value
        ));
    }
    html.push_str("</table>");
    html
}

fn wrap(heading: &str, inner: String) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;"><h2 style="color: #2c3e50;">{}</h2>{}<p>Best regards,</p><p><strong>Chemical Management System</strong><br>Automated Notification Service</p><hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;"><p style="font-size: 12px; color: #777;">This is an automated email. Please do not reply directly to this message.</p></div>"#,
        escape_html(heading),
        inner
    )
}

fn subject_for(request: &ApprovalRequest) -> String {
    match request.kind {
        RequestKind::UserRegistration => {
            format!("User Registration - {}", request.submitter_name)
        }
        RequestKind::ScrapRequest => {
            format!("Scrap Request - Chemical ID: {}", request.subject_ref)
        }
        RequestKind::NewChemicalRequest => format!(
            "New Chemical Request from {} - {}",
            request.submitter_name, request.subject_ref
        ),
    }
}

/// Message asking `tier` to approve or deny a request.
pub fn awaiting_approval(
    request: &ApprovalRequest,
    tier: ActorTier,
    approve_url: &str,
    deny_url: &str,
) -> Rendered {
    let has_photo =
        request.kind == RequestKind::ScrapRequest && request.detail("photo_path").is_some();
    let photo_note = if has_photo {
        "<p>An image related to this scrap request is attached for your review.</p>"
    } else {
        ""
    };
    let inner = format!(
        r#"<p>{},</p><p>A {} is awaiting your decision. Please find the details below:</p>{}{}<p><a href="{}" style="padding: 10px 18px; background-color: #27ae60; color: #fff; text-decoration: none;">Approve</a> <a href="{}" style="padding: 10px 18px; background-color: #c0392b; color: #fff; text-decoration: none;">Deny</a></p><p>These links expire and can be used once.</p>"#,
        tier.salutation(),
        request.kind.label().to_lowercase(),
        table(&detail_rows(request)),
        photo_note,
        escape_html(approve_url),
        escape_html(deny_url),
    );
    Rendered {
        subject: format!("[Action required] {}", subject_for(request)),
        html_body: wrap(&format!("{} Notification", request.kind.label()), inner),
    }
}

/// Final outcome sent to the submitter.
pub fn decision_notice(request: &ApprovalRequest, approved: bool) -> Rendered {
    let verdict = if approved { "approved" } else { "denied" };
    let inner = format!(
        "<p>Dear {},</p><p>Your {} has been <strong>{}</strong>.</p>{}<p>Decided on {}.</p>",
        escape_html(&request.submitter_name),
        request.kind.label().to_lowercase(),
        verdict,
        table(&detail_rows(request)),
        Utc::now().format("%Y-%m-%d"),
    );
    Rendered {
        subject: format!("{} {}", subject_for(request), verdict),
        html_body: wrap(&format!("{} {}", request.kind.label(), verdict), inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Na & K"</b>"#),
            "&lt;b&gt;&quot;Na &amp; K&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_awaiting_message_embeds_links_and_escapes_subject_fields() {
        let req = ApprovalRequest::new(
            RequestKind::NewChemicalRequest,
            "<script>",
            Uuid::new_v4(),
            "Asha",
            serde_json::json!({}),
        );
        let msg = awaiting_approval(
            &req,
            ActorTier::Admin,
            "https://lab/newChemical/approve/t1",
            "https://lab/newChemical/deny/t2",
        );
        assert!(msg.html_body.contains("Dear Admin"));
        assert!(msg.html_body.contains("https://lab/newChemical/approve/t1"));
        assert!(msg.html_body.contains("https://lab/newChemical/deny/t2"));
        assert!(msg.html_body.contains("&lt;script&gt;"));
        assert!(!msg.html_body.contains("<script>"));
    }

    #[test]
    fn test_registration_message_shows_requested_role() {
        let req = ApprovalRequest::new(
            RequestKind::UserRegistration,
            "u1",
            Uuid::new_v4(),
            "Mallory",
            serde_json::json!({ "email": "m@lab.org", "role": "super-admin" }),
        );
        let msg = awaiting_approval(&req, ActorTier::Admin, "https://a", "https://d");
        assert!(msg.html_body.contains("Requested Role:"));
        assert!(msg.html_body.contains("super-admin"));
    }

    #[test]
    fn test_scrap_message_mentions_attached_photo() {
        let req = ApprovalRequest::new(
            RequestKind::ScrapRequest,
            "CHEM-002",
            Uuid::new_v4(),
            "Ravi",
            serde_json::json!({ "photo_path": "uploads/a-flask.jpg" }),
        );
        let msg = awaiting_approval(&req, ActorTier::Admin, "https://a", "https://d");
        assert!(msg.html_body.contains("attached for your review"));
    }

    #[test]
    fn test_decision_notice_subject() {
        let req = ApprovalRequest::new(
            RequestKind::ScrapRequest,
            "CHEM-004",
            Uuid::new_v4(),
            "Ravi",
            serde_json::json!({ "chemical_name": "Acetone" }),
        );
        let msg = decision_notice(&req, false);
        assert_eq!(msg.subject, "Scrap Request - Chemical ID: CHEM-004 denied");
        assert!(msg.html_body.contains("Acetone"));
    }
}
