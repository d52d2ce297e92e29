//! Message templates for the membership workflow.
//!
//! Subjects are bilingual (Swedish/English) like the association's other
//! correspondence; bodies keep to short plain paragraphs so the text part
//! stays readable in any client.

use crate::mailer::EmailMessage;

/// Notice that an application has been approved.
pub fn approval_notice(to: &str, full_name: &str, member_number: &str) -> EmailMessage {
    let subject = "Välkommen som medlem / Welcome as a member".to_string();
    let text_body = format!(
        "Hej {full_name},\n\n\
         Din medlemsansökan har godkänts. Ditt medlemsnummer är {member_number}.\n\n\
         Your membership application has been approved. Your member number is {member_number}.\n\n\
         Vänliga hälsningar / Kind regards,\nStyrelsen / The board"
    );
    let html_body = format!(
        "<p>Hej {full_name},</p>\
         <p>Din medlemsansökan har godkänts. Ditt medlemsnummer är <strong>{member_number}</strong>.</p>\
         <p>Your membership application has been approved. Your member number is <strong>{member_number}</strong>.</p>\
         <p>Vänliga hälsningar / Kind regards,<br/>Styrelsen / The board</p>"
    );

    EmailMessage {
        to: to.to_string(),
        subject,
        html_body,
        text_body,
    }
}

/// Notice carrying the one-time login credentials.
///
/// This is the only place the temporary password appears outside the engine
/// call that generated it.
pub fn credentials_notice(to: &str, login_email: &str, temporary_password: &str) -> EmailMessage {
    let subject = "Ditt konto / Your account".to_string();
    let text_body = format!(
        "Ett konto har skapats för dig.\n\n\
         Inloggning / Login: {login_email}\n\
         Tillfälligt lösenord / Temporary password: {temporary_password}\n\n\
         Byt lösenord vid första inloggningen. / Change the password at first login."
    );
    let html_body = format!(
        "<p>Ett konto har skapats för dig. / An account has been created for you.</p>\
         <p>Inloggning / Login: <code>{login_email}</code><br/>\
         Tillfälligt lösenord / Temporary password: <code>{temporary_password}</code></p>\
         <p>Byt lösenord vid första inloggningen. / Change the password at first login.</p>"
    );

    EmailMessage {
        to: to.to_string(),
        subject,
        html_body,
        text_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_notice_carries_member_number() {
        let msg = approval_notice("dara@example.se", "Dara Svensson", "M2025-001");
        assert_eq!(msg.to, "dara@example.se");
        assert!(msg.text_body.contains("M2025-001"));
        assert!(msg.html_body.contains("M2025-001"));
    }

    #[test]
    fn credentials_notice_carries_password_in_both_bodies() {
        let msg = credentials_notice("dara@example.se", "dara@example.se", "s3cretTemp");
        assert!(msg.text_body.contains("s3cretTemp"));
        assert!(msg.html_body.contains("s3cretTemp"));
    }
}
