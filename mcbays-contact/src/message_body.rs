use crate::submission::{RequestMetadata, ValidatedSubmission};
use serde::Serialize;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

const SUBMISSION_TEMPLATE_NAME: &str = "submission-email";
const SUBMISSION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/submission-email.txt"
));

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    company: &'a str,
    message: &'a str,
    ip: &'a str,
    user_agent: &'a str,
}

/// Renders the plain-text email the site operators receive. Values are inserted verbatim.
pub fn render_message_body(
    submission: &ValidatedSubmission,
    metadata: &RequestMetadata,
) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(SUBMISSION_TEMPLATE_NAME, SUBMISSION_TEMPLATE)?;
    let context = Context {
        name: submission.name,
        email: submission.email,
        company: submission.company,
        message: submission.message,
        ip: &metadata.ip,
        user_agent: &metadata.user_agent,
    };
    tt.render(SUBMISSION_TEMPLATE_NAME, &context)
}

#[cfg(test)]
mod tests {
    use super::render_message_body;
    use crate::submission::{RequestMetadata, ValidatedSubmission};
    use googletest::prelude::*;

    const SUBMISSION: ValidatedSubmission<'static> = ValidatedSubmission {
        name: "Ann",
        email: "ann@x.com",
        company: "Ann & Sons <Ltd>",
        message: "Hi there,\n\nplease call {soon}.",
    };

    fn metadata() -> RequestMetadata {
        RequestMetadata {
            ip: "203.0.113.7".into(),
            user_agent: "Mozilla/5.0".into(),
        }
    }

    #[test]
    fn lays_out_labelled_sections_in_order() -> Result<()> {
        let output = render_message_body(&SUBMISSION, &metadata()).unwrap();

        verify_that!(
            output,
            eq("New contact form submission\n\
                \n\
                Name:    Ann\n\
                Email:   ann@x.com\n\
                Company: Ann & Sons <Ltd>\n\
                \n\
                Message:\n\
                Hi there,\n\
                \n\
                please call {soon}.\n\
                \n\
                Meta:\n\
                IP: 203.0.113.7\n\
                UA: Mozilla/5.0\n")
        )
    }

    #[test]
    fn leaves_company_line_blank_when_not_given() -> Result<()> {
        let submission = ValidatedSubmission {
            company: "",
            ..SUBMISSION
        };

        let output = render_message_body(&submission, &metadata()).unwrap();

        verify_that!(output, contains_substring("Company: \n"))
    }

    #[test]
    fn does_not_escape_user_input() -> Result<()> {
        let output = render_message_body(&SUBMISSION, &metadata()).unwrap();

        verify_that!(output, contains_substring("Ann & Sons <Ltd>"))
    }
}
