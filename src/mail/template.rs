//! `{{placeholder}}` substitution for email templates.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::leads::model::Lead;

pub const DEFAULT_TEMPLATE_NAME: &str = "Default Welcome Email";

pub const DEFAULT_WELCOME_SUBJECT: &str = "Welcome, {{name}} - let's talk about {{company}}";

pub const DEFAULT_WELCOME_BODY: &str = "Hi {{name}},

Thank you for your interest! We're excited to learn more about {{company}} and how we can help.

We specialize in:
• Automation and workflow optimization
• Data analysis and reporting
• Custom solutions tailored to your business
• Integration with your existing systems

To understand where we can help most, I'd love to hear:

1. What challenges are you currently facing?
2. What tools are you using today?
3. What's your timeline for implementing new solutions?
4. What budget range are you working with?

Would you be open to a 15-minute discovery call to discuss how we can help {{company}}?

Best regards,
The Sales Team";

/// Substituted for `{{company}}` when the lead has none.
pub const COMPANY_FALLBACK: &str = "your company";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Replace `{{name}}` and `{{company}}`. Unknown placeholders are left as-is.
pub fn render_template(text: &str, lead: &Lead) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| match &caps[1] {
            "name" => lead.name.clone(),
            "company" => lead.company_or(COMPANY_FALLBACK),
            _ => caps[0].to_string(),
        })
        .into_owned()
}
