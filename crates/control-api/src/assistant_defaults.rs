//! Managed assistant defaults.
//!
//! Every tenant starts from these prompts and skills; `assistant/bootstrap`
//! re-applies them when the managed version moves or a tenant lost one.

/// Bump when a managed default below changes.
pub(crate) const ASSISTANT_DEFAULTS_VERSION: &str = "2026-07-01";

pub(crate) const PROMPT_DEFAULTS: &[(&str, &str)] = &[
    (
        "system-prompt",
        "You are a personal assistant reachable over WhatsApp.\n\
         Be concise, be concrete, and ask before taking destructive actions.\n",
    ),
    (
        "daily-summary",
        "Each morning, summarise unread conversations and upcoming events in\n\
         five bullet points or fewer.\n",
    ),
];

pub(crate) const SKILL_DEFAULTS: &[(&str, &str)] = &[(
    "reminders",
    "# Reminders\n\
     Create, list and cancel reminders when the user asks. Confirm the time\n\
     zone on first use.\n",
)];

/// A default needs (re)applying when the tenant has no content for it.
pub(crate) fn needs_default(current: Option<&str>) -> bool {
    current.is_none_or(|content| content.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_content_needs_defaults() {
        assert!(needs_default(None));
        assert!(needs_default(Some("   \n")));
        assert!(!needs_default(Some("customised prompt")));
    }
}
