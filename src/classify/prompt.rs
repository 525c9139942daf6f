//! Construction of the triage instruction from policy data.

use crate::config::TriagePolicy;

/// Number of digest characters sent to the backend.
pub const MAX_DIGEST_CHARS: usize = 8000;

/// Messages for one triage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriagePrompt {
    pub system: String,
    pub user: String,
}

/// First `max` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the request messages for `digest` under `policy`.
pub fn build(policy: &TriagePolicy, digest: &str) -> TriagePrompt {
    let disk = policy.disk_usage_threshold_percent;
    let mut user = String::new();

    user.push_str(
        "Analyze the following logwatch output from a Linux server and provide a \
         structured assessment.\n\n",
    );
    user.push_str(
        "MOST IMPORTANT: report only problems that genuinely require action. Ignore \
         everything that routinely happens on an internet-facing server.\n\n",
    );

    user.push_str("Ignore the following completely (never list them in critical_issues or warnings):\n");
    for item in &policy.ignore {
        user.push_str(&format!("- {}\n", item));
    }
    user.push_str(&format!("- Disk usage below {}%\n", disk));

    user.push_str("\nOnly the following serious problems belong in critical_issues:\n");
    for item in &policy.flag {
        user.push_str(&format!("- {}\n", item));
    }
    user.push_str(&format!("- Disk usage above {}%\n", disk));

    user.push_str(
        "\nSeverity guide:\n\
         - \"none\": no problems (routine scans only)\n\
         - \"low\": minor points worth noting\n\
         - \"medium\": needs a look, not urgent\n\
         - \"high\": needs action within 24 hours\n\
         - \"critical\": needs immediate action\n\n",
    );

    user.push_str(
        "Respond with a JSON object:\n\
         {\n    \
             \"severity\": \"none|low|medium|high|critical\",\n    \
             \"issues_found\": true|false,\n    \
             \"summary\": \"one-line summary\",\n    \
             \"critical_issues\": [\"issue 1\", \"issue 2\"],\n    \
             \"warnings\": [\"warning 1\", \"warning 2\"],\n    \
             \"statistics\": {\n        \
                 \"ssh_attempts\": number,\n        \
                 \"blocked_ips\": number,\n        \
                 \"disk_usage_percent\": number,\n        \
                 \"errors_count\": number\n    \
             },\n    \
             \"recommendations\": [\"action 1\", \"action 2\"]\n\
         }\n\n",
    );

    user.push_str("Logwatch output:\n");
    user.push_str(truncate_chars(digest, MAX_DIGEST_CHARS));

    TriagePrompt {
        system: policy.system_prompt.clone(),
        user,
    }
}
