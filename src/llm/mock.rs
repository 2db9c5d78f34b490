use chrono::{DateTime, Utc};

use super::ProviderName;

/// Document-type markers, checked in order; the first one found in the prompt wins.
const DOCUMENT_MARKERS: [&str; 6] = [
    "PRD",
    "FRD",
    "UAT",
    "User Stories",
    "Acceptance Criteria",
    "Meeting Minutes",
];

const GENERIC_DOCUMENT: &str = "Document";

/// Offline stand-in used when the active provider has no credential.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn generate(&self, prompt: &str, provider: ProviderName) -> String {
        self.generate_at(prompt, provider, Utc::now())
    }

    pub fn generate_at(&self, prompt: &str, provider: ProviderName, now: DateTime<Utc>) -> String {
        let doc_type = classify(prompt);
        let lower = doc_type.to_lowercase();
        let display = provider.display_name();
        let usage_lines = ProviderName::ALL
            .iter()
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "> {}. **{}**: Check usage at {}",
                    i + 1,
                    p.display_name(),
                    p.usage_url()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "# {doc_type} - Sample Document

> **Note:** This is a mock response because it was not generated live:
> - No API key is configured for {display} ({provider}), or
> - Your {display} ({provider}) quota has been exceeded
>
> To get real AI-generated content:
{usage_lines}
> 4. Switch to a provider with an active key

## Overview

This is a professionally structured {lower} template that demonstrates the generator's capabilities.

## Key Features
- **Professional formatting** with proper markdown structure
- **Comprehensive sections** covering all essential elements
- **Export functionality** to PDF, DOCX, and Markdown formats

## Requirements
1. **Requirement 1:** Detailed description of the first requirement
2. **Requirement 2:** Detailed description of the second requirement
3. **Requirement 3:** Detailed description of the third requirement

## Implementation
```
Code examples or technical specifications would go here
```

## Success Criteria
| Criterion | Description | Priority |
|-----------|-------------|----------|
| Criterion 1 | Must meet basic functionality | High |
| Criterion 2 | Should enhance user experience | Medium |
| Criterion 3 | Could provide additional value | Low |

## Next Steps
1. **Review** this generated content
2. **Edit** any sections as needed
3. **Export** to your preferred format (PDF, DOCX, or Markdown)
4. **Customize** the prompt template for better results

---

*Generated on {timestamp} using mock mode*",
            timestamp = now.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

pub fn classify(prompt: &str) -> &'static str {
    DOCUMENT_MARKERS
        .iter()
        .find(|marker| prompt.contains(*marker))
        .copied()
        .unwrap_or(GENERIC_DOCUMENT)
}
