//! Prompt assembly for LLM-backed capabilities

/// A system prompt plus the user prompt carrying the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Capability instructions and output rules
    pub system: String,
    /// The document to analyze
    pub user: String,
}

/// Builds prompts for one capability call
pub struct PromptBuilder<'a> {
    capability: &'a str,
    output_schema: &'a str,
    instructions: &'a str,
    text: &'a str,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(capability: &'a str, instructions: &'a str, text: &'a str) -> Self {
        Self {
            capability,
            output_schema: "",
            instructions,
            text,
        }
    }

    /// Name the output schema tag in the prompt
    pub fn with_output_schema(mut self, output_schema: &'a str) -> Self {
        self.output_schema = output_schema;
        self
    }

    /// Build the system and user prompts
    pub fn build(&self) -> Prompt {
        let mut system = String::new();

        // Capability marker first, so mocks and logs can tell calls apart
        system.push_str(&format!("[{}]\n", self.capability));
        system.push_str(GENERAL_INSTRUCTIONS);
        system.push_str("\n\n");
        system.push_str(self.instructions.trim());
        system.push_str("\n\n");
        if !self.output_schema.is_empty() {
            system.push_str(&format!("Output schema: {}\n", self.output_schema));
        }
        system.push_str(OUTPUT_FORMAT_REMINDER);

        let mut user = String::new();
        user.push_str("Clinical document:\n");
        user.push_str("---\n");
        user.push_str(self.text);
        user.push_str("\n---\n");

        Prompt { system, user }
    }
}

const GENERAL_INSTRUCTIONS: &str = r#"You extract structured data from clinical documents.
Rules:
- Use only information stated in the document; never invent values
- Use empty strings, empty lists or null when the document is silent
- Dates as YYYY-MM-DD, times as HH:MM (24 hour)
- Keep medication and diagnosis names as written"#;

const OUTPUT_FORMAT_REMINDER: &str =
    "Remember: Return ONLY one valid JSON object, no markdown code blocks, no explanations.";
