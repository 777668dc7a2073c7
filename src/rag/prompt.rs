//! Question-answering prompt assembly.

use crate::types::{AppError, Result};

/// Built-in template: retrieved context between rules, then the question.
pub const DEFAULT_QA_TEMPLATE: &str = "The following information is given.\n\
---------------------\n\
{context}\
\n---------------------\n\
Referring to this information, answer the following question: {question}\n";

/// Template used when conversation history is rendered into the prompt.
pub const DEFAULT_QA_WITH_HISTORY_TEMPLATE: &str = "The following information is given.\n\
---------------------\n\
{context}\
\n---------------------\n\
The conversation so far:\n\
{history}\n\
Referring to this information, answer the following question: {question}\n";

/// A prompt template with `{context}`, `{question}` and optional `{history}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_QA_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(AppError::InvalidInput(format!(
                    "Prompt template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self { template })
    }

    /// The built-in template that also shows conversation history.
    pub fn with_history() -> Self {
        Self {
            template: DEFAULT_QA_WITH_HISTORY_TEMPLATE.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn has_history_slot(&self) -> bool {
        self.template.contains("{history}")
    }

    /// Fill the template in a single pass, so placeholder-like text inside
    /// the context or question is left untouched.
    pub fn render(&self, context: &str, question: &str, history: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let (value, len) = if tail.starts_with("{context}") {
                (Some(context), "{context}".len())
            } else if tail.starts_with("{question}") {
                (Some(question), "{question}".len())
            } else if tail.starts_with("{history}") {
                (Some(history), "{history}".len())
            } else {
                (None, 1)
            };
            match value {
                Some(v) => out.push_str(v),
                None => out.push('{'),
            }
            rest = &tail[len..];
        }
        out.push_str(rest);
        out
    }
}

/// Join retrieved chunk texts into the `{context}` block, in rank order.
pub fn join_context<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts.into_iter().collect::<Vec<_>>().join("\n\n")
}
