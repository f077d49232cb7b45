use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated variable reference starting at byte {0}")]
    Unterminated(usize),

    #[error("unbalanced escape at byte {0}")]
    UnbalancedEscape(usize),
}
