use crate::selector::SelectorError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("Failed to parse HTML document: {0}")]
    Html(#[from] lol_html::errors::RewritingError),
}
