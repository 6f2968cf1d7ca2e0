use crate::render::BoxError;
use merman_dom::SelectorError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The render targets were of a kind the selector cannot resolve.
    #[error("Invalid argument nodes for mermaid.init: {message}")]
    InvalidArgument { message: String },

    #[error(transparent)]
    InvalidSelector(#[from] SelectorError),

    #[error("Cannot resolve selector `{selector}`: no document is attached")]
    MissingDocument { selector: String },

    /// The engine failed while rendering diagram `id`.
    #[error("Failed to render diagram {id}: {message}")]
    Render {
        id: String,
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("Diagram parse error: {source}")]
    Parse {
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Document(merman_dom::Error),

    #[error("Render executor is unavailable: {0}")]
    Spawn(#[from] futures::task::SpawnError),
}

impl Error {
    pub(crate) fn render(id: &str, source: BoxError) -> Self {
        Self::Render {
            id: id.to_string(),
            message: source.to_string(),
            source,
        }
    }

    /// The diagram id, for render failures.
    pub fn diagram_id(&self) -> Option<&str> {
        match self {
            Self::Render { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl From<merman_dom::Error> for Error {
    fn from(value: merman_dom::Error) -> Self {
        match value {
            merman_dom::Error::Selector(err) => Self::InvalidSelector(err),
            other => Self::Document(other),
        }
    }
}
