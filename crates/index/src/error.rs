use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    #[error("graph query failed: {0}")]
    Query(#[source] neo4rs::Error),

    #[error("unexpected graph data: {0}")]
    Decode(String),

    #[error("invalid graph request: {0}")]
    InvalidInput(String),
}

impl GraphError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GraphError::Unavailable(_))
    }
}

/// Lost connections surface as `Unavailable` wherever they happen, not just
/// at connect time.
impl From<neo4rs::Error> for GraphError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::IOError { .. }
            | neo4rs::Error::ConnectionError
            | neo4rs::Error::InvalidDnsName(_) => GraphError::Unavailable(err.to_string()),
            other => GraphError::Query(other),
        }
    }
}
