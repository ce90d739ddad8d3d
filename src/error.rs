use std::fmt;

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Occurs when a discriminator is registered somewhere that cannot hold sub-documents: a
    /// scalar path, an array of scalars, or a schema whose discriminator key is declared as
    /// something other than a string.
    InvalidDiscriminatorTarget(String),
    /// Occurs when a document carries a tag value that isn't in the discriminator map governing
    /// its position.
    UnknownDiscriminator {
        path: String,
        tag: String,
    },
    /// A required field, including an explicit primary key, was absent or null.
    MissingRequiredField(String),
    /// A scalar value failed type coercion.
    InvalidFieldValue {
        path: String,
        reason: String,
    },
    /// A field descriptor named a type token the registry doesn't know.
    UnknownType(String),
    /// A schema id that doesn't belong to the graph it was used with.
    UnknownSchema(usize),
    /// A schema path lookup that found nothing.
    PathNotFound {
        schema: String,
        path: String,
    },
    /// A blob nested sub-documents deeper than the graph's depth limit.
    DepthLimit {
        path: String,
        limit: usize,
    },
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidDiscriminatorTarget(ref err) => {
                write!(f, "Invalid discriminator target: {}", err)
            }
            Error::UnknownDiscriminator { ref path, ref tag } => {
                if path.is_empty() {
                    write!(f, "Discriminator {:?} is not registered", tag)
                } else {
                    write!(
                        f,
                        "Discriminator {:?} is not registered for path `{}`",
                        tag, path
                    )
                }
            }
            Error::MissingRequiredField(ref path) => {
                write!(f, "Missing required field `{}`", path)
            }
            Error::InvalidFieldValue {
                ref path,
                ref reason,
            } => write!(f, "Invalid value for `{}`: {}", path, reason),
            Error::UnknownType(ref token) => write!(f, "Unknown field type {:?}", token),
            Error::UnknownSchema(id) => write!(f, "Schema #{} is not part of this graph", id),
            Error::PathNotFound {
                ref schema,
                ref path,
            } => write!(f, "Schema {:?} has no path `{}`", schema, path),
            Error::DepthLimit { ref path, limit } => write!(
                f,
                "Hit nesting limit at `{}`: sub-documents may nest at most {} deep",
                path, limit
            ),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

/// Join a parent path and a child key into a dotted path, the way errors report locations.
pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_includes_path() {
        let err = Error::UnknownDiscriminator {
            path: "items.0".into(),
            tag: "Clicked".into(),
        };
        assert_eq!(
            err.to_string(),
            "Discriminator \"Clicked\" is not registered for path `items.0`"
        );
        let err = Error::UnknownDiscriminator {
            path: String::new(),
            tag: "Clicked".into(),
        };
        assert_eq!(err.to_string(), "Discriminator \"Clicked\" is not registered");
    }

    #[test]
    fn depth_limit_display() {
        let err = Error::DepthLimit {
            path: "items.0.items.0".into(),
            limit: 1,
        };
        assert_eq!(
            err.to_string(),
            "Hit nesting limit at `items.0.items.0`: sub-documents may nest at most 1 deep"
        );
    }

    #[test]
    fn join() {
        assert_eq!(join_path("", "_id"), "_id");
        assert_eq!(join_path("items.3", "_id"), "items.3._id");
    }
}
